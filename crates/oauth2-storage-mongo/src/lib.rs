use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Bson, Document},
    options::{ClientOptions, FindOptions, IndexOptions, UpdateOptions},
    Client as MongoClient, Collection, Database, IndexModel,
};

use oauth2_core::OAuth2Error;
use oauth2_ports::{ModelClass, RecordStore};

/// MongoDB-backed record store.
///
/// Notes:
/// - Each `ModelClass` maps to a collection named after its table.
/// - Field values are stored as strings (or null) under the field name.
/// - "First match" is the document with the lowest `_id`, i.e. the oldest insert.
pub struct MongoRecordStore {
    db: Database,
}

impl MongoRecordStore {
    pub async fn new(uri: &str) -> Result<Self, OAuth2Error> {
        let mut opts = ClientOptions::parse(uri)
            .await
            .map_err(Self::mongo_err_to_oauth)?;
        if opts.app_name.is_none() {
            opts.app_name = Some("oauth2-storage-mongo".to_string());
        }

        let client = MongoClient::with_options(opts).map_err(Self::mongo_err_to_oauth)?;

        // If URI doesn't specify a database, fall back to "oauth2".
        let db_name = client
            .default_database()
            .map(|d| d.name().to_string())
            .unwrap_or_else(|| "oauth2".to_string());

        Ok(Self {
            db: client.database(&db_name),
        })
    }

    fn collection(&self, model: &ModelClass) -> Collection<Document> {
        self.db.collection::<Document>(&model.table)
    }

    fn key_filter(key_name: &str, key_value: &str) -> Document {
        let mut filter = Document::new();
        filter.insert(key_name, key_value);
        filter
    }

    fn duplicate_key_error(err: &mongodb::error::Error) -> bool {
        // Canonical server-side message includes "E11000".
        err.to_string().contains("E11000")
    }

    fn mongo_err_to_oauth(err: mongodb::error::Error) -> OAuth2Error {
        if Self::duplicate_key_error(&err) {
            return OAuth2Error::invalid_request("duplicate key");
        }

        OAuth2Error::server_error(&err.to_string())
    }
}

#[async_trait]
impl RecordStore for MongoRecordStore {
    async fn init_model(&self, model: &ModelClass) -> Result<(), OAuth2Error> {
        let collection = self.collection(model);

        // Lookups go through the key columns; index them. Not unique: the port
        // allows several records per key.
        for key in &model.key_columns {
            let mut keys = Document::new();
            keys.insert(key.as_str(), 1);
            collection
                .create_index(
                    IndexModel::builder()
                        .keys(keys)
                        .options(
                            IndexOptions::builder()
                                .name(format!("idx_{}_{}", model.table, key))
                                .build(),
                        )
                        .build(),
                    None,
                )
                .await
                .map_err(Self::mongo_err_to_oauth)?;
        }

        tracing::debug!(collection = %model.table, "mongo model indexes ensured");
        Ok(())
    }

    async fn filter(
        &self,
        model: &ModelClass,
        key_name: &str,
        key_value: &str,
        property_name: &str,
    ) -> Result<Vec<Option<String>>, OAuth2Error> {
        model.check_columns(key_name, property_name)?;

        let mut projection = Document::new();
        projection.insert(property_name, 1);
        let options = FindOptions::builder()
            .sort(doc! { "_id": 1 })
            .projection(projection)
            .build();

        let documents: Vec<Document> = self
            .collection(model)
            .find(Self::key_filter(key_name, key_value), options)
            .await
            .map_err(Self::mongo_err_to_oauth)?
            .try_collect()
            .await
            .map_err(Self::mongo_err_to_oauth)?;

        Ok(documents
            .iter()
            .map(|document| match document.get(property_name) {
                Some(Bson::String(value)) => Some(value.clone()),
                _ => None,
            })
            .collect())
    }

    async fn save(
        &self,
        model: &ModelClass,
        key_name: &str,
        key_value: &str,
        property_name: &str,
        value: Option<String>,
    ) -> Result<(), OAuth2Error> {
        model.check_columns(key_name, property_name)?;

        let mut set = Document::new();
        set.insert(
            property_name,
            match value {
                Some(value) => Bson::String(value),
                None => Bson::Null,
            },
        );

        self.collection(model)
            .update_many(
                Self::key_filter(key_name, key_value),
                doc! { "$set": set },
                UpdateOptions::builder().upsert(true).build(),
            )
            .await
            .map(|_| ())
            .map_err(Self::mongo_err_to_oauth)
    }

    async fn healthcheck(&self) -> Result<(), OAuth2Error> {
        self.db
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map(|_| ())
            .map_err(Self::mongo_err_to_oauth)
    }
}
