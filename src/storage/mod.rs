//! The credential storage adapter.
//!
//! A [`Storage`] points at exactly one record (`key_name == key_value`) and one
//! serialized column (`property_name`) of a [`ModelClass`]. Reads decode the
//! column through the field type; writes encode and upsert it.

use async_trait::async_trait;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use oauth2_config::StorageConfig;
use oauth2_core::{OAuth2Error, PersistCallback};
use oauth2_fields::{CredentialsField, FieldType, FieldValue, FlowField};

pub use oauth2_ports::{DynRecordStore, FieldDef, ModelClass, RecordStore};
pub use oauth2_storage_factory::{
    create_observed_record_store, create_record_store, Metrics, ObservedRecordStore,
};

pub use oauth2_storage_factory::sqlx;

#[cfg(feature = "mongo")]
pub use oauth2_storage_factory::mongo;

/// Store and retrieve a single value in a keyed record.
///
/// Credentials returned by [`Storage::get`] are bound back to this storage, so a
/// later refresh (`Credentials::apply_token_response`) writes to the same record.
pub struct Storage<F: FieldType = CredentialsField> {
    records: DynRecordStore,
    model_class: Arc<ModelClass>,
    key_name: String,
    key_value: String,
    property_name: String,
    _field: PhantomData<fn() -> F>,
}

pub type CredentialsStorage = Storage<CredentialsField>;
pub type FlowStorage = Storage<FlowField>;

impl<F: FieldType> Storage<F> {
    pub fn new(
        records: DynRecordStore,
        model_class: ModelClass,
        key_name: impl Into<String>,
        key_value: impl Into<String>,
        property_name: impl Into<String>,
    ) -> Self {
        Self {
            records,
            model_class: Arc::new(model_class),
            key_name: key_name.into(),
            key_value: key_value.into(),
            property_name: property_name.into(),
            _field: PhantomData,
        }
    }

    pub fn model_class(&self) -> &ModelClass {
        &self.model_class
    }

    pub fn key_value(&self) -> &str {
        &self.key_value
    }

    /// Create the model's table/collection if it does not exist yet.
    pub async fn init(&self) -> Result<(), OAuth2Error> {
        self.records.init_model(&self.model_class).await
    }

    /// Read the value from the first matching record.
    ///
    /// No matching record yields `Ok(None)`. A value that cannot be decoded is an
    /// error, never `None`.
    pub async fn get(&self) -> Result<Option<F::Value>, OAuth2Error> {
        let rows = self
            .records
            .filter(
                &self.model_class,
                &self.key_name,
                &self.key_value,
                &self.property_name,
            )
            .await?;

        if rows.len() > 1 {
            tracing::debug!(
                table = %self.model_class.table,
                key_name = %self.key_name,
                matches = rows.len(),
                "several records match; using the first"
            );
        }

        let Some(raw) = rows.into_iter().next() else {
            return Ok(None);
        };

        let mut value = F::to_value(FieldValue::from(raw))?;
        if let Some(value) = value.as_mut() {
            F::attach_store(value, Arc::new(self.clone()));
        }

        Ok(value)
    }

    /// Write `value` into the keyed record, creating the record on first write.
    pub async fn put(&self, value: &F::Value) -> Result<(), OAuth2Error> {
        let encoded = F::to_db_value(Some(value))?;
        self.records
            .save(
                &self.model_class,
                &self.key_name,
                &self.key_value,
                &self.property_name,
                encoded,
            )
            .await
    }
}

impl<F: FieldType> Clone for Storage<F> {
    fn clone(&self) -> Self {
        Self {
            records: self.records.clone(),
            model_class: self.model_class.clone(),
            key_name: self.key_name.clone(),
            key_value: self.key_value.clone(),
            property_name: self.property_name.clone(),
            _field: PhantomData,
        }
    }
}

impl<F: FieldType> fmt::Debug for Storage<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("table", &self.model_class.table)
            .field("key_name", &self.key_name)
            .field("key_value", &self.key_value)
            .field("property_name", &self.property_name)
            .field("kind", &F::KIND)
            .finish()
    }
}

#[async_trait]
impl<F: FieldType> PersistCallback<F::Value> for Storage<F> {
    async fn persist(&self, value: &F::Value) -> Result<(), OAuth2Error> {
        self.put(value).await
    }
}

/// Build the model described by a storage config section.
pub fn model_class_for(config: &StorageConfig) -> Result<ModelClass, OAuth2Error> {
    let model = ModelClass::new(config.table.as_str()).with_key(config.key_name.as_str());

    match config.field.as_str() {
        "credentials" => Ok(model.with_field::<CredentialsField>(config.property_name.as_str())),
        "flow" => Ok(model.with_field::<FlowField>(config.property_name.as_str())),
        other => Err(OAuth2Error::invalid_request(&format!(
            "unknown field kind `{other}`"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oauth2_core::{Credentials, Flow, TokenResponse};
    use std::sync::Mutex;

    /// In-memory rows: (key column, key value, property, raw value), in insert order.
    #[derive(Default)]
    struct MemoryRecords {
        rows: Mutex<Vec<(String, String, String, Option<String>)>>,
    }

    impl MemoryRecords {
        fn push_raw(&self, key_name: &str, key_value: &str, property: &str, raw: Option<&str>) {
            self.rows.lock().unwrap().push((
                key_name.to_string(),
                key_value.to_string(),
                property.to_string(),
                raw.map(str::to_string),
            ));
        }

        fn len(&self) -> usize {
            self.rows.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl RecordStore for MemoryRecords {
        async fn init_model(&self, _model: &ModelClass) -> Result<(), OAuth2Error> {
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
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|(k, v, p, _)| k == key_name && v == key_value && p == property_name)
                .map(|(_, _, _, raw)| raw.clone())
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
            let mut rows = self.rows.lock().unwrap();
            let mut matched = false;
            for (k, v, p, raw) in rows.iter_mut() {
                if k == key_name && v == key_value && p == property_name {
                    *raw = value.clone();
                    matched = true;
                }
            }
            if !matched {
                rows.push((
                    key_name.to_string(),
                    key_value.to_string(),
                    property_name.to_string(),
                    value,
                ));
            }
            Ok(())
        }

        async fn healthcheck(&self) -> Result<(), OAuth2Error> {
            Ok(())
        }
    }

    fn model() -> ModelClass {
        ModelClass::new("oauth_credentials")
            .with_key("user_id")
            .with_field::<CredentialsField>("credential")
            .with_field::<FlowField>("flow")
    }

    fn credentials(access_token: &str) -> Credentials {
        Credentials::new(
            access_token.to_string(),
            "client".to_string(),
            "secret".to_string(),
            Some("xyz".to_string()),
            None,
            "https://oauth2.example.com/token".to_string(),
            None,
        )
    }

    fn storage(records: &Arc<MemoryRecords>, key_value: &str) -> CredentialsStorage {
        Storage::new(records.clone(), model(), "user_id", key_value, "credential")
    }

    #[tokio::test]
    async fn get_without_record_is_none() {
        let records = Arc::new(MemoryRecords::default());
        let storage = storage(&records, "999");

        assert_eq!(storage.key_value(), "999");
        assert!(storage.model_class().has_field("credential"));
        assert!(storage.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_returns_bound_credentials() {
        let records = Arc::new(MemoryRecords::default());
        let storage = storage(&records, "42");
        storage.put(&credentials("abc")).await.unwrap();

        let fetched = storage.get().await.unwrap().unwrap();
        assert_eq!(fetched, credentials("abc"));
        assert!(fetched.has_store());
    }

    #[tokio::test]
    async fn first_match_wins() {
        let records = Arc::new(MemoryRecords::default());
        let older = CredentialsField::to_db_value(Some(&credentials("old")))
            .unwrap()
            .unwrap();
        let newer = CredentialsField::to_db_value(Some(&credentials("new")))
            .unwrap()
            .unwrap();
        records.push_raw("user_id", "42", "credential", Some(&older));
        records.push_raw("user_id", "42", "credential", Some(&newer));

        let fetched = storage(&records, "42").get().await.unwrap().unwrap();
        assert_eq!(fetched.access_token, "old");
    }

    #[tokio::test]
    async fn null_column_is_none_and_corrupt_column_is_an_error() {
        let records = Arc::new(MemoryRecords::default());
        records.push_raw("user_id", "1", "credential", None);
        records.push_raw("user_id", "2", "credential", Some("@@not-base64@@"));

        assert!(storage(&records, "1").get().await.unwrap().is_none());

        let err = storage(&records, "2").get().await.unwrap_err();
        assert!(err.is_server_error());
        assert!(err.to_string().contains("corrupt field value"));
    }

    #[tokio::test]
    async fn refresh_on_fetched_credentials_writes_back() {
        let records = Arc::new(MemoryRecords::default());
        let storage = storage(&records, "42");
        storage.put(&credentials("abc")).await.unwrap();

        let mut fetched = storage.get().await.unwrap().unwrap();
        fetched
            .apply_token_response(TokenResponse::new("def").with_expires_in(3600))
            .await
            .unwrap();

        let again = storage.get().await.unwrap().unwrap();
        assert_eq!(again.access_token, "def");
        assert_eq!(again.refresh_token.as_deref(), Some("xyz"));
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn flows_are_stored_without_a_persist_hook() {
        let records = Arc::new(MemoryRecords::default());
        let storage: FlowStorage =
            Storage::new(records.clone(), model(), "user_id", "42", "flow");

        let mut flow = Flow::new("client".to_string(), "secret".to_string(), "email".to_string());
        flow.authorize_url("http://localhost/cb").unwrap();
        storage.put(&flow).await.unwrap();

        assert_eq!(storage.get().await.unwrap(), Some(flow));
    }

    #[tokio::test]
    async fn undeclared_property_is_rejected_by_the_store() {
        let records = Arc::new(MemoryRecords::default());
        let storage: CredentialsStorage =
            Storage::new(records, model(), "user_id", "42", "password");

        let err = storage.put(&credentials("abc")).await.unwrap_err();
        assert_eq!(err.error, "invalid_request");
    }

    #[test]
    fn model_from_config_uses_field_kind() {
        let config = StorageConfig {
            table: "flows".to_string(),
            key_name: "session_id".to_string(),
            property_name: "flow".to_string(),
            field: "flow".to_string(),
        };
        let model = model_class_for(&config).unwrap();
        assert!(model.has_key("session_id"));
        assert!(model.has_field("flow"));

        let bad = StorageConfig {
            field: "blob".to_string(),
            ..config
        };
        assert!(model_class_for(&bad).is_err());
    }
}
