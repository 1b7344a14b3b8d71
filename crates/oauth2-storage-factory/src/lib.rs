//! Record store backend selection.
//!
//! This crate centralizes URL-based backend selection (SQLx vs Mongo) and wraps
//! the chosen implementation with `ObservedRecordStore` for tracing.

use std::sync::Arc;

use oauth2_core::OAuth2Error;

pub use oauth2_observability::{Metrics, ObservedRecordStore};
pub use oauth2_ports::{DynRecordStore, RecordStore};

pub mod sqlx {
    pub use oauth2_storage_sqlx::SqlxRecordStore;
}

#[cfg(feature = "mongo")]
pub mod mongo {
    pub use oauth2_storage_mongo::MongoRecordStore;
}

/// Create a record store based on URL scheme.
///
/// Supported:
/// - `postgres://...` and `sqlite:...` -> SQLx backend
/// - `mongodb://...` and `mongodb+srv://...` -> Mongo backend (requires `--features mongo`)
pub async fn create_record_store(database_url: &str) -> Result<DynRecordStore, OAuth2Error> {
    create_observed_record_store(database_url, None).await
}

/// Same as [`create_record_store`], also recording Prometheus metrics into `metrics`.
pub async fn create_observed_record_store(
    database_url: &str,
    metrics: Option<Arc<Metrics>>,
) -> Result<DynRecordStore, OAuth2Error> {
    let (inner, db_system) = create_backend(database_url).await?;

    let mut observed = ObservedRecordStore::new(inner, db_system.to_string());
    if let Some(metrics) = metrics {
        observed = observed.with_metrics(metrics);
    }
    Ok(Arc::new(observed))
}

async fn create_backend(database_url: &str) -> Result<(DynRecordStore, &'static str), OAuth2Error> {
    if database_url.starts_with("mongodb://") || database_url.starts_with("mongodb+srv://") {
        #[cfg(feature = "mongo")]
        {
            let store = mongo::MongoRecordStore::new(database_url).await?;
            return Ok((Arc::new(store), "mongodb"));
        }

        #[cfg(not(feature = "mongo"))]
        {
            return Err(OAuth2Error::server_error(
                "MongoDB backend requested but the binary was built without the `mongo` feature",
            ));
        }
    }

    // Default to SQLx backend for sqlite/postgres.
    let store = oauth2_storage_sqlx::SqlxRecordStore::new(database_url).await?;
    let db_system = store.db_system();
    Ok((Arc::new(store), db_system))
}
