mod common;

use std::sync::Arc;

use oauth2_credential_storage::storage::{create_record_store, sqlx::SqlxRecordStore};

/// Contract tests for the default SQLx backend.
///
/// Uses a temporary SQLite file DB (not `:memory:`) so the SQLx pool can use multiple
/// connections safely.
#[tokio::test]
async fn sqlx_record_store_contract() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("oauth2_credentials_test.db");

    // The `mode=rwc` flag ensures the file is created if missing.
    let url = format!("sqlite://{}?mode=rwc", db_path.display());

    let store = SqlxRecordStore::new(&url).await?;
    assert_eq!(store.db_system(), "sqlite");

    common::run_storage_contract(Arc::new(store)).await
}

/// Same contract, through the factory (observed wrapper included).
#[tokio::test]
async fn factory_sqlite_record_store_contract() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("nested").join("factory_test.db");
    let url = format!("sqlite://{}", db_path.display());

    let records = create_record_store(&url).await?;
    common::run_storage_contract(records).await
}
