use oauth2_credential_storage::storage::{DynRecordStore, ModelClass, RecordStore};
use oauth2_credential_storage::{
    Credentials, CredentialsField, CredentialsStorage, Flow, FlowField, FlowStorage, Storage,
    TokenResponse,
};

pub fn credentials_model() -> ModelClass {
    ModelClass::new("oauth_credentials")
        .with_key("user_id")
        .with_field::<CredentialsField>("credential")
        .with_field::<FlowField>("flow")
}

pub fn credentials(access_token: &str, refresh_token: &str) -> Credentials {
    Credentials::new(
        access_token.to_string(),
        "client_1".to_string(),
        "secret".to_string(),
        Some(refresh_token.to_string()),
        None,
        "https://oauth2.example.com/token".to_string(),
        Some("contract-tests/1.0".to_string()),
    )
    .with_scopes("email profile")
}

fn io_err(e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(e.to_string())
}

/// A minimal contract every `RecordStore` backend must satisfy when driven
/// through the credential adapter.
///
/// Keeps backend parity honest (SQLx, Mongo, and any future backends).
pub async fn run_storage_contract(records: DynRecordStore) -> Result<(), Box<dyn std::error::Error>> {
    let model = credentials_model();
    records.init_model(&model).await.map_err(io_err)?;
    // Bootstrap is idempotent.
    records.init_model(&model).await.map_err(io_err)?;

    let storage: CredentialsStorage =
        Storage::new(records.clone(), model.clone(), "user_id", "42", "credential");

    // Nothing stored yet.
    assert!(storage.get().await.map_err(io_err)?.is_none());

    // put then get
    storage
        .put(&credentials("abc", "xyz"))
        .await
        .map_err(io_err)?;

    let fetched = storage
        .get()
        .await
        .map_err(io_err)?
        .ok_or_else(|| io_err("credentials should exist"))?;
    assert_eq!(fetched.access_token, "abc");
    assert_eq!(fetched, credentials("abc", "xyz"));
    assert!(fetched.has_store());

    // Second put overwrites the same record.
    let mut updated = fetched.clone();
    updated.access_token = "def".to_string();
    storage.put(&updated).await.map_err(io_err)?;

    let rows = records
        .filter(&model, "user_id", "42", "credential")
        .await
        .map_err(io_err)?;
    assert_eq!(rows.len(), 1, "put must not create a second record");

    let fetched = storage
        .get()
        .await
        .map_err(io_err)?
        .ok_or_else(|| io_err("credentials should exist"))?;
    assert_eq!(fetched.access_token, "def");

    // Refresh on fetched credentials lands in the store.
    let mut refreshed = fetched;
    refreshed
        .apply_token_response(TokenResponse::new("ghi").with_expires_in(3600))
        .await
        .map_err(io_err)?;

    let fetched = storage
        .get()
        .await
        .map_err(io_err)?
        .ok_or_else(|| io_err("credentials should exist"))?;
    assert_eq!(fetched.access_token, "ghi");
    assert_eq!(fetched.refresh_token.as_deref(), Some("xyz"));
    assert!(fetched.token_expiry.is_some());

    // Other keys are untouched.
    let other: CredentialsStorage =
        Storage::new(records.clone(), model.clone(), "user_id", "999", "credential");
    assert!(other.get().await.map_err(io_err)?.is_none());

    // A flow column on the same record round-trips independently.
    let flow_storage: FlowStorage =
        Storage::new(records.clone(), model.clone(), "user_id", "42", "flow");
    let mut flow = Flow::new(
        "client_1".to_string(),
        "secret".to_string(),
        "email".to_string(),
    );
    flow.authorize_url("http://localhost/cb").map_err(io_err)?;
    flow_storage.put(&flow).await.map_err(io_err)?;
    assert_eq!(flow_storage.get().await.map_err(io_err)?, Some(flow));

    let still_credentials = storage
        .get()
        .await
        .map_err(io_err)?
        .ok_or_else(|| io_err("credentials should survive the flow write"))?;
    assert_eq!(still_credentials.access_token, "ghi");

    // Unknown columns are rejected rather than interpolated.
    let bad = records
        .filter(&model, "user_id; DROP TABLE oauth_credentials", "42", "credential")
        .await;
    assert!(bad.is_err());

    records.healthcheck().await.map_err(io_err)?;

    Ok(())
}
