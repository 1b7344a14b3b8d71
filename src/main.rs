// Bootstrap the configured credential model and check the record store is reachable.
use oauth2_credential_storage::{
    config::Config,
    init_telemetry,
    storage::{create_record_store, model_class_for, RecordStore},
    LogFormat,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    init_telemetry(
        &config.telemetry.service_name,
        LogFormat::parse(&config.telemetry.log_format),
    )?;
    config.validate()?;

    tracing::info!(config = ?config.sanitized(), "configuration loaded");

    let records = create_record_store(&config.database.url).await?;
    let model = model_class_for(&config.storage)?;

    records.init_model(&model).await?;
    records.healthcheck().await?;

    tracing::info!(
        table = %model.table,
        key_name = %config.storage.key_name,
        property_name = %config.storage.property_name,
        "credential store ready"
    );

    Ok(())
}
