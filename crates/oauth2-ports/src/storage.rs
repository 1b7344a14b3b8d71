use async_trait::async_trait;
use std::sync::Arc;

use oauth2_core::OAuth2Error;

use crate::ModelClass;

/// The record store the credential adapter sits on.
///
/// Values cross this boundary as raw column text; encoding and decoding belong
/// to the field types, not to the store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create the model's table/collection and key indexes if missing.
    async fn init_model(&self, model: &ModelClass) -> Result<(), OAuth2Error>;

    /// Raw `property_name` values of every record where `key_name == key_value`,
    /// oldest record first.
    async fn filter(
        &self,
        model: &ModelClass,
        key_name: &str,
        key_value: &str,
        property_name: &str,
    ) -> Result<Vec<Option<String>>, OAuth2Error>;

    /// Write `value` to every record keyed by `key_name == key_value`, creating one
    /// when none exists.
    async fn save(
        &self,
        model: &ModelClass,
        key_name: &str,
        key_value: &str,
        property_name: &str,
        value: Option<String>,
    ) -> Result<(), OAuth2Error>;

    /// Lightweight liveness/readiness check.
    async fn healthcheck(&self) -> Result<(), OAuth2Error>;
}

pub type DynRecordStore = Arc<dyn RecordStore>;
