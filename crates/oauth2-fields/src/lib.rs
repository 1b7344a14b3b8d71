//! Record field types that store OAuth2 objects in a text column.
//!
//! A value is written as `base64(json({"kind": .., "data": ..}))`. The `kind`
//! tag pins every blob to the field type that wrote it, so a flow can never be
//! read back as credentials.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use oauth2_core::{Credentials, Flow, OAuth2Error, PersistCallback};

mod error;

pub use error::FieldError;

/// Input to a field decode: what a record hands over for one column.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<T> {
    /// NULL / missing column.
    Absent,
    /// Raw text as read from the record store.
    Stored(String),
    /// Already a live object; decoding passes it through untouched.
    Live(T),
}

impl<T> From<Option<String>> for FieldValue<T> {
    fn from(raw: Option<String>) -> Self {
        match raw {
            Some(raw) => FieldValue::Stored(raw),
            None => FieldValue::Absent,
        }
    }
}

/// A typed column accessor performing encode/decode at the record boundary.
pub trait FieldType: Send + Sync + 'static {
    type Value: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    /// Tag written into every stored blob.
    const KIND: &'static str;

    /// Declared column type for schema bootstrap.
    fn db_type() -> &'static str {
        "VARCHAR"
    }

    fn to_value(input: FieldValue<Self::Value>) -> Result<Option<Self::Value>, FieldError> {
        match input {
            FieldValue::Absent => Ok(None),
            FieldValue::Live(value) => Ok(Some(value)),
            FieldValue::Stored(raw) if raw.is_empty() => Ok(None),
            FieldValue::Stored(raw) => decode(Self::KIND, &raw).map(Some),
        }
    }

    fn to_db_value(value: Option<&Self::Value>) -> Result<Option<String>, FieldError> {
        value.map(|v| encode(Self::KIND, v)).transpose()
    }

    /// Bind a write-back callback to a freshly read value, if the value supports one.
    fn attach_store(_value: &mut Self::Value, _store: Arc<dyn PersistCallback<Self::Value>>) {}
}

/// Column holding serialized [`Credentials`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialsField;

impl FieldType for CredentialsField {
    type Value = Credentials;

    const KIND: &'static str = "oauth2.credentials";

    fn attach_store(value: &mut Credentials, store: Arc<dyn PersistCallback<Credentials>>) {
        value.set_store(store);
    }
}

/// Column holding a serialized [`Flow`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowField;

impl FieldType for FlowField {
    type Value = Flow;

    const KIND: &'static str = "oauth2.flow";
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    kind: &'a str,
    data: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    kind: String,
    data: serde_json::Value,
}

fn encode<T: Serialize>(kind: &str, value: &T) -> Result<String, FieldError> {
    let json = serde_json::to_vec(&EnvelopeRef { kind, data: value })?;
    Ok(STANDARD.encode(json))
}

fn decode<T: DeserializeOwned>(kind: &'static str, raw: &str) -> Result<T, FieldError> {
    let bytes = STANDARD.decode(raw.trim_end())?;
    let envelope: Envelope = serde_json::from_slice(&bytes)?;

    if envelope.kind != kind {
        return Err(FieldError::KindMismatch {
            expected: kind,
            found: envelope.kind,
        });
    }

    Ok(serde_json::from_value(envelope.data)?)
}

impl From<FieldError> for OAuth2Error {
    fn from(err: FieldError) -> Self {
        OAuth2Error::corrupt_field(&err.to_string())
    }
}
