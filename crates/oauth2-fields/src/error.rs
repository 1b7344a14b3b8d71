use thiserror::Error;

/// Failure to turn a stored column value back into an object (or, rarely, the reverse).
///
/// Decode failures mean corrupt data or a schema mismatch; callers must not retry.
#[derive(Debug, Error)]
pub enum FieldError {
    #[error("stored value is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("stored value is not a valid serialized object: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("stored value holds a `{found}` object, expected `{expected}`")]
    KindMismatch {
        expected: &'static str,
        found: String,
    },
}
