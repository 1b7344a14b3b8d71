//! Persist OAuth2 credentials and flows as serialized columns of a keyed record.
//!
//! The pieces live in separate crates so they can be reused on their own:
//! - `oauth2-core`: `Credentials`, `Flow` and the `PersistCallback` capability
//! - `oauth2-fields`: the field types that encode/decode a column
//! - `oauth2-ports`: the `RecordStore` seam, with SQLx and Mongo adapters
//!
//! This crate ties them together in [`storage::Storage`].

pub mod storage;

pub use oauth2_config as config;
pub use oauth2_core::{Credentials, Flow, OAuth2Error, PersistCallback, TokenResponse};
pub use oauth2_fields::{CredentialsField, FieldError, FieldType, FieldValue, FlowField};
pub use oauth2_observability::{init_telemetry, LogFormat};
pub use storage::{CredentialsStorage, FlowStorage, Storage};
