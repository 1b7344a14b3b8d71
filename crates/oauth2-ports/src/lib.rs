//! Integration ports for credential persistence.
//!
//! Implement [`RecordStore`] in your own crate to keep credentials in a store
//! this workspace does not ship an adapter for.

pub mod model;
pub mod storage;

pub use model::*;
pub use storage::*;
