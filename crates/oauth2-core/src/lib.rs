//! Framework-agnostic OAuth2 credential and flow types.
//!
//! These are the values the storage adapter persists. They carry no knowledge
//! of the record store beyond the [`PersistCallback`] capability.

pub mod models;

pub use models::*;
