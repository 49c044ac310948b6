//! # helm-store
//!
//! The persisted-session-snapshot contract.
//!
//! Sessions are persisted as content snapshots: the message log plus
//! metadata, never the gateway handle and never in-flight stream state.
//! On load, the runtime rebuilds provider conversations from the restored
//! logs. A malformed store degrades to an empty session list rather than
//! failing the application.

#![deny(unsafe_code)]

pub mod snapshot;
pub mod store;

pub use snapshot::{MessageSnapshot, SessionSnapshot};
pub use store::{JsonFileStore, SessionStore, StoreError};
