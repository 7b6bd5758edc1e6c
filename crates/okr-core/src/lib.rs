//! # OKR Core
//!
//! Core library for a small-team OKR (Objectives/Key-Results) tracker
//! whose entire state lives in an embedded SQLite database serialized to
//! a single binary snapshot.
//!
//! ## Architecture
//!
//! - **storage**: query-layer trait, domain types, and the SQLite engine
//!   (schema migrations included)
//! - **scoring**: pure status/trend derivation
//! - **snapshot**: blob persistence, file export/import, auto-backup
//! - **session**: explicit initialize/persist/close lifecycle
//! - **ops**: bulk mutations (copy targets across months)
//! - **export**: versioned JSON interchange format
//! - **window**: tracking window and month arithmetic

pub mod error;
pub mod export;
pub mod ops;
pub mod scoring;
pub mod session;
pub mod snapshot;
pub mod storage;
pub mod window;

pub use error::{OkrError, Result};
pub use session::Session;
pub use storage::{OkrStore, SqliteStore};
pub use window::TrackingWindow;

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
