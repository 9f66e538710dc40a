//! usersess-core - Core library for usersess
//!
//! Tracks which user owns which web session by keeping a relational record
//! per session next to the payload stored by a pluggable engine:
//!
//! - **db**: SQLite connection and entity types
//! - **store**: Session record persistence with configurable column names
//! - **backend**: Delegate payload engines and the engine registry
//! - **session**: Lifecycle controller for the session protocol hooks
//! - **gc**: Expired session sweeps, on demand or periodic
//! - **config**: TOML and environment configuration

pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod gc;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use backend::{DelegateBackend, EngineConfig, EngineRegistry};
pub use config::Settings;
pub use db::{Database, RenameOutcome, SessionRecord};
pub use error::{Error, Result};
pub use gc::{GarbageCollector, GcScheduler, SweepReport};
pub use session::{
    IdentityResolver, LifecycleState, RequestContext, SessionLifecycleController, SessionTracker,
};
pub use store::{FieldMap, SessionRecordStore};
