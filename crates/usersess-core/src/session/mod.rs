//! Session lifecycle tracking.
//!
//! Each protocol session is driven by a [`SessionLifecycleController`] that
//! keeps a relational [`SessionRecord`](crate::db::SessionRecord) in step with
//! the payload held by the delegate engine.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized
//!   │
//!   ├─► read / write ─► lookup by identifier
//!   │                     ├─► found: bind it
//!   │                     └─► absent: create (fresh payload key), bind it
//!   ▼
//! Bound(record)
//!   │
//!   ├─► write(other id) ─► rename, payload key kept
//!   ├─► write           ─► associate user once, extend expiry, save, payload
//!   │
//!   ├─► close   ─► touch accessed_at ─► Closed ─► next read/write re-binds
//!   └─► destroy ─► payload + row     ─► Destroyed ─► next read/write starts anew
//! ```

mod context;
mod display;
mod lifecycle;
mod tracker;

pub use context::{ContextIdentity, IdentityResolver, RequestContext};
pub use display::{DisplayNamer, MAX_DISPLAY_NAME_LEN, UserAgentSummary};
pub use lifecycle::{LifecycleState, SessionLifecycleController};
pub use tracker::SessionTracker;

/// Longest accepted session timeout (ten years).
pub const MAX_TIMEOUT_SECS: u64 = 10 * 365 * 24 * 60 * 60;
