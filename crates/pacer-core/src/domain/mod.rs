//! Domain model (keys, actions, envelopes, run context, lifecycle).

pub mod action;
pub mod cache_key;
pub mod context;
pub mod envelope;
pub mod state;

pub use self::action::Action;
pub use self::cache_key::{CacheIdentity, CacheKey, derive_key};
pub use self::context::TaskContext;
pub use self::envelope::ResultEnvelope;
pub use self::state::{SchedulerState, StopReason};
