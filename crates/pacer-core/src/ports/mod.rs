//! Ports - capabilities the core consumes from the outside world.
//!
//! - `CacheStore`: shared key-value service (Redis or similar) behind `ComputeCache`
//! - `Transport`: the remote endpoint whose calls are cached and paced

pub mod cache_store;
pub mod transport;

pub use self::cache_store::CacheStore;
pub use self::transport::Transport;
