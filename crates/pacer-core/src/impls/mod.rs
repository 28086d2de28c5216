//! Impls - in-process implementations of the ports.
//!
//! Networked backends (Redis store, HTTP transport) live with the binaries
//! that need them.

pub mod inmem_store;

pub use self::inmem_store::InMemoryCacheStore;
