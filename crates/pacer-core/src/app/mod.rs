//! App - wiring of ports into caller-facing helpers.

pub mod fetch;

pub use self::fetch::{CachedFetcher, HTTP_NAMESPACE};
