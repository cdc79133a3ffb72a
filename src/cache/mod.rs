//! Cache backends for the revalidation layer
//!
//! The reconciliation engine only talks to the `Cache` trait; these modules
//! provide the bundled backends.

pub mod in_memory;
pub mod noop;

pub use in_memory::InMemoryCache;
pub use noop::NoOpCache;
