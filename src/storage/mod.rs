//! Durable session state: strike counters survive a reload of the host.

mod session_store;

pub use session_store::{SessionStore, StoreError};
