//! Persistence backends for Parley.
//!
//! All backends implement `parley_core::ChatStore`.
//! - `sqlite`: the default, a single database file
//! - `in_memory`: ephemeral, used by tests and `--memory-store`

pub mod in_memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
