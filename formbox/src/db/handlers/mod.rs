//! Document store implementations.
//!
//! The [`FormStore`] trait is the only way the API touches persisted forms. Two
//! implementations exist:
//!
//! - [`PostgresFormStore`]: the production store, one `forms` table behind a sqlx pool
//! - [`InMemoryFormStore`]: process-local, used in tests and for running without a database
//!
//! # Example
//!
//! ```ignore
//! use formbox::db::handlers::{FormStore, InMemoryFormStore};
//!
//! let store = InMemoryFormStore::new();
//! let form = store.insert(&request).await?;
//! let all = store.find_all().await?;
//! ```

pub mod forms;
pub mod in_memory;


pub use forms::{FormStore, PostgresFormStore};
pub use in_memory::InMemoryFormStore;
