//! Database layer: the form schema, its store implementations and their errors.
//!
//! - [`models`]: request and response records used at the store boundary
//! - [`handlers`]: the [`handlers::FormStore`] trait and its PostgreSQL and in-memory implementations
//! - [`errors`]: [`errors::DbError`], mapping driver failures onto validation and connectivity errors

pub mod errors;
pub mod handlers;
pub mod models;
