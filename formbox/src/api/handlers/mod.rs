//! HTTP request handlers.
//!
//! Handlers turn every failure into a [`crate::errors::HandlerError`], which logs the cause and
//! answers 500 with the route's fixed message.
//!
//! - [`forms`]: form submission and listing

pub mod forms;
