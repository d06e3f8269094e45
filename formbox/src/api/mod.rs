//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! - `POST /api/submitForm`: multipart submission of `name`, `details` and an `image` file
//! - `GET /api/getForms`: every stored form as a JSON array
//!
//! Stored images are served separately under `/uploads/<filename>`. Both routes are documented
//! with `utoipa`; the generated description is served at `/api-docs/openapi.json` and rendered at
//! `/docs`.

pub mod handlers;
pub mod models;
