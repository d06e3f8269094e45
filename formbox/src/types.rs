//! Common type definitions.

use uuid::Uuid;

/// Identifier the document store assigns to every persisted form
pub type FormId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}
