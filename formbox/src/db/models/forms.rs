//! The form record schema and its validation.

use crate::types::FormId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A required form field was missing or blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{field} is required")]
pub struct ValidationError {
    pub field: &'static str,
}

impl ValidationError {
    pub fn missing(field: &'static str) -> Self {
        Self { field }
    }

    /// Map a schema CHECK constraint back onto the field it guards
    pub fn from_constraint(constraint: &str) -> Option<Self> {
        match constraint {
            "forms_name_present" => Some(Self::missing("name")),
            "forms_details_present" => Some(Self::missing("details")),
            "forms_image_present" => Some(Self::missing("image")),
            _ => None,
        }
    }
}

/// Returns the value if it has visible content
pub fn required<'a>(field: &'static str, value: Option<&'a str>) -> Result<&'a str, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ValidationError::missing(field)),
    }
}

/// Database request for inserting a new form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormCreateDBRequest {
    pub name: String,
    pub details: String,
    /// Stored filename in the uploads directory
    pub image: String,
}

impl FormCreateDBRequest {
    /// Check every required field, in the order the API reports them
    pub fn validate(&self) -> Result<(), ValidationError> {
        required("name", Some(&self.name))?;
        required("details", Some(&self.details))?;
        required("image", Some(&self.image))?;
        Ok(())
    }
}

/// A persisted form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FormDBResponse {
    pub id: FormId,
    pub name: String,
    pub details: String,
    pub image: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, details: &str, image: &str) -> FormCreateDBRequest {
        FormCreateDBRequest {
            name: name.to_string(),
            details: details.to_string(),
            image: image.to_string(),
        }
    }

    #[test]
    fn test_validate_accepts_complete_form() {
        assert_eq!(request("Alice", "test", "1700000000000.png").validate(), Ok(()));
    }

    #[test]
    fn test_validate_reports_first_missing_field() {
        assert_eq!(request("", "test", "1.png").validate(), Err(ValidationError::missing("name")));
        assert_eq!(request("Alice", "  ", "1.png").validate(), Err(ValidationError::missing("details")));
        assert_eq!(request("Alice", "test", "").validate(), Err(ValidationError::missing("image")));
    }

    #[test]
    fn test_validation_message() {
        assert_eq!(ValidationError::missing("image").to_string(), "image is required");
    }

    #[test]
    fn test_from_constraint() {
        assert_eq!(
            ValidationError::from_constraint("forms_details_present"),
            Some(ValidationError::missing("details"))
        );
        assert_eq!(ValidationError::from_constraint("forms_pkey"), None);
    }
}
