use crate::db::models::forms::{FormDBResponse, ValidationError, required};
use crate::types::FormId;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Multipart body of `POST /submitForm`, as documented in the OpenAPI description
#[derive(Debug, ToSchema)]
pub struct SubmitFormRequest {
    /// Submitter's name
    pub name: String,
    /// Free-text details
    pub details: String,
    /// The image file. Only the extension of its filename is kept.
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}

/// Fields collected from a multipart body, before validation
#[derive(Debug, Default)]
pub struct FormSubmission {
    pub name: Option<String>,
    pub details: Option<String>,
    pub image: Option<UploadedImage>,
}

/// A file part received under the `image` field
#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// Filename the client sent
    pub filename: String,
    pub content: Bytes,
}

/// A submission with every required field present
#[derive(Debug, Clone)]
pub struct ValidSubmission {
    pub name: String,
    pub details: String,
    pub image: UploadedImage,
}

impl FormSubmission {
    /// Check the image first, then the text fields.
    ///
    /// A missing image is reported before anything about its metadata is looked at.
    pub fn validate(self) -> Result<ValidSubmission, ValidationError> {
        let image = self.image.ok_or(ValidationError::missing("image"))?;
        let name = required("name", self.name.as_deref())?.to_string();
        let details = required("details", self.details.as_deref())?.to_string();
        Ok(ValidSubmission { name, details, image })
    }
}

/// A stored form as returned by `GET /getForms`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FormResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: FormId,
    pub name: String,
    pub details: String,
    /// Stored filename, retrievable at `/uploads/{image}`
    pub image: String,
}

impl From<FormDBResponse> for FormResponse {
    fn from(form: FormDBResponse) -> Self {
        Self {
            id: form.id,
            name: form.name,
            details: form.details,
            image: form.image,
        }
    }
}
