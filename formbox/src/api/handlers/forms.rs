use crate::{
    AppState,
    api::models::forms::{FormResponse, FormSubmission, SubmitFormRequest, UploadedImage},
    db::models::forms::FormCreateDBRequest,
    errors::{Error, HandlerError, Operation, ResultExt},
    types::abbrev_uuid,
};
use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
};
use bytes::BytesMut;
use futures::stream;
use tracing::{debug, info, instrument, warn};

fn multipart_error(e: MultipartError) -> Error {
    Error::Multipart { message: e.body_text() }
}

/// Collect the known fields of a multipart body, buffering the image.
///
/// Unknown fields are skipped. An `image` part without a filename is not a file and is skipped
/// too, which leaves the image missing.
async fn read_submission(mut multipart: Multipart, max_file_size: u64) -> Result<FormSubmission, Error> {
    let mut submission = FormSubmission::default();

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "name" => submission.name = Some(field.text().await.map_err(multipart_error)?),
            "details" => submission.details = Some(field.text().await.map_err(multipart_error)?),
            "image" => {
                let Some(filename) = field.file_name().map(str::to_string) else {
                    debug!("Skipping image field sent without a filename");
                    continue;
                };

                let mut content = BytesMut::new();
                while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                    if (content.len() + chunk.len()) as u64 > max_file_size {
                        return Err(Error::PayloadTooLarge { limit: max_file_size });
                    }
                    content.extend_from_slice(&chunk);
                }

                debug!(%filename, bytes = content.len(), "Received image");
                submission.image = Some(UploadedImage {
                    filename,
                    content: content.freeze(),
                });
            }
            other => debug!(field = other, "Ignoring unknown multipart field"),
        }
    }

    Ok(submission)
}

/// Accept a form submission: store the image, then record the form.
#[utoipa::path(
    post,
    path = "/submitForm",
    tag = "forms",
    summary = "Submit form",
    description = "Submit a name, details and an image. The image is written to the uploads directory and the form is recorded with the stored filename.",
    request_body(
        content = SubmitFormRequest,
        content_type = "multipart/form-data"
    ),
    responses(
        (status = 200, description = "Form stored", body = String, content_type = "text/plain"),
        (status = 500, description = "The submission was invalid or could not be stored", body = String, content_type = "text/plain")
    )
)]
#[instrument(skip_all)]
pub async fn submit_form(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<&'static str, HandlerError> {
    let operation = Operation::SubmitForm;

    // A body that is not multipart at all fails like any other malformed submission
    let multipart = multipart
        .map_err(|rejection| Error::Multipart {
            message: rejection.body_text(),
        })
        .during(operation)?;

    let submission = read_submission(multipart, state.config.uploads.max_file_size)
        .await
        .during(operation)?
        .validate()
        .during(operation)?;

    let UploadedImage { filename, content } = submission.image;
    let image = state
        .uploads
        .store(stream::iter([Ok(content)]), &filename)
        .await
        .during(operation)?;

    let request = FormCreateDBRequest {
        name: submission.name,
        details: submission.details,
        image,
    };

    match state.store.insert(&request).await {
        Ok(form) => {
            info!(form_id = %abbrev_uuid(&form.id), image = %form.image, "Form submitted");
            Ok("Form submitted successfully")
        }
        Err(e) => {
            // The record never landed, so the file has nothing pointing at it
            if let Err(cleanup) = state.uploads.delete(&request.image).await {
                warn!(image = %request.image, error = %cleanup, "Failed to remove orphaned upload");
            }
            Err(e).during(operation)
        }
    }
}

/// List every stored form in insertion order.
#[utoipa::path(
    get,
    path = "/getForms",
    tag = "forms",
    summary = "List forms",
    description = "Returns every stored form, oldest first. There is no pagination.",
    responses(
        (status = 200, description = "All stored forms", body = Vec<FormResponse>),
        (status = 500, description = "The document store could not be read", body = String, content_type = "text/plain")
    )
)]
#[instrument(skip_all)]
pub async fn get_forms(State(state): State<AppState>) -> Result<Json<Vec<FormResponse>>, HandlerError> {
    let forms = state.store.find_all().await.during(Operation::FetchForms)?;
    debug!(count = forms.len(), "Fetched forms");
    Ok(Json(forms.into_iter().map(FormResponse::from).collect()))
}
