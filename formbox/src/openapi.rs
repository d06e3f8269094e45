//! OpenAPI description of the form API, served at `/api-docs/openapi.json` and rendered at `/docs`.

use utoipa::OpenApi;

use crate::api;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "formbox API",
        description = "Submit forms with an attached image and list what has been submitted."
    ),
    servers(
        (url = "/api", description = "Form API")
    ),
    paths(
        api::handlers::forms::submit_form,
        api::handlers::forms::get_forms,
    ),
    components(schemas(
        api::models::forms::SubmitFormRequest,
        api::models::forms::FormResponse,
    )),
    tags(
        (name = "forms", description = "Form submission and listing")
    )
)]
pub struct ApiDoc;
