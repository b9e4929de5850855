use serde::Serialize;
use utoipa::ToSchema;

pub(crate) mod health_check_controller;
pub(crate) mod interaction_controller;
pub(crate) mod software_controller;

/// Reply shape the sign-in page understands: either a redirect to follow or
/// a stable error string.
#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct ApiResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ApiResponse {
    pub fn redirect(redirect: String) -> Self {
        Self {
            success: true,
            redirect: Some(redirect),
            error: None,
        }
    }

    pub fn error(error: &str) -> Self {
        Self {
            success: false,
            redirect: None,
            error: Some(error.to_string()),
        }
    }
}
