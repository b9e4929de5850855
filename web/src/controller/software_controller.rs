use crate::params::software::SoftwareParams;
use crate::response::software::SoftwareResponse;
use crate::AppState;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use fedi_auth::error::{ErrorKind, InputErrorKind};
use fedi_auth::identity::normalize_host;
use log::*;

/// GET which software an instance runs, with its name and icon
#[utoipa::path(
    get,
    path = "/api/get-software",
    params(SoftwareParams),
    responses(
        (status = 200, description = "Instance description, or `success: false` with an error string", body = SoftwareResponse),
    )
)]
pub async fn get_software(
    State(app_state): State<AppState>,
    Query(params): Query<SoftwareParams>,
) -> impl IntoResponse {
    let Some(domain) = params.domain.filter(|d| !d.trim().is_empty()) else {
        return Json(SoftwareResponse::error(
            ErrorKind::Input(InputErrorKind::MissingInstance).as_str(),
        ));
    };

    let Some(host) = normalize_host(&domain) else {
        return Json(SoftwareResponse::error(
            ErrorKind::Input(InputErrorKind::InvalidHost).as_str(),
        ));
    };

    match app_state.bridge.remote().describe_instance(&host).await {
        Ok(description) => Json(SoftwareResponse::from(description)),
        Err(err) => {
            warn!("Could not describe instance {host}: {err}");
            Json(SoftwareResponse::error(err.error_kind.as_str()))
        }
    }
}
