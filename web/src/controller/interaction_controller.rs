use crate::controller::ApiResponse;
use crate::params::interaction::{BeginParams, BeginResponse, ConsentForm, LoginForm};
use crate::response::interaction::InteractionView;
use crate::{AppState, Error};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Form, Json};
use fedi_auth::bridge::VerificationOutcome;
use fedi_auth::error::{Error as AuthError, ErrorKind, InteractionErrorKind};
use fedi_auth::interaction::{finish_login, Prompt};
use log::*;

/// Reported when a code went out by private message. The sign-in page
/// switches to its code entry step on this value.
pub(crate) const CODE_SENT: &str = "sent_code";

/// POST open a login interaction
#[utoipa::path(
    post,
    path = "/interaction",
    request_body = BeginParams,
    responses(
        (status = 201, description = "Interaction opened", body = BeginResponse),
    )
)]
pub async fn begin(
    State(app_state): State<AppState>,
    Json(params): Json<BeginParams>,
) -> Result<impl IntoResponse, Error> {
    let uid = app_state
        .interactions
        .begin(&params.client_id, params.scopes())
        .await?;

    debug!("Opened interaction {uid} for client {}", params.client_id);

    Ok((StatusCode::CREATED, Json(BeginResponse { uid })))
}

/// GET the details of a pending interaction
#[utoipa::path(
    get,
    path = "/interaction/{uid}",
    params(("uid" = String, Path, description = "Interaction id")),
    responses(
        (status = 200, description = "Interaction details", body = InteractionView),
        (status = 410, description = "Interaction expired or unknown", body = ApiResponse),
    )
)]
pub async fn details(
    State(app_state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let details = app_state.interactions.details(&uid).await?;
    Ok(Json(InteractionView::from(details)))
}

/// POST the sign-in form
///
/// Verification failures are reported in the body with status 200; only an
/// expired interaction fails the request itself.
#[utoipa::path(
    post,
    path = "/interaction/{uid}/login",
    params(("uid" = String, Path, description = "Interaction id")),
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Redirect to follow, or an error string such as `sent_code`", body = ApiResponse),
        (status = 410, description = "Interaction expired or unknown", body = ApiResponse),
    )
)]
pub async fn login(
    State(app_state): State<AppState>,
    Path(uid): Path<String>,
    Form(form): Form<LoginForm>,
) -> Result<Json<ApiResponse>, Error> {
    let details = app_state.interactions.details(&uid).await?;
    if details.prompt != Prompt::Login {
        return Ok(Json(ApiResponse::error("unexpected_prompt")));
    }

    match app_state.bridge.verify(&form.into()).await {
        VerificationOutcome::Verified(identity) => {
            match finish_login(
                app_state.interactions.as_ref(),
                app_state.accounts.as_ref(),
                &uid,
                &identity,
            )
            .await
            {
                Ok(redirect) => Ok(Json(ApiResponse::redirect(redirect))),
                Err(err) => report(err),
            }
        }
        VerificationOutcome::CodeSent { handle } => {
            debug!("Code sent to {handle} for interaction {uid}");
            Ok(Json(ApiResponse::error(CODE_SENT)))
        }
        VerificationOutcome::Failed(err) => report(err),
    }
}

/// POST the consent given for a logged in interaction
#[utoipa::path(
    post,
    path = "/interaction/{uid}/confirm",
    params(("uid" = String, Path, description = "Interaction id")),
    request_body = ConsentForm,
    responses(
        (status = 303, description = "Redirect back to the authorization endpoint"),
        (status = 410, description = "Interaction expired or unknown", body = ApiResponse),
    )
)]
pub async fn confirm(
    State(app_state): State<AppState>,
    Path(uid): Path<String>,
    Json(consent): Json<ConsentForm>,
) -> Result<Response, Error> {
    let details = app_state.interactions.details(&uid).await?;
    if details.prompt != Prompt::Consent {
        return Ok((
            StatusCode::CONFLICT,
            Json(ApiResponse::error("unexpected_prompt")),
        )
            .into_response());
    }

    let redirect = app_state
        .interactions
        .complete_consent(&uid, consent.into())
        .await?;

    Ok(Redirect::to(&redirect).into_response())
}

/// GET abort a pending interaction
#[utoipa::path(
    get,
    path = "/interaction/{uid}/abort",
    params(("uid" = String, Path, description = "Interaction id")),
    responses(
        (status = 303, description = "Redirect back with error=access_denied"),
        (status = 410, description = "Interaction expired or unknown", body = ApiResponse),
    )
)]
pub async fn abort(
    State(app_state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let redirect = app_state.interactions.abort(&uid).await?;
    info!("Interaction {uid} aborted by user");
    Ok(Redirect::to(&redirect))
}

// Everything except an expired interaction goes back to the form as JSON.
fn report(err: AuthError) -> Result<Json<ApiResponse>, Error> {
    if err.error_kind == ErrorKind::Interaction(InteractionErrorKind::Expired) {
        return Err(err.into());
    }
    debug!("Sign-in attempt failed: {err}");
    Ok(Json(ApiResponse::error(err.error_kind.as_str())))
}
