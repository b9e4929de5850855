use crate::{
    controller::{health_check_controller, interaction_controller, software_controller},
    AppState,
};
use axum::{
    http::{header::CACHE_CONTROL, HeaderValue},
    routing::{get, post},
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;

use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

// Global OpenAPI document. To be a part
// of the rendered document, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "fedi-oidc API"
        ),
        paths(
            health_check_controller::health_check,
            interaction_controller::begin,
            interaction_controller::details,
            interaction_controller::login,
            interaction_controller::confirm,
            interaction_controller::abort,
            software_controller::get_software,
        ),
        components(
            schemas(
                crate::controller::ApiResponse,
                crate::params::interaction::BeginParams,
                crate::params::interaction::BeginResponse,
                crate::params::interaction::LoginForm,
                crate::params::interaction::ConsentForm,
                crate::response::interaction::InteractionView,
                crate::response::software::SoftwareResponse,
            )
        ),
        tags(
            (name = "fedi_oidc", description = "Sign in with a fediverse account")
        )
    )]
struct ApiDoc;

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(interaction_routes(app_state.clone()))
        .merge(software_routes(app_state))
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

// Interaction pages carry per-user state and must never be cached
fn interaction_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/interaction", post(interaction_controller::begin))
        .route("/interaction/{uid}", get(interaction_controller::details))
        .route(
            "/interaction/{uid}/login",
            post(interaction_controller::login),
        )
        .route(
            "/interaction/{uid}/confirm",
            post(interaction_controller::confirm),
        )
        .route(
            "/interaction/{uid}/abort",
            get(interaction_controller::abort),
        )
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(app_state)
}

fn software_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/api/get-software", get(software_controller::get_software))
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, StubRemote};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn form(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn begin(app: &Router) -> String {
        let request = Request::builder()
            .method("POST")
            .uri("/interaction")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({"client_id": "app", "scope": "openid profile"}).to_string(),
            ))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        json_body(response).await["uid"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = define_routes(test_support::app_state(Arc::new(StubRemote::default())));

        let response = app.oneshot(get_request("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_interaction_is_gone() {
        let app = define_routes(test_support::app_state(Arc::new(StubRemote::default())));

        let response = app
            .clone()
            .oneshot(get_request("/interaction/does-not-exist"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::GONE);
        assert_eq!(
            response.headers().get(CACHE_CONTROL).unwrap(),
            "no-store"
        );
        assert_eq!(
            json_body(response).await,
            json!({"success": false, "error": "interaction_expired"})
        );

        let response = app
            .oneshot(form(
                "/interaction/does-not-exist/login",
                "instance=example.social&login=alice",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::GONE);
    }

    #[tokio::test]
    async fn test_code_flow_then_consent() {
        let remote = Arc::new(StubRemote::default());
        let app = define_routes(test_support::app_state(remote.clone()));
        let uid = begin(&app).await;

        let response = app
            .clone()
            .oneshot(form(
                &format!("/interaction/{uid}/login"),
                "instance=example.social&login=alice",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"success": false, "error": "sent_code"})
        );

        let code = remote.last_code().unwrap();
        let response = app
            .clone()
            .oneshot(form(
                &format!("/interaction/{uid}/login"),
                &format!("instance=example.social&login=alice&token={code}"),
            ))
            .await
            .unwrap();
        assert_eq!(
            json_body(response).await,
            json!({"success": true, "redirect": format!("https://id.example/auth/{uid}")})
        );

        let response = app
            .clone()
            .oneshot(get_request(&format!("/interaction/{uid}")))
            .await
            .unwrap();
        let details = json_body(response).await;
        assert_eq!(details["prompt"], "consent");
        assert_eq!(details["account_id"], "alice@example.social");

        let request = Request::builder()
            .method("POST")
            .uri(format!("/interaction/{uid}/confirm"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"scopes": ["openid"]}).to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            &format!("https://id.example/auth/{uid}")
        );
    }

    #[tokio::test]
    async fn test_wrong_code_is_reported_in_body() {
        let remote = Arc::new(StubRemote::default());
        let app = define_routes(test_support::app_state(remote.clone()));
        let uid = begin(&app).await;

        app.clone()
            .oneshot(form(
                &format!("/interaction/{uid}/login"),
                "instance=example.social&login=alice",
            ))
            .await
            .unwrap();
        let wrong = if remote.last_code().as_deref() == Some("00000") {
            "00001"
        } else {
            "00000"
        };

        let response = app
            .oneshot(form(
                &format!("/interaction/{uid}/login"),
                &format!("instance=example.social&login=alice&token={wrong}"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"success": false, "error": "code_mismatch"})
        );
    }

    #[tokio::test]
    async fn test_password_login_asks_for_second_factor() {
        let app = define_routes(test_support::app_state(Arc::new(StubRemote::default())));
        let uid = begin(&app).await;

        let response = app
            .clone()
            .oneshot(form(
                &format!("/interaction/{uid}/login"),
                "instance=example.social&login=carol&password=hunter2&totp=",
            ))
            .await
            .unwrap();
        assert_eq!(
            json_body(response).await,
            json!({"success": false, "error": "missing_second_factor"})
        );

        let response = app
            .oneshot(form(
                &format!("/interaction/{uid}/login"),
                "instance=example.social&login=carol&password=hunter2&totp=123456",
            ))
            .await
            .unwrap();
        assert_eq!(
            json_body(response).await,
            json!({"success": true, "redirect": format!("https://id.example/auth/{uid}")})
        );
    }

    #[tokio::test]
    async fn test_missing_instance() {
        let app = define_routes(test_support::app_state(Arc::new(StubRemote::default())));
        let uid = begin(&app).await;

        let response = app
            .oneshot(form(&format!("/interaction/{uid}/login"), "login=alice"))
            .await
            .unwrap();
        assert_eq!(
            json_body(response).await,
            json!({"success": false, "error": "missing_instance"})
        );
    }

    #[tokio::test]
    async fn test_abort_redirects_with_access_denied() {
        let app = define_routes(test_support::app_state(Arc::new(StubRemote::default())));
        let uid = begin(&app).await;

        let response = app
            .clone()
            .oneshot(get_request(&format!("/interaction/{uid}/abort")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers().get(header::LOCATION).unwrap();
        assert!(location.to_str().unwrap().contains("error=access_denied"));

        let response = app
            .oneshot(get_request(&format!("/interaction/{uid}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::GONE);
    }

    #[tokio::test]
    async fn test_get_software_requires_domain() {
        let app = define_routes(test_support::app_state(Arc::new(StubRemote::default())));

        let response = app
            .oneshot(get_request("/api/get-software"))
            .await
            .unwrap();
        assert_eq!(
            json_body(response).await,
            json!({"success": false, "error": "missing_instance"})
        );
    }

    #[tokio::test]
    async fn test_get_software_describes_lemmy_instance() {
        let mut server = mockito::Server::new_async().await;
        let _well_known = server
            .mock("GET", "/.well-known/nodeinfo")
            .with_status(200)
            .with_body(
                json!({"links": [{
                    "rel": "http://nodeinfo.diaspora.software/ns/schema/2.0",
                    "href": format!("{}/nodeinfo/2.0", server.url())
                }]})
                .to_string(),
            )
            .create_async()
            .await;
        let _nodeinfo = server
            .mock("GET", "/nodeinfo/2.0")
            .with_status(200)
            .with_body(
                json!({
                    "software": {"name": "lemmy", "version": "0.19.3"},
                    "protocols": ["activitypub"]
                })
                .to_string(),
            )
            .create_async()
            .await;
        let _site = server
            .mock("GET", "/api/v3/site")
            .with_status(200)
            .with_body(json!({"site_view": {"site": {"name": "Example Social"}}}).to_string())
            .create_async()
            .await;

        let app = define_routes(test_support::app_state(test_support::lemmy_client()));
        let response = app
            .oneshot(get_request(&format!(
                "/api/get-software?domain=http://{}/",
                server.host_with_port()
            )))
            .await
            .unwrap();

        assert_eq!(
            json_body(response).await,
            json!({
                "success": true,
                "software": {"name": "lemmy", "version": "0.19.3"},
                "meta": {"name": "Example Social", "icon": ""},
                "info": []
            })
        );
    }
}
