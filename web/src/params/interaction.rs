use fedi_auth::bridge::LoginRequest;
use fedi_auth::interaction::ConsentGrant;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Opens a login interaction.
#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct BeginParams {
    pub(crate) client_id: String,
    /// Space separated scopes
    #[serde(default)]
    pub(crate) scope: String,
}

impl BeginParams {
    pub(crate) fn scopes(&self) -> Vec<String> {
        self.scope.split_whitespace().map(str::to_string).collect()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct BeginResponse {
    pub(crate) uid: String,
}

/// The sign-in form.
///
/// Without `password` or `token` a code is sent by private message; with
/// `token` that code is redeemed.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub(crate) struct LoginForm {
    #[serde(default)]
    pub(crate) instance: String,
    #[serde(default)]
    pub(crate) login: String,
    #[serde(default)]
    pub(crate) password: Option<String>,
    #[serde(default)]
    pub(crate) totp: Option<String>,
    #[serde(default)]
    pub(crate) token: Option<String>,
}

impl From<LoginForm> for LoginRequest {
    fn from(form: LoginForm) -> Self {
        LoginRequest {
            instance: form.instance,
            username: form.login,
            password: form.password.map(SecretString::new),
            totp: form.totp,
            code: form.token,
        }
    }
}

/// Consent given on the authorize page.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub(crate) struct ConsentForm {
    pub(crate) scopes: Vec<String>,
    pub(crate) claims: Vec<String>,
}

impl From<ConsentForm> for ConsentGrant {
    fn from(form: ConsentForm) -> Self {
        ConsentGrant {
            scopes: form.scopes,
            claims: form.claims,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_params_split_scopes() {
        let params = BeginParams {
            client_id: "app".to_string(),
            scope: "openid  profile".to_string(),
        };
        assert_eq!(params.scopes(), vec!["openid", "profile"]);
    }

    #[test]
    fn test_login_form_maps_field_names() {
        let request = LoginRequest::from(LoginForm {
            instance: "example.social".to_string(),
            login: "alice".to_string(),
            token: Some("07391".to_string()),
            ..Default::default()
        });

        assert_eq!(request.username, "alice");
        assert_eq!(request.code.as_deref(), Some("07391"));
        assert!(request.password.is_none());
    }
}
