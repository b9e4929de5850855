//! Interaction details as shown to the sign-in and consent pages

use fedi_auth::interaction::{InteractionDetails, Prompt};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InteractionView {
    pub uid: String,
    /// `login` or `consent`
    pub prompt: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
}

impl From<InteractionDetails> for InteractionView {
    fn from(details: InteractionDetails) -> Self {
        let prompt = match details.prompt {
            Prompt::Login => "login",
            Prompt::Consent => "consent",
        };
        Self {
            uid: details.uid,
            prompt: prompt.to_string(),
            client_id: details.client_id,
            scopes: details.scopes,
            account_id: details.account_id,
        }
    }
}
