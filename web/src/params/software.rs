use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct SoftwareParams {
    /// Instance to describe, with or without a scheme
    pub(crate) domain: Option<String>,
}
