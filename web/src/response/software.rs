//! Instance description returned by `/api/get-software`

use fedi_auth::remote::InstanceDescription;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct SoftwareView {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct MetaView {
    pub name: String,
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SoftwareResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software: Option<SoftwareView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<MetaView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SoftwareResponse {
    pub fn error(error: &str) -> Self {
        Self {
            success: false,
            software: None,
            meta: None,
            info: None,
            error: Some(error.to_string()),
        }
    }
}

impl From<InstanceDescription> for SoftwareResponse {
    fn from(description: InstanceDescription) -> Self {
        Self {
            success: true,
            software: Some(SoftwareView {
                name: description.software.name,
                version: description.software.version,
            }),
            meta: Some(MetaView {
                name: description.meta.name,
                icon: description.meta.icon,
            }),
            info: Some(description.info),
            error: None,
        }
    }
}
