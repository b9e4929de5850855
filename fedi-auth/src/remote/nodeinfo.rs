//! Nodeinfo discovery documents.

use serde::Deserialize;

use super::Software;

/// Link relation advertising a nodeinfo 2.0 document.
pub const NODEINFO_SCHEMA_2_0: &str = "http://nodeinfo.diaspora.software/ns/schema/2.0";

/// Protocol identifier a host must declare for private messages to federate.
pub const REQUIRED_PROTOCOL: &str = "activitypub";

/// `/.well-known/nodeinfo`
#[derive(Debug, Deserialize)]
pub(crate) struct WellKnown {
    #[serde(default)]
    pub links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Link {
    pub rel: String,
    pub href: String,
}

impl WellKnown {
    /// The href of the nodeinfo 2.0 document, if advertised.
    pub fn schema_2_0(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|link| link.rel == NODEINFO_SCHEMA_2_0)
            .map(|link| link.href.as_str())
    }
}

/// The subset of a nodeinfo 2.0 document the bridge reads.
#[derive(Debug, Deserialize)]
pub(crate) struct NodeInfo {
    #[serde(default)]
    pub software: Software,
    #[serde(default)]
    pub protocols: Vec<String>,
}

impl NodeInfo {
    pub fn supports(&self, protocol: &str) -> bool {
        self.protocols.iter().any(|p| p == protocol)
    }

    pub fn is_lemmy(&self) -> bool {
        self.software.name.eq_ignore_ascii_case("lemmy")
    }
}
