use std::default::Default;

use tether_shared::CodecConfig;

use crate::antiforgery::AntiforgeryConfig;

/// Contains Config properties which will be used by the Server
#[derive(Clone)]
pub struct ServerConfig {
    /// Path under which component endpoints are served, `/tether` by default
    pub path_prefix: String,
    /// Secret and compression of state tokens
    pub codec: CodecConfig,
    /// Checks synchronization requests for an antiforgery token when set
    pub antiforgery: Option<AntiforgeryConfig>,
    /// Show error messages to users instead of a generic one. Meant for
    /// development.
    pub expose_error_details: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            path_prefix: "/tether".to_string(),
            codec: CodecConfig::default(),
            antiforgery: None,
            expose_error_details: false,
        }
    }
}
