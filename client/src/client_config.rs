use std::{default::Default, time::Duration};

use tether_shared::headers;

/// Antiforgery token the page was rendered with, and the header it's sent in
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AntiforgeryToken {
    pub header_name: String,
    pub token: String,
}

impl AntiforgeryToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            header_name: headers::ANTIFORGERY_TOKEN.to_string(),
            token: token.into(),
        }
    }
}

/// Contains Config properties which will be used by a Client
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Path under which component endpoints are served, `/tether` by default
    pub path_prefix: String,
    /// Window in which checkbox and select changes are gathered into one
    /// bind request
    pub bind_coalesce: Duration,
    /// Window for text edits, unless the input sets `tether-debounce`
    pub default_bind_debounce: Duration,
    /// How long a request has to be outstanding before its trigger element is
    /// marked busy
    pub busy_delay: Duration,
    /// How long busy state lingers after the last request of an operation,
    /// so that follow-up event requests don't make it flicker
    pub busy_release_delay: Duration,
    /// Sent with every synchronization request when set
    pub antiforgery: Option<AntiforgeryToken>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            path_prefix: "/tether".to_string(),
            bind_coalesce: Duration::from_millis(10),
            default_bind_debounce: Duration::from_millis(300),
            busy_delay: Duration::from_millis(200),
            busy_release_delay: Duration::from_millis(20),
            antiforgery: None,
        }
    }
}
