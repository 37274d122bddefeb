//! Header names of the synchronization protocol

// request
pub const REQUEST: &str = "tether-request";
pub const MODEL: &str = "tether-model";
pub const ALL_IDS: &str = "tether-all-ids";
pub const OPERATION_ID: &str = "tether-operation-id";
pub const PARAMETERS: &str = "tether-parameters";
pub const EVENT_NAME: &str = "tether-event-name";
pub const EVENT_SUBJECT: &str = "tether-event-subject";
pub const PARENT_ID: &str = "tether-parent-id";
pub const CLIENT_EVENT_NAME: &str = "tether-client-event-name";
pub const BOOSTED: &str = "tether-boosted";
pub const PAYLOAD: &str = "tether-payload";

// response
pub const TRIGGER: &str = "tether-trigger";
pub const JS: &str = "tether-js";
pub const SKIP_OUTPUT: &str = "tether-skip-output";
pub const REDIRECT: &str = "tether-redirect";
pub const LOCATION: &str = "tether-location";
pub const LOCATION_TARGET: &str = "tether-location-target";
pub const LOCATION_TITLE: &str = "tether-location-title";
pub const REFRESH_ANTIFORGERY_TOKEN: &str = "refresh-antiforgery-token";

/// Default header carrying the antiforgery token
pub const ANTIFORGERY_TOKEN: &str = "x-csrf-token";

/// Value of boolean headers
pub const TRUE: &str = "True";
