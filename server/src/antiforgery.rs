use std::sync::Arc;

use tether_shared::{headers, StateCodec};

use crate::authorization::RequestInfo;

/// Checks the antiforgery token of synchronization requests and issues
/// fresh ones when a check fails
pub trait AntiforgeryValidator: Send + Sync {
    fn validate(&self, request: &RequestInfo, token: Option<&str>) -> bool;

    fn issue(&self, request: &RequestInfo) -> String;
}

/// Contains Config properties which will be used to check antiforgery tokens
#[derive(Clone)]
pub struct AntiforgeryConfig {
    /// Request header carrying the token
    pub header_name: String,
    pub validator: Arc<dyn AntiforgeryValidator>,
}

impl AntiforgeryConfig {
    pub fn new(validator: Arc<dyn AntiforgeryValidator>) -> Self {
        Self {
            header_name: headers::ANTIFORGERY_TOKEN.to_string(),
            validator,
        }
    }
}

const PURPOSE: &str = "antiforgery";

/// Stateless tokens: a random nonce signed with the server's codec secret
pub struct SignedTokens {
    codec: StateCodec,
}

impl SignedTokens {
    pub fn new(codec: StateCodec) -> Self {
        Self { codec }
    }
}

impl AntiforgeryValidator for SignedTokens {
    fn validate(&self, _request: &RequestInfo, token: Option<&str>) -> bool {
        token.is_some_and(|token| self.codec.unprotect(PURPOSE, token).is_ok())
    }

    fn issue(&self, _request: &RequestInfo) -> String {
        let nonce = fastrand::u128(..).to_le_bytes();
        self.codec.protect(PURPOSE, &nonce)
    }
}

#[cfg(test)]
mod tests {
    use http::{HeaderMap, Method, Uri};
    use tether_shared::CodecConfig;

    use super::*;

    #[test]
    fn signed_tokens_validate_their_own_tokens() {
        let tokens = SignedTokens::new(StateCodec::new(&CodecConfig::from_passphrase("af")));
        let request = RequestInfo::new(Method::POST, Uri::from_static("/"), HeaderMap::new());
        let token = tokens.issue(&request);
        assert!(tokens.validate(&request, Some(&token)));
        assert!(!tokens.validate(&request, None));
        assert!(!tokens.validate(&request, Some("forged")));
    }
}
