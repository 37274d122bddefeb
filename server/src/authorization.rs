use http::{HeaderMap, Method, Uri};
use serde::de::DeserializeOwned;

use tether_shared::{
    headers,
    protocol::{header_flag, header_json, header_str},
    ProtocolError,
};

/// The parts of an HTTP request components get to see
#[derive(Clone, Debug)]
pub struct RequestInfo {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

impl RequestInfo {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
        }
    }

    pub fn from_request<B>(request: &http::Request<B>) -> Self {
        Self::new(
            request.method().clone(),
            request.uri().clone(),
            request.headers().clone(),
        )
    }

    /// Whether this is a synchronization request sent by the client engine
    pub fn is_synchronization(&self) -> bool {
        header_flag(&self.headers, headers::REQUEST)
    }

    /// Whether this is a boosted page navigation
    pub fn is_boosted(&self) -> bool {
        header_flag(&self.headers, headers::BOOSTED)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        header_str(&self.headers, name)
    }

    /// Payload attached to a soft navigation, see `Context::location`
    pub fn payload<T: DeserializeOwned>(&self) -> Result<Option<T>, ProtocolError> {
        header_json(&self.headers, headers::PAYLOAD)
    }

    /// Value of a request cookie
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(http::header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|line| line.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }
}

/// Decides whether a request may touch a component.
///
/// Filters run after the prior state is restored and before anything from
/// the request is applied, so they see the component as the server left it.
pub trait AuthorizationFilter<C>: Send + Sync {
    fn authorize(&self, request: &RequestInfo, component: &C) -> bool;
}

impl<C, F> AuthorizationFilter<C> for F
where
    F: Fn(&RequestInfo, &C) -> bool + Send + Sync,
{
    fn authorize(&self, request: &RequestInfo, component: &C) -> bool {
        self(request, component)
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    #[test]
    fn reads_cookies_across_headers() {
        let mut headers = HeaderMap::new();
        headers.append(http::header::COOKIE, HeaderValue::from_static("a=1; b=2"));
        headers.append(http::header::COOKIE, HeaderValue::from_static("c=3"));
        let request = RequestInfo::new(Method::GET, Uri::from_static("/"), headers);
        assert_eq!(request.cookie("b"), Some("2"));
        assert_eq!(request.cookie("c"), Some("3"));
        assert_eq!(request.cookie("d"), None);
    }
}
