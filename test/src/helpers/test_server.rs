use futures::executor::block_on;
use http::{HeaderMap, Method, Request, Response, Uri};
use serde_json::Value;

use tether_server::{Component, RequestInfo, Server, ServerConfig};

use crate::test_components::{Avatar, Profile};

/// Server with the test components registered, answering requests
/// synchronously
pub struct TestServer {
    server: Server,
}

impl TestServer {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let mut server = Server::new(config);
        server
            .register::<Profile>()
            .and_then(|server| server.register::<Avatar>())
            .expect("test components are well-formed");
        Self { server }
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    /// A full page showing `C` as its only root component
    pub fn page<C: Component>(&self, key: Option<&str>, parameters: Value) -> String {
        let request = RequestInfo::new(Method::GET, Uri::from_static("/"), HeaderMap::new());
        let fragment = self
            .server
            .render_page::<C>(&request, key, parameters)
            .expect("page renders");
        format!(
            "<!DOCTYPE html><html><head><title>Test</title></head><body>{}</body></html>",
            fragment.html
        )
    }

    pub fn handle(&self, request: &Request<String>) -> Response<String> {
        block_on(self.server.handle(request))
    }
}

impl Default for TestServer {
    fn default() -> Self {
        Self::new()
    }
}
