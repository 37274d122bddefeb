use std::time::{Duration, Instant};

use http::Response;
use serde_json::Value;

use tether_client::{
    dom::{Document, NodeId},
    shared::OperationId,
    Client, ClientConfig, ClientEvents, OutgoingRequest, Ticket,
};

/// Client over a parsed page with a clock the test moves by hand
pub struct TestClient {
    client: Client,
    now: Instant,
}

impl TestClient {
    pub fn load(html: &str) -> Self {
        Self::with_config(ClientConfig::default(), html)
    }

    pub fn with_config(config: ClientConfig, html: &str) -> Self {
        let document = Document::parse(html).expect("page markup parses");
        let now = Instant::now();
        Self {
            client: Client::new(config, document, now),
            now,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut Client {
        &mut self.client
    }

    pub fn document(&self) -> &Document {
        self.client.document()
    }

    pub fn now(&self) -> Instant {
        self.now
    }

    pub fn advance(&mut self, by: Duration) -> Instant {
        self.now += by;
        self.now
    }

    // Page

    /// Id of the first component rendered as `name`
    pub fn component_id(&self, name: &str) -> String {
        let document = self.document();
        document
            .elements_with_attribute(document.root(), "tether-name")
            .into_iter()
            .find(|node| document.attribute(*node, "tether-name") == Some(name))
            .and_then(|node| document.attribute(node, "id"))
            .unwrap_or_else(|| panic!("no component named '{name}'"))
            .to_string()
    }

    /// Control `field` of component `name`
    pub fn field(&self, name: &str, field: &str) -> NodeId {
        let document = self.document();
        let root = self.root_of(name);
        document
            .elements_with_attribute(root, "name")
            .into_iter()
            .find(|node| document.attribute(*node, "name") == Some(field))
            .unwrap_or_else(|| panic!("component '{name}' has no field '{field}'"))
    }

    /// Text of the first element with `class` inside component `name`
    pub fn text(&self, name: &str, class: &str) -> String {
        let document = self.document();
        let root = self.root_of(name);
        document
            .descendants(root)
            .into_iter()
            .find(|node| document.has_class(*node, class))
            .map(|node| document.text_content(node))
            .unwrap_or_else(|| panic!("component '{name}' has no '.{class}'"))
    }

    pub fn value(&self, node: NodeId) -> String {
        self.document().value(node)
    }

    /// State token currently embedded for component `name`
    pub fn token(&self, name: &str) -> String {
        let id = self.component_id(name);
        let document = self.document();
        document
            .elements_with_attribute(document.root(), "data-id")
            .into_iter()
            .find(|node| document.attribute(*node, "data-id") == Some(id.as_str()))
            .map(|node| document.text_content(node))
            .unwrap_or_else(|| panic!("component '{name}' has no state token"))
    }

    fn root_of(&self, name: &str) -> NodeId {
        let id = self.component_id(name);
        self.document()
            .element_by_id(&id)
            .unwrap_or_else(|| panic!("component '{name}' is gone"))
    }

    // Interaction

    pub fn type_text(&mut self, name: &str, field: &str, value: &str) {
        let node = self.field(name, field);
        self.client.input(self.now, node, value);
    }

    pub fn call_action(&mut self, name: &str, action: &str, parameters: Value) -> OperationId {
        let id = self.component_id(name);
        self.client
            .call_action(self.now, &id, action, parameters)
            .expect("action request is well-formed")
    }

    pub fn poll(&mut self) -> Vec<OutgoingRequest> {
        self.client.poll(self.now)
    }

    pub fn receive(&mut self, ticket: Ticket, response: Response<String>) {
        self.client.receive(self.now, ticket, response);
    }

    pub fn take_events(&mut self) -> ClientEvents {
        self.client.take_events()
    }
}
