pub mod exchange;
pub mod test_client;
pub mod test_server;

pub use exchange::{exchange, send};
pub use test_client::TestClient;
pub use test_server::TestServer;
