mod server;
pub use server::{PageFragment, Server};

mod server_config;
pub use server_config::ServerConfig;
