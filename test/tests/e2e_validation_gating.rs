/// E2E TEST: validation only speaks about what the user touched
///
/// A bind on one field shows that field's error even while another field is
/// invalid too. An explicit save validates the whole model.

use std::time::Duration;

use serde_json::{json, Value};

use tether_test::{exchange, Profile, TestClient, TestServer};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

#[test]
fn fresh_page_shows_no_errors() {
    init_logger();
    let server = TestServer::new();
    let client = TestClient::load(&server.page::<Profile>(None, json!({})));

    assert_eq!(client.text("profile", "name-error"), "");
    assert_eq!(client.text("profile", "email-error"), "");
}

#[test]
fn bind_surfaces_only_the_touched_field() {
    init_logger();
    let server = TestServer::new();
    let mut client = TestClient::load(&server.page::<Profile>(None, json!({})));

    client.type_text("profile", "email", "nope");
    client.advance(ms(350));
    assert_eq!(exchange(&server, &mut client), 1);

    assert_eq!(client.text("profile", "email-error"), "Email is invalid");
    // name is empty and invalid, but the user never went near it
    assert_eq!(client.text("profile", "name-error"), "");
}

#[test]
fn save_surfaces_every_error() {
    init_logger();
    let server = TestServer::new();
    let mut client = TestClient::load(&server.page::<Profile>(None, json!({})));

    client.type_text("profile", "email", "nope");
    client.advance(ms(350));
    exchange(&server, &mut client);

    client.call_action("profile", "Save", Value::Null);
    assert_eq!(exchange(&server, &mut client), 1);
    assert_eq!(client.text("profile", "name-error"), "Name is required");
    assert_eq!(client.text("profile", "email-error"), "Email is invalid");
    assert_eq!(client.text("profile", "saves"), "0");
}

#[test]
fn model_stays_touched_after_save() {
    init_logger();
    let server = TestServer::new();
    let mut client = TestClient::load(&server.page::<Profile>(None, json!({})));

    client.call_action("profile", "Save", Value::Null);
    exchange(&server, &mut client);
    assert_eq!(client.text("profile", "name-error"), "Name is required");

    client.type_text("profile", "email", "ada@example.com");
    client.advance(ms(350));
    exchange(&server, &mut client);
    assert_eq!(client.text("profile", "email-error"), "");
    assert_eq!(client.text("profile", "name-error"), "Name is required");
}
