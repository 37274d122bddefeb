/// E2E TEST: nested components and event scopes
///
/// A parent re-render sends a placeholder for the nested avatar, which the
/// client keeps as it is. Global events reach every subscriber, parent
/// events only the component the avatar is nested in.

use std::time::Duration;

use serde_json::{json, Value};

use tether_client::TriggerEvent;
use tether_test::{exchange, Profile, TestClient, TestServer};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

fn saved_profile(server: &TestServer) -> TestClient {
    let mut client = TestClient::load(&server.page::<Profile>(None, json!({ "name": "Ada" })));
    client.type_text("profile", "email", "ada@example.com");
    client.advance(ms(350));
    exchange(server, &mut client);
    client.call_action("profile", "Save", Value::Null);
    // the save, then the avatar handling the event it published
    assert_eq!(exchange(server, &mut client), 2);
    client
}

#[test]
fn nested_component_renders_with_the_page() {
    init_logger();
    let server = TestServer::new();
    let client = TestClient::load(&server.page::<Profile>(None, json!({ "name": "Ada" })));

    assert_eq!(client.text("avatar", "label"), "Ada");
    assert_ne!(client.component_id("avatar"), client.component_id("profile"));
    assert!(!client.token("avatar").is_empty());
}

#[test]
fn global_event_reaches_the_nested_subscriber() {
    init_logger();
    let server = TestServer::new();
    let mut client = saved_profile(&server);

    assert_eq!(client.text("profile", "saves"), "1");
    assert_eq!(client.text("avatar", "avatar-saves"), "1");
    let triggers: Vec<_> = client.take_events().read::<TriggerEvent>().collect();
    assert!(triggers.iter().any(|trigger| trigger.name == "Saved"));
}

#[test]
fn parent_render_keeps_the_nested_state() {
    init_logger();
    let server = TestServer::new();
    let mut client = saved_profile(&server);
    let avatar_token = client.token("avatar");

    client.type_text("profile", "name", "Ada Lovelace");
    client.advance(ms(350));
    assert_eq!(exchange(&server, &mut client), 1);

    // the profile came back with a placeholder where the avatar is
    assert_eq!(client.text("avatar", "avatar-saves"), "1");
    assert_eq!(client.text("avatar", "label"), "Ada");
    assert_eq!(client.token("avatar"), avatar_token);
}

#[test]
fn parent_event_reaches_the_parent() {
    init_logger();
    let server = TestServer::new();
    let mut client = TestClient::load(&server.page::<Profile>(None, json!({})));

    client.call_action("avatar", "Ping", Value::Null);
    // the ping, then the profile handling it
    assert_eq!(exchange(&server, &mut client), 2);
    assert_eq!(client.text("profile", "pings"), "1");

    let profile = client.component_id("profile");
    let triggers: Vec<_> = client.take_events().read::<TriggerEvent>().collect();
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].name, "Pinged");
    assert_eq!(
        triggers[0].target.as_ref().map(|target| target.as_str()),
        Some(profile.as_str())
    );
}

#[test]
fn parent_event_without_a_parent_is_dropped() {
    init_logger();
    let server = TestServer::new();
    let mut client = TestClient::load(&server.page::<Profile>(None, json!({})));

    client.call_action("profile", "Announce", Value::Null);
    assert_eq!(exchange(&server, &mut client), 1);
    assert_eq!(client.take_events().read::<TriggerEvent>().count(), 0);
    assert_eq!(client.text("avatar", "avatar-saves"), "0");
}
