/// E2E TEST: a stale response never undoes newer typing
///
/// The user types "a", the bind goes out, then keeps typing "ab" before the
/// response comes back. The response to "a" leaves the field alone, the
/// response to "ab" applies and clears the dirty mark.

use std::time::Duration;

use serde_json::json;

use tether_client::{shared::headers, QueueState};
use tether_test::{exchange, send, Profile, TestClient, TestServer};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

#[test]
fn stale_bind_response_is_skipped_for_the_edited_field() {
    init_logger();
    let server = TestServer::new();
    let mut client = TestClient::load(&server.page::<Profile>(None, json!({})));
    let profile = client.component_id("profile");

    client.type_text("profile", "name", "a");
    client.advance(ms(350));
    let first = client.poll();
    assert_eq!(first.len(), 1);
    let first_operation = first[0]
        .request
        .headers()
        .get(headers::OPERATION_ID)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap();
    let first_token = client.token("profile");

    client.advance(ms(10));
    client.type_text("profile", "name", "ab");
    let second_operation = client
        .client()
        .dirty_operation(&profile, "name")
        .cloned()
        .unwrap();
    assert_ne!(second_operation.as_str(), first_operation);

    for (ticket, response) in send(&server, first) {
        client.receive(ticket, response);
    }
    let name = client.field("profile", "name");
    assert_eq!(client.value(name), "ab");
    assert_ne!(client.token("profile"), first_token);
    assert_eq!(
        client.client().dirty_operation(&profile, "name"),
        Some(&second_operation)
    );

    client.advance(ms(350));
    assert_eq!(exchange(&server, &mut client), 1);
    let name = client.field("profile", "name");
    assert_eq!(client.value(name), "ab");
    assert_eq!(client.document().attribute(name, "value"), Some("ab"));
    assert!(client.client().dirty_operation(&profile, "name").is_none());
    assert_eq!(client.client().queue_state(&profile), QueueState::Idle);
}

#[test]
fn other_fields_are_patched_around_the_dirty_one() {
    init_logger();
    let server = TestServer::new();
    let mut client = TestClient::load(&server.page::<Profile>(None, json!({})));

    client.type_text("profile", "email", "nope");
    client.advance(ms(350));
    let first = client.poll();

    client.type_text("profile", "name", "Ada");
    for (ticket, response) in send(&server, first) {
        client.receive(ticket, response);
    }
    let name = client.field("profile", "name");
    let email = client.field("profile", "email");
    assert_eq!(client.value(name), "Ada");
    assert_eq!(client.document().attribute(email, "value"), Some("nope"));
    assert_eq!(client.text("profile", "email-error"), "Email is invalid");
}

#[test]
fn binds_of_one_component_go_out_one_at_a_time() {
    init_logger();
    let server = TestServer::new();
    let mut client = TestClient::load(&server.page::<Profile>(None, json!({})));
    let profile = client.component_id("profile");

    client.type_text("profile", "name", "a");
    client.advance(ms(350));
    let first = client.poll();
    assert_eq!(first.len(), 1);

    client.type_text("profile", "name", "ab");
    client.advance(ms(350));
    assert!(client.poll().is_empty());
    assert_eq!(client.client().queue_state(&profile), QueueState::InFlight);

    for (ticket, response) in send(&server, first) {
        client.receive(ticket, response);
    }
    assert_eq!(exchange(&server, &mut client), 1);
    assert_eq!(client.value(client.field("profile", "name")), "ab");
}
