/// Tests for action calls the component can't serve
/// A call naming the wrong parameters fails as a whole and changes nothing,
/// the component stays usable afterwards.

use serde_json::json;

use tether_client::{ClientError, ErrorEvent, QueueState};
use tether_test::{exchange, Profile, TestClient, TestServer};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn loaded() -> (TestServer, TestClient) {
    let server = TestServer::new();
    let client = TestClient::load(&server.page::<Profile>(None, json!({ "name": "Ada" })));
    (server, client)
}

fn failures(client: &mut TestClient) -> Vec<ClientError> {
    client.take_events().read::<ErrorEvent>().collect()
}

#[test]
fn missing_parameter_is_rejected() {
    init_logger();
    let (server, mut client) = loaded();
    let token = client.token("profile");

    client.call_action("profile", "Rename", json!({}));
    assert_eq!(exchange(&server, &mut client), 1);

    match &failures(&mut client)[..] {
        [ClientError::RequestFailed { status, message }] => {
            assert_eq!(*status, 500);
            assert!(message.starts_with("Wrong action parameters"));
        }
        other => panic!("unexpected errors {other:?}"),
    }
    assert_eq!(client.token("profile"), token);
    assert_eq!(client.value(client.field("profile", "name")), "Ada");
}

#[test]
fn extra_parameter_is_rejected() {
    init_logger();
    let (server, mut client) = loaded();

    client.call_action("profile", "Rename", json!({ "name": "Grace", "title": "Rear Admiral" }));
    exchange(&server, &mut client);
    assert_eq!(failures(&mut client).len(), 1);
    assert_eq!(client.value(client.field("profile", "name")), "Ada");
}

#[test]
fn unknown_action_is_rejected() {
    init_logger();
    let (server, mut client) = loaded();

    client.call_action("profile", "Delete", json!({}));
    exchange(&server, &mut client);
    assert!(matches!(
        &failures(&mut client)[..],
        [ClientError::RequestFailed { status: 500, .. }]
    ));
}

#[test]
fn component_recovers_after_a_rejected_call() {
    init_logger();
    let (server, mut client) = loaded();
    let profile = client.component_id("profile");

    client.call_action("profile", "Rename", json!({}));
    exchange(&server, &mut client);
    assert_eq!(client.client().queue_state(&profile), QueueState::Idle);

    // action names match case-insensitively
    client.call_action("profile", "rename", json!({ "name": "Grace" }));
    assert_eq!(exchange(&server, &mut client), 1);
    assert!(failures(&mut client).is_empty());
    assert_eq!(client.value(client.field("profile", "name")), "Grace");
}
