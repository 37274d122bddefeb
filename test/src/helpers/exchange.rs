use http::Response;

use tether_client::{OutgoingRequest, Ticket};

use super::{TestClient, TestServer};

/// Rounds after which a test is considered to be looping
const MAX_ROUNDS: usize = 64;

/// Sends whatever the client has ready to the server and applies the
/// responses, until the client has nothing left to send. Returns how many
/// requests went out.
pub fn exchange(server: &TestServer, client: &mut TestClient) -> usize {
    let mut sent = 0;
    for _ in 0..MAX_ROUNDS {
        let requests = client.poll();
        if requests.is_empty() {
            return sent;
        }
        sent += requests.len();
        for (ticket, response) in send(server, requests) {
            client.receive(ticket, response);
        }
    }
    panic!("client still sending after {MAX_ROUNDS} rounds");
}

/// Answers `requests` without handing the responses to the client, so a
/// test can deliver them in any order
pub fn send(server: &TestServer, requests: Vec<OutgoingRequest>) -> Vec<(Ticket, Response<String>)> {
    requests
        .into_iter()
        .map(|outgoing| (outgoing.ticket, server.handle(&outgoing.request)))
        .collect()
}
