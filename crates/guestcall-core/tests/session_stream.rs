//! End-to-end session scenarios against a local websocket server and a
//! mocked REST backend.

use std::sync::Arc;
use std::time::Duration;

use futures_util::SinkExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use guestcall_core::{
    ChatCredentials, ChatError, ChatSession, ProvisionedMember, SessionState,
    TicketProgressListener,
};

const CONV: &str = "conv-1";
const CUSTOMER: &str = "cust-1";

#[derive(Debug, Clone, PartialEq)]
enum Signal {
    StreamConnected,
    Queued,
    AgentConnected,
    Ticket(String),
    Error(String),
}

struct RecordingListener {
    tx: mpsc::UnboundedSender<Signal>,
    notice: String,
}

impl TicketProgressListener for RecordingListener {
    fn on_stream_connected(&self) {
        let _ = self.tx.send(Signal::StreamConnected);
    }

    fn on_queued(&self) {
        let _ = self.tx.send(Signal::Queued);
    }

    fn on_agent_connected(&self) -> String {
        let _ = self.tx.send(Signal::AgentConnected);
        self.notice.clone()
    }

    fn on_ticket(&self, ticket: &str) {
        let _ = self.tx.send(Signal::Ticket(ticket.to_string()));
    }

    fn on_error(&self, error: ChatError) {
        let _ = self.tx.send(Signal::Error(error.to_string()));
    }
}

/// One-shot websocket server pushing whatever the test feeds it.
/// Dropping the returned sender closes the stream from the server side.
async fn start_stream_server() -> (String, mpsc::Sender<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (frame_tx, mut frame_rx) = mpsc::channel::<String>(32);

    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
        while let Some(frame) = frame_rx.recv().await {
            if ws.send(Message::text(frame)).await.is_err() {
                break;
            }
        }
    });

    (format!("ws://{addr}"), frame_tx)
}

fn credentials(event_stream_uri: String) -> ChatCredentials {
    ChatCredentials {
        id: CONV.to_string(),
        access_token: "token-1".to_string(),
        event_stream_uri,
        member: ProvisionedMember {
            id: CUSTOMER.to_string(),
        },
    }
}

fn session_with_listener(
    event_stream_uri: String,
    api_base: String,
    notice: &str,
) -> (ChatSession, mpsc::UnboundedReceiver<Signal>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let listener = Arc::new(RecordingListener {
        tx,
        notice: notice.to_string(),
    });
    let session = ChatSession::with_credentials(credentials(event_stream_uri), api_base, listener);
    (session, rx)
}

async fn next_signal(rx: &mut mpsc::UnboundedReceiver<Signal>) -> Signal {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for signal")
        .expect("listener channel closed")
}

async fn wait_for_state(session: &ChatSession, wanted: SessionState) {
    for _ in 0..100 {
        if session.state().await == wanted {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("session never reached {wanted:?}");
}

async fn mount_member_profile(server: &MockServer, member_id: &str, state: &str, role: &str) {
    Mock::given(method("GET"))
        .and(path(format!(
            "/api/v2/webchat/guest/conversations/{CONV}/members/{member_id}"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": member_id,
            "state": state,
            "role": role
        })))
        .mount(server)
        .await;
}

fn join_frame(sender_id: &str) -> String {
    serde_json::json!({
        "topicName": format!("v2.conversations.chats.{CONV}.messages"),
        "eventBody": {
            "conversation": { "id": CONV },
            "sender": { "id": sender_id },
            "bodyType": "member-join"
        },
        "metadata": { "CorrelationId": "corr", "type": "message" }
    })
    .to_string()
}

fn leave_frame(sender_id: &str) -> String {
    serde_json::json!({
        "topicName": format!("v2.conversations.chats.{CONV}.messages"),
        "eventBody": {
            "conversation": { "id": CONV },
            "sender": { "id": sender_id },
            "bodyType": "member-leave"
        },
        "metadata": { "correlationId": "corr", "type": "message" }
    })
    .to_string()
}

fn notice_frame(sender_id: &str, body: &str) -> String {
    serde_json::json!({
        "topicName": format!("v2.conversations.chats.{CONV}.messages"),
        "eventBody": {
            "conversation": { "id": CONV },
            "sender": { "id": sender_id },
            "body": body,
            "bodyType": "notice"
        },
        "metadata": { "correlationId": "corr", "type": "message" }
    })
    .to_string()
}

#[tokio::test]
async fn chat_progresses_from_queue_to_ticket() {
    let rest = MockServer::start().await;
    mount_member_profile(&rest, "acd-1", "CONNECTED", "ACD").await;
    mount_member_profile(&rest, "agent-1", "CONNECTED", "AGENT").await;

    Mock::given(method("POST"))
        .and(path(format!(
            "/api/v2/webchat/guest/conversations/{CONV}/members/{CUSTOMER}/messages"
        )))
        .and(body_partial_json(serde_json::json!({
            "body": "Hello",
            "bodyType": "notice"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&rest)
        .await;

    Mock::given(method("DELETE"))
        .and(path(format!(
            "/api/v2/webchat/guest/conversations/{CONV}/members/{CUSTOMER}"
        )))
        .respond_with(ResponseTemplate::new(204))
        .mount(&rest)
        .await;

    let (stream_uri, frames) = start_stream_server().await;
    let (session, mut rx) = session_with_listener(stream_uri, rest.uri(), "Hello");

    session.connect().await.unwrap();
    assert_eq!(next_signal(&mut rx).await, Signal::StreamConnected);
    assert_eq!(session.state().await, SessionState::Connected);

    frames.send(join_frame("acd-1")).await.unwrap();
    assert_eq!(next_signal(&mut rx).await, Signal::Queued);

    frames.send(join_frame("agent-1")).await.unwrap();
    assert_eq!(next_signal(&mut rx).await, Signal::AgentConnected);

    frames
        .send(notice_frame("agent-1", "https://x.test/1234567"))
        .await
        .unwrap();
    assert_eq!(
        next_signal(&mut rx).await,
        Signal::Ticket("1234567".to_string())
    );

    // Give the fire-and-forget notice POST time to land, then check it
    // went out exactly once.
    tokio::time::sleep(Duration::from_millis(300)).await;
    rest.verify().await;

    session.disconnect().await;
    assert_eq!(session.state().await, SessionState::Disconnected);
}

#[tokio::test]
async fn own_member_leave_tears_session_down() {
    let rest = MockServer::start().await;
    mount_member_profile(&rest, CUSTOMER, "CONNECTED", "CUSTOMER").await;

    Mock::given(method("DELETE"))
        .and(path(format!(
            "/api/v2/webchat/guest/conversations/{CONV}/members/{CUSTOMER}"
        )))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&rest)
        .await;

    let (stream_uri, frames) = start_stream_server().await;
    let (session, mut rx) = session_with_listener(stream_uri, rest.uri(), "");

    session.connect().await.unwrap();
    assert_eq!(next_signal(&mut rx).await, Signal::StreamConnected);

    frames.send(join_frame(CUSTOMER)).await.unwrap();
    frames.send(leave_frame(CUSTOMER)).await.unwrap();

    match next_signal(&mut rx).await {
        Signal::Error(message) => assert!(message.contains("disconnected")),
        other => panic!("expected error signal, got {other:?}"),
    }

    wait_for_state(&session, SessionState::Disconnected).await;

    // A later explicit disconnect is a no-op; the DELETE stays at one.
    session.disconnect().await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    rest.verify().await;
}

#[tokio::test]
async fn stream_close_delivers_transport_error() {
    let rest = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path(format!(
            "/api/v2/webchat/guest/conversations/{CONV}/members/{CUSTOMER}"
        )))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&rest)
        .await;

    let (stream_uri, frames) = start_stream_server().await;
    let (session, mut rx) = session_with_listener(stream_uri, rest.uri(), "");

    session.connect().await.unwrap();
    assert_eq!(next_signal(&mut rx).await, Signal::StreamConnected);

    // Server goes away: the receive loop must surface one transport
    // error and tear the session down on its own.
    drop(frames);

    match next_signal(&mut rx).await {
        Signal::Error(message) => assert!(message.contains("event stream")),
        other => panic!("expected error signal, got {other:?}"),
    }

    wait_for_state(&session, SessionState::Disconnected).await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    rest.verify().await;
}

#[tokio::test]
async fn disconnect_twice_issues_single_delete() {
    let rest = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path(format!(
            "/api/v2/webchat/guest/conversations/{CONV}/members/{CUSTOMER}"
        )))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&rest)
        .await;

    let (stream_uri, _frames) = start_stream_server().await;
    let (session, mut rx) = session_with_listener(stream_uri, rest.uri(), "");

    session.connect().await.unwrap();
    assert_eq!(next_signal(&mut rx).await, Signal::StreamConnected);

    session.disconnect().await;
    session.disconnect().await;
    assert_eq!(session.state().await, SessionState::Disconnected);

    tokio::time::sleep(Duration::from_millis(300)).await;
    rest.verify().await;
}

#[tokio::test]
async fn connect_is_only_valid_when_idle() {
    let rest = MockServer::start().await;
    let (stream_uri, _frames) = start_stream_server().await;
    let (session, mut rx) = session_with_listener(stream_uri, rest.uri(), "");

    session.connect().await.unwrap();
    assert_eq!(next_signal(&mut rx).await, Signal::StreamConnected);

    let err = session.connect().await.unwrap_err();
    assert!(matches!(err, ChatError::Transport(_)));
}

#[tokio::test]
async fn connect_failure_is_returned_to_the_caller() {
    let rest = MockServer::start().await;
    // Nothing listens on this port.
    let (session, _rx) = session_with_listener(
        "ws://127.0.0.1:9".to_string(),
        rest.uri(),
        "",
    );

    let err = session.connect().await.unwrap_err();
    assert!(matches!(err, ChatError::Transport(_)));
    assert_eq!(session.state().await, SessionState::Disconnected);
}
