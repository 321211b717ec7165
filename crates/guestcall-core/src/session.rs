//! Top-level orchestrator for one guest conversation.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;

use crate::errors::ChatError;
use crate::processor::{EventProcessor, ProcessOutcome};
use crate::provision::{ChatCredentials, ChatProvisioner, ProvisionConfig};
use crate::roster::Member;
use crate::side_channel::SideChannelClient;
use crate::signals::{SignalDispatcher, TicketProgressListener};

/// Session lifecycle. `Disconnected` is terminal; a new session must be
/// constructed to chat again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
}

type EventStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// One provisioned guest conversation and its event stream.
///
/// Owns the stream connection lifecycle, feeds every inbound frame to
/// the event processor, and exposes the credentials the conferencing
/// layer needs once a ticket arrives.
pub struct ChatSession {
    credentials: ChatCredentials,
    signals: Arc<SignalDispatcher>,
    side_channel: Arc<SideChannelClient>,
    state: Arc<Mutex<SessionState>>,
    receive_task: Mutex<Option<JoinHandle<()>>>,
}

impl ChatSession {
    /// Provision a conversation and build a session over it.
    pub async fn provision(
        config: &ProvisionConfig,
        listener: Arc<dyn TicketProgressListener>,
    ) -> Result<Self, ChatError> {
        let credentials = ChatProvisioner::provision(config).await?;
        Ok(Self::with_credentials(
            credentials,
            config.api_base.clone(),
            listener,
        ))
    }

    /// Build a session from credentials obtained elsewhere.
    pub fn with_credentials(
        credentials: ChatCredentials,
        api_base: String,
        listener: Arc<dyn TicketProgressListener>,
    ) -> Self {
        let side_channel = Arc::new(SideChannelClient::new(
            api_base,
            credentials.id.clone(),
            credentials.member.id.clone(),
            credentials.access_token.clone(),
        ));

        Self {
            credentials,
            signals: Arc::new(SignalDispatcher::new(listener)),
            side_channel,
            state: Arc::new(Mutex::new(SessionState::Idle)),
            receive_task: Mutex::new(None),
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.credentials.id
    }

    pub fn member_id(&self) -> &str {
        &self.credentials.member.id
    }

    pub fn access_token(&self) -> &str {
        &self.credentials.access_token
    }

    pub async fn state(&self) -> SessionState {
        *self.state.lock().await
    }

    /// Open the event stream. Valid only on an idle session.
    pub async fn connect(&self) -> Result<(), ChatError> {
        let mut request = self
            .credentials
            .event_stream_uri
            .clone()
            .into_client_request()
            .map_err(|e| ChatError::Transport(format!("invalid event stream uri: {e}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.credentials.access_token))
            .map_err(|e| ChatError::Transport(format!("invalid access token: {e}")))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        {
            let mut state = self.state.lock().await;
            if *state != SessionState::Idle {
                return Err(ChatError::Transport(format!(
                    "connect is not valid in state {:?}",
                    *state
                )));
            }
            *state = SessionState::Connecting;
        }

        let (stream, _) = match connect_async(request).await {
            Ok(connected) => connected,
            Err(e) => {
                *self.state.lock().await = SessionState::Disconnected;
                return Err(ChatError::Transport(format!(
                    "event stream connect failed: {e}"
                )));
            }
        };

        tracing::info!(
            "event stream connected for conversation {}",
            self.credentials.id
        );
        *self.state.lock().await = SessionState::Connected;
        // One session opens exactly one stream, so this fires once by
        // construction and needs no latch.
        self.signals.stream_connected();

        let (update_tx, update_rx) = mpsc::channel(32);
        let processor = EventProcessor::new(
            self.credentials.id.clone(),
            self.credentials.member.id.clone(),
            self.signals.clone(),
            self.side_channel.clone(),
            update_tx,
        );

        let handle = tokio::spawn(receive_loop(
            stream,
            update_rx,
            processor,
            self.signals.clone(),
            self.side_channel.clone(),
            self.state.clone(),
        ));
        *self.receive_task.lock().await = Some(handle);

        Ok(())
    }

    /// Tear the session down. Valid from any state and idempotent: only
    /// the first call cancels the stream and deletes the membership.
    pub async fn disconnect(&self) {
        if !begin_teardown(&self.state, &self.side_channel).await {
            return;
        }

        if let Some(handle) = self.receive_task.lock().await.take() {
            handle.abort();
        }
    }
}

/// Check-and-set into `Disconnecting`, issue the best-effort membership
/// DELETE, and land in `Disconnected`. Returns false when teardown has
/// already happened, so the DELETE goes out at most once per session.
async fn begin_teardown(
    state: &Arc<Mutex<SessionState>>,
    side_channel: &Arc<SideChannelClient>,
) -> bool {
    let mut state = state.lock().await;
    if matches!(
        *state,
        SessionState::Disconnecting | SessionState::Disconnected
    ) {
        return false;
    }
    *state = SessionState::Disconnecting;

    let side_channel = side_channel.clone();
    tokio::spawn(async move { side_channel.remove_membership().await });

    *state = SessionState::Disconnected;
    true
}

/// Single-timeline receive loop: inbound frames and hydration results
/// are folded into the processor one at a time, in arrival order.
async fn receive_loop(
    mut stream: EventStream,
    mut updates: mpsc::Receiver<Member>,
    mut processor: EventProcessor,
    signals: Arc<SignalDispatcher>,
    side_channel: Arc<SideChannelClient>,
    state: Arc<Mutex<SessionState>>,
) {
    loop {
        let outcome = tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => processor.on_frame(text.as_str()),
                Some(Ok(Message::Binary(data))) => {
                    tracing::debug!("ignoring binary frame of {} bytes", data.len());
                    ProcessOutcome::Continue
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                    ProcessOutcome::Continue
                }
                Some(Ok(Message::Close(_))) | None => {
                    signals.error(ChatError::Transport("event stream closed".to_string()));
                    ProcessOutcome::Teardown
                }
                Some(Err(e)) => {
                    signals.error(ChatError::Transport(format!(
                        "event stream receive failed: {e}"
                    )));
                    ProcessOutcome::Teardown
                }
            },
            update = updates.recv() => match update {
                Some(member) => processor.on_hydrated(member),
                // The processor keeps a sender alive, so this arm is
                // unreachable while the loop runs.
                None => ProcessOutcome::Continue,
            },
        };

        if outcome == ProcessOutcome::Teardown {
            begin_teardown(&state, &side_channel).await;
            break;
        }
    }

    tracing::info!("event stream loop ended");
}
