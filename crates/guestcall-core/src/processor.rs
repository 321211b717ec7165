//! Folds inbound stream frames into the roster and derives the
//! call-progress signals from roster transitions.

use std::sync::Arc;

use regex::Regex;
use tokio::sync::mpsc;
use url::Url;

use crate::errors::ChatError;
use crate::events::{EventBody, EventKind, StreamEvent};
use crate::roster::{Member, MemberRole, MemberState, Roster};
use crate::side_channel::SideChannelClient;
use crate::signals::SignalDispatcher;

/// What the receive loop should do after a unit of processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Continue,
    /// A fatal condition was delivered; the session must tear down.
    Teardown,
}

/// Per-frame event processor.
///
/// Owned exclusively by the session receive loop, so all roster mutation
/// happens on one timeline and every signal check observes a consistent
/// before/after state. Member hydration runs on its own task and
/// re-enters the timeline through `updates`.
pub struct EventProcessor {
    conversation_id: String,
    member_id: String,
    roster: Roster,
    signals: Arc<SignalDispatcher>,
    side_channel: Arc<SideChannelClient>,
    updates: mpsc::Sender<Member>,
}

impl EventProcessor {
    pub fn new(
        conversation_id: String,
        member_id: String,
        signals: Arc<SignalDispatcher>,
        side_channel: Arc<SideChannelClient>,
        updates: mpsc::Sender<Member>,
    ) -> Self {
        Self {
            conversation_id,
            member_id,
            roster: Roster::new(),
            signals,
            side_channel,
            updates,
        }
    }

    /// Handle one raw text frame from the event stream. Malformed frames
    /// are dropped; they never kill the loop.
    pub fn on_frame(&mut self, raw: &str) -> ProcessOutcome {
        let event: StreamEvent = match serde_json::from_str(raw) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("dropping undecodable frame: {e}");
                return ProcessOutcome::Continue;
            }
        };

        match event.kind() {
            EventKind::Message => self.handle_message(event.event_body),
            EventKind::MemberChange => self.handle_member_change(event.event_body),
            EventKind::Other => {
                tracing::debug!("ignoring event on topic {}", event.topic_name);
                ProcessOutcome::Continue
            }
        }
    }

    /// A hydrated member profile arriving back on the event timeline.
    pub fn on_hydrated(&mut self, member: Member) -> ProcessOutcome {
        self.mutate(|roster| roster.upsert(member))
    }

    fn handle_message(&mut self, body: EventBody) -> ProcessOutcome {
        if !self.is_own_conversation(&body) {
            return ProcessOutcome::Continue;
        }

        match body.body_type.as_deref() {
            Some("member-join") => self.handle_member_join(body),
            Some("member-leave") => self.handle_member_leave(body),
            Some("notice") => self.handle_notice(body),
            _ => ProcessOutcome::Continue,
        }
    }

    fn handle_member_change(&mut self, body: EventBody) -> ProcessOutcome {
        if !self.is_own_conversation(&body) {
            return ProcessOutcome::Continue;
        }

        let Some(record) = body.member else {
            tracing::warn!("dropping member-change without member payload");
            return ProcessOutcome::Continue;
        };

        // A change for a member we have never seen is not an error.
        if self.roster.get(&record.id).is_none() {
            return ProcessOutcome::Continue;
        }

        let state = MemberState::parse(&record.state);
        self.mutate(|roster| roster.update_state(&record.id, state))
    }

    fn handle_member_join(&mut self, body: EventBody) -> ProcessOutcome {
        let Some(sender) = body.sender else {
            tracing::warn!("dropping member-join without sender");
            return ProcessOutcome::Continue;
        };

        let id = sender.id;
        let outcome = self.mutate(|roster| roster.upsert(Member::placeholder(id.clone())));
        self.spawn_hydration(id);
        outcome
    }

    fn handle_member_leave(&mut self, body: EventBody) -> ProcessOutcome {
        let Some(sender) = body.sender else {
            tracing::warn!("dropping member-leave without sender");
            return ProcessOutcome::Continue;
        };

        self.mutate(|roster| roster.remove(&sender.id))
    }

    fn handle_notice(&mut self, body: EventBody) -> ProcessOutcome {
        let Some(sender) = body.sender else {
            return ProcessOutcome::Continue;
        };

        // Only agent notices can carry a ticket.
        match self.roster.get(&sender.id) {
            Some(member) if member.role == MemberRole::Agent => {}
            _ => return ProcessOutcome::Continue,
        }

        let Some(text) = body.body else {
            return ProcessOutcome::Continue;
        };

        if let Some(ticket) = extract_ticket(&text) {
            tracing::info!("ticket received");
            self.signals.ticket(&ticket);
        }

        ProcessOutcome::Continue
    }

    fn is_own_conversation(&self, body: &EventBody) -> bool {
        match body.conversation.as_ref() {
            Some(conversation) if conversation.id == self.conversation_id => true,
            Some(conversation) => {
                tracing::info!("ignoring event of unknown conversation {}", conversation.id);
                false
            }
            None => {
                tracing::warn!("dropping event without conversation id");
                false
            }
        }
    }

    fn spawn_hydration(&self, member_id: String) {
        let side_channel = self.side_channel.clone();
        let updates = self.updates.clone();
        tokio::spawn(async move {
            if let Some(member) = side_channel.hydrate_member(&member_id).await {
                let _ = updates.send(member).await;
            }
        });
    }

    /// Apply one roster mutation, then evaluate the derived signals.
    /// The customer-disconnect predicate compares against the
    /// pre-mutation entry for the local customer's own id.
    fn mutate<F>(&mut self, apply: F) -> ProcessOutcome
    where
        F: FnOnce(&mut Roster),
    {
        let own_before = self.roster.get(&self.member_id).cloned();
        apply(&mut self.roster);
        self.check_queued();
        self.check_agent_connected();
        self.check_customer_disconnected(own_before)
    }

    fn check_queued(&self) {
        if self.roster.any_in(&MemberRole::Acd, &MemberState::Connected) {
            self.signals.queued();
        }
    }

    fn check_agent_connected(&self) {
        if !self.roster.any_in(&MemberRole::Agent, &MemberState::Connected) {
            return;
        }

        if let Some(notice) = self.signals.agent_connected() {
            if !notice.is_empty() {
                let side_channel = self.side_channel.clone();
                tokio::spawn(async move { side_channel.send_notice(&notice).await });
            }
        }
    }

    fn check_customer_disconnected(&self, own_before: Option<Member>) -> ProcessOutcome {
        // A customer never observed in the roster cannot disconnect.
        let Some(before) = own_before else {
            return ProcessOutcome::Continue;
        };

        match self.roster.get(&self.member_id) {
            None => self.customer_disconnected(),
            Some(now) => {
                if before.state != MemberState::Disconnected
                    && now.state == MemberState::Disconnected
                {
                    self.customer_disconnected()
                } else {
                    ProcessOutcome::Continue
                }
            }
        }
    }

    fn customer_disconnected(&self) -> ProcessOutcome {
        let delivered = self.signals.error(ChatError::CustomerDisconnected {
            conversation_id: self.conversation_id.clone(),
            member_id: self.member_id.clone(),
        });
        if delivered {
            ProcessOutcome::Teardown
        } else {
            ProcessOutcome::Continue
        }
    }
}

/// Extract the conference ticket from an agent notice.
///
/// The notice must be an absolute http(s) URL; the ticket is the
/// trailing 7 characters of its path. Shorter paths pass through whole.
fn extract_ticket(body: &str) -> Option<String> {
    let shape = Regex::new(r"^https?://\w+(\.\w+)*(:[0-9]+)?(/.*)?$").unwrap();
    if !shape.is_match(body) {
        return None;
    }

    let url = Url::parse(body).ok()?;
    let path = url.path();
    let start = path.char_indices().rev().nth(6).map(|(i, _)| i).unwrap_or(0);
    Some(path[start..].to_string())
}
