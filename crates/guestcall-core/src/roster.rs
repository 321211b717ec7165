use std::collections::HashMap;

use crate::events::MemberRecord;

/// Connection state of a conversation member.
///
/// The backend sends free-form strings; anything we do not recognize is
/// preserved in `Other` rather than rejected. Parsing is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberState {
    Unknown,
    Connecting,
    Connected,
    Disconnected,
    Other(String),
}

impl MemberState {
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("connected") {
            Self::Connected
        } else if raw.eq_ignore_ascii_case("disconnected") {
            Self::Disconnected
        } else if raw.eq_ignore_ascii_case("connecting") {
            Self::Connecting
        } else if raw.eq_ignore_ascii_case("unknown") {
            Self::Unknown
        } else {
            Self::Other(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Unknown => "unknown",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Other(raw) => raw,
        }
    }
}

/// Role of a conversation member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberRole {
    Agent,
    Acd,
    Customer,
    Unknown,
    Other(String),
}

impl MemberRole {
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("agent") {
            Self::Agent
        } else if raw.eq_ignore_ascii_case("acd") {
            Self::Acd
        } else if raw.eq_ignore_ascii_case("customer") {
            Self::Customer
        } else if raw.eq_ignore_ascii_case("unknown") {
            Self::Unknown
        } else {
            Self::Other(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Agent => "agent",
            Self::Acd => "acd",
            Self::Customer => "customer",
            Self::Unknown => "unknown",
            Self::Other(raw) => raw,
        }
    }
}

/// A conversation member. Identity is the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: String,
    pub state: MemberState,
    pub role: MemberRole,
}

impl Member {
    /// A freshly joined member before its profile has been fetched.
    pub fn placeholder(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: MemberState::Unknown,
            role: MemberRole::Unknown,
        }
    }
}

impl From<MemberRecord> for Member {
    fn from(record: MemberRecord) -> Self {
        Self {
            id: record.id,
            state: MemberState::parse(&record.state),
            role: MemberRole::parse(&record.role),
        }
    }
}

/// Live mapping of member id to member record for one conversation.
///
/// Mutated exclusively by the session receive loop through the three
/// operations below; at most one entry per id at any time.
#[derive(Debug, Default)]
pub struct Roster {
    members: HashMap<String, Member>,
}

impl Roster {
    pub fn new() -> Self {
        Self {
            members: HashMap::new(),
        }
    }

    /// Insert a member, replacing any existing entry for the same id.
    pub fn upsert(&mut self, member: Member) {
        self.members.insert(member.id.clone(), member);
    }

    /// Change a known member's state, preserving its role.
    /// A change for a member we have never seen is ignored.
    pub fn update_state(&mut self, id: &str, state: MemberState) {
        if let Some(member) = self.members.get_mut(id) {
            member.state = state;
        }
    }

    pub fn remove(&mut self, id: &str) {
        self.members.remove(id);
    }

    pub fn get(&self, id: &str) -> Option<&Member> {
        self.members.get(id)
    }

    /// Whether any member matches the given role and state.
    pub fn any_in(&self, role: &MemberRole, state: &MemberState) -> bool {
        self.members
            .values()
            .any(|m| m.role == *role && m.state == *state)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
