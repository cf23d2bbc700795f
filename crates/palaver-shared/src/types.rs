use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identity of one authenticated user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Normalize an on-disk sender value, accepting both the legacy bare
    /// form and the structured `user:<id>` form.
    pub fn from_stored(s: &str) -> Self {
        Self::new(s.strip_prefix(USER_PREFIX).unwrap_or(s))
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// String tag identifying a multi-member conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct GroupId(pub String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one live connection, used to guard against a stale
/// disconnect evicting a newer registration for the same user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ConnId(pub Uuid);

impl ConnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

const GROUP_PREFIX: &str = "group:";
const USER_PREFIX: &str = "user:";

/// A recipient reference: either a single identity or a group tag.
///
/// On the wire a group is `group:<id>` and a user is the bare identity
/// string. On disk a user identity additionally has a legacy bare form and
/// a structured `user:<id>` form; both denote the same identity and every
/// reader must treat them as equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PeerRef {
    User(UserId),
    Group(GroupId),
}

impl PeerRef {
    /// Parse the wire form: `group:<id>` denotes a group, anything else a
    /// user identity.
    pub fn from_wire(s: &str) -> Self {
        match s.strip_prefix(GROUP_PREFIX) {
            Some(id) => PeerRef::Group(GroupId::new(id)),
            None => PeerRef::User(UserId::new(s)),
        }
    }

    /// Wire (and canonical response) form.
    pub fn to_wire(&self) -> String {
        match self {
            PeerRef::User(id) => id.0.clone(),
            PeerRef::Group(id) => format!("{GROUP_PREFIX}{id}"),
        }
    }

    /// Normalize an on-disk identifier, accepting both the legacy bare
    /// form and the structured `user:<id>` form.
    pub fn from_stored(s: &str) -> Self {
        match s.strip_prefix(USER_PREFIX) {
            Some(id) => PeerRef::User(UserId::new(id)),
            None => Self::from_wire(s),
        }
    }

    /// The structured column value written for new rows.
    pub fn to_stored(&self) -> String {
        match self {
            PeerRef::User(id) => format!("{USER_PREFIX}{id}"),
            PeerRef::Group(id) => format!("{GROUP_PREFIX}{id}"),
        }
    }

    /// Every on-disk form that denotes this reference. A single-form query
    /// silently loses history written under the other representation.
    pub fn stored_forms(&self) -> Vec<String> {
        match self {
            PeerRef::User(id) => vec![id.0.clone(), self.to_stored()],
            PeerRef::Group(_) => vec![self.to_stored()],
        }
    }

    pub fn as_user(&self) -> Option<&UserId> {
        match self {
            PeerRef::User(id) => Some(id),
            PeerRef::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&GroupId> {
        match self {
            PeerRef::Group(id) => Some(id),
            PeerRef::User(_) => None,
        }
    }
}

impl From<String> for PeerRef {
    fn from(s: String) -> Self {
        Self::from_wire(&s)
    }
}

impl From<PeerRef> for String {
    fn from(r: PeerRef) -> Self {
        r.to_wire()
    }
}

impl From<UserId> for PeerRef {
    fn from(id: UserId) -> Self {
        PeerRef::User(id)
    }
}

impl std::fmt::Display for PeerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_wire())
    }
}

/// Media requested for a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

/// Typed payload of a chat message. File and voice messages carry the
/// object produced by the upload step; the raw bytes live elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageBody {
    Text {
        text: String,
    },
    File {
        file_url: String,
        file_name: String,
        file_size: u64,
    },
    Voice {
        file_url: String,
        file_name: String,
        file_size: u64,
    },
}

/// Canonical persisted chat message, as returned by the persistence
/// boundary and relayed over the real-time channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub from: UserId,
    pub to: PeerRef,
    #[serde(flatten)]
    pub body: MessageBody,
    pub created_at: DateTime<Utc>,
}
