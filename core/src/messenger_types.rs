/// Shared types for the messaging layer
use crate::message_store::Message;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque user identifier, owned by the external directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

/// Opaque course identifier, owned by the external course catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseId(pub u64);

/// Message identifier, allocated by the message store (monotonic)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user#{}", self.0)
    }
}

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "course#{}", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg#{}", self.0)
    }
}

/// Kind of a stored message; notifications share the log with personal messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Message,
    Notification,
}

impl MessageKind {
    pub(crate) fn as_byte(self) -> u8 {
        match self {
            MessageKind::Message => 0,
            MessageKind::Notification => 1,
        }
    }

    pub(crate) fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(MessageKind::Message),
            1 => Some(MessageKind::Notification),
            _ => None,
        }
    }
}

impl std::str::FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "message" => Ok(MessageKind::Message),
            "notification" => Ok(MessageKind::Notification),
            other => Err(format!("unknown message kind: {}", other)),
        }
    }
}

/// Summary of one conversation thread, from the viewing user's side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// The other party
    pub counterpart: UserId,
    /// Counterpart's display name (None if the directory no longer knows them)
    pub fullname: Option<String>,
    /// Most recent visible message in the thread
    pub last_message: Message,
    /// Unread messages addressed to the viewer from the counterpart
    pub unread_count: usize,
    /// True if the last message was sent by the viewer, or was addressed to them and read
    pub is_read: bool,
    pub is_online: bool,
    /// Viewer has blocked the counterpart
    pub is_blocked: bool,
}

/// A contact as listed for its owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSummary {
    pub user_id: UserId,
    pub fullname: Option<String>,
    pub is_online: bool,
    pub is_blocked: bool,
}

/// Public view of a user, filtered by what the viewer may see
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: UserId,
    pub fullname: String,
    pub email: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub is_online: bool,
    /// Viewer has blocked the target
    pub is_blocked: bool,
    /// Viewer has the target in their contacts
    pub is_contact: bool,
}

/// Course matched by a user search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseHit {
    pub id: CourseId,
    pub fullname: String,
    pub shortname: String,
}

/// Result of `search_users`: three independently ordered lists
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSearchResults {
    pub contacts: Vec<ContactSummary>,
    pub courses: Vec<CourseHit>,
    pub non_contacts: Vec<ContactSummary>,
}

/// A message matched by `search_messages`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSearchHit {
    pub counterpart: UserId,
    pub fullname: Option<String>,
    pub message: Message,
    /// Read state of this message only, not of the whole conversation
    pub is_read: bool,
    pub is_online: bool,
    pub is_blocked: bool,
}

/// A course participant matched by `search_users_in_course`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseParticipantHit {
    pub user_id: UserId,
    pub fullname: String,
    pub is_online: bool,
    pub is_blocked: bool,
    pub is_contact: bool,
    /// A visible conversation already exists with the searcher
    pub is_messaging: bool,
}

/// Domain events handed to the outbound event sink after a mutation commits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagingEvent {
    /// A message was appended to the log
    MessageSent {
        message_id: MessageId,
        from: UserId,
        to: UserId,
        kind: MessageKind,
    },
    /// One or more messages addressed to `user` transitioned to read
    MessagesMarkedRead {
        user: UserId,
        message_ids: Vec<MessageId>,
    },
    ContactAdded {
        owner: UserId,
        contact: UserId,
        blocked: bool,
    },
    ContactRemoved { owner: UserId, contact: UserId },
    ContactBlocked { owner: UserId, contact: UserId },
    ContactUnblocked { owner: UserId, contact: UserId },
    /// `user` hid their side of the thread with `counterpart`
    ConversationDeleted {
        user: UserId,
        counterpart: UserId,
        message_count: usize,
    },
}

impl MessagingEvent {
    /// Short name used in log lines
    pub fn name(&self) -> &'static str {
        match self {
            MessagingEvent::MessageSent { .. } => "message_sent",
            MessagingEvent::MessagesMarkedRead { .. } => "messages_marked_read",
            MessagingEvent::ContactAdded { .. } => "contact_added",
            MessagingEvent::ContactRemoved { .. } => "contact_removed",
            MessagingEvent::ContactBlocked { .. } => "contact_blocked",
            MessagingEvent::ContactUnblocked { .. } => "contact_unblocked",
            MessagingEvent::ConversationDeleted { .. } => "conversation_deleted",
        }
    }
}
