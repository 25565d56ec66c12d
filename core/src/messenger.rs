/// Messenger - public entry point of the engine
///
/// Owns the sled handle, both stores, the directory seams and the event sink.
/// Every operation takes explicit actor ids; callers are assumed authorized.
/// Events are published only after the corresponding write has committed.
use crate::config::Config;
use crate::contact_store::{Contact, ContactStore};
use crate::conversations::ConversationAggregator;
use crate::directory::{CourseCatalog, UserDirectory};
use crate::error::{MessagingError, Result};
use crate::message_store::{Message, MessageStore};
use crate::messenger_types::{
    ContactSummary, ConversationSummary, CourseId, CourseParticipantHit, MessageId, MessageKind, MessageSearchHit,
    MessagingEvent, Profile, UserId, UserSearchResults,
};
use crate::read_state::ReadFilter;
use crate::search::SearchEngine;
use crate::storage::open_db;
use crate::utils::EventSink;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

pub struct Messenger {
    config: Config,
    contacts: ContactStore,
    messages: MessageStore,
    conversations: ConversationAggregator,
    search: SearchEngine,
    directory: Arc<dyn UserDirectory>,
    events: Arc<dyn EventSink>,
}

impl Messenger {
    /// Open the store described by `config` and wire up the collaborators
    pub fn open(
        config: Config,
        directory: Arc<dyn UserDirectory>,
        catalog: Arc<dyn CourseCatalog>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self> {
        let db = open_db(&config)?;
        let contacts = ContactStore::new(&db)?;
        let messages = MessageStore::new(&db)?;
        let conversations = ConversationAggregator::new(
            contacts.clone(),
            messages.clone(),
            directory.clone(),
            config.online_window,
        );
        let search = SearchEngine::new(
            contacts.clone(),
            messages.clone(),
            directory.clone(),
            catalog,
            config.online_window,
            config.search_limit,
        );
        info!(
            "Messenger ready ({} messages, online window {}s)",
            messages.count(),
            config.online_window.as_secs()
        );
        Ok(Self {
            config,
            contacts,
            messages,
            conversations,
            search,
            directory,
            events,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn publish(&self, event: MessagingEvent) {
        debug!("Publishing {}", event.name());
        self.events.publish(&event);
    }

    fn require_user(&self, id: UserId) -> Result<()> {
        match self.directory.user(id) {
            Some(_) => Ok(()),
            None => Err(MessagingError::UserNotFound(id)),
        }
    }

    // ─── Contacts ────────────────────────────────────────────────────────────

    pub fn add_contact(&self, owner: UserId, contact: UserId) -> Result<Contact> {
        self.add_contact_with(owner, contact, false)
    }

    pub fn add_contact_with(&self, owner: UserId, contact: UserId, blocked: bool) -> Result<Contact> {
        self.require_user(owner)?;
        self.require_user(contact)?;
        let c = self.contacts.add_contact(owner, contact, blocked)?;
        self.publish(MessagingEvent::ContactAdded { owner, contact, blocked });
        if blocked {
            self.publish(MessagingEvent::ContactBlocked { owner, contact });
        }
        Ok(c)
    }

    /// Returns false when there was nothing to remove
    pub fn remove_contact(&self, owner: UserId, contact: UserId) -> Result<bool> {
        let removed = self.contacts.remove_contact(owner, contact)?;
        if removed {
            self.publish(MessagingEvent::ContactRemoved { owner, contact });
        }
        Ok(removed)
    }

    /// Set the blocked flag on an existing contact
    pub fn set_blocked(&self, owner: UserId, contact: UserId, blocked: bool) -> Result<Contact> {
        let (c, changed) = self.contacts.set_blocked(owner, contact, blocked)?;
        if changed {
            self.publish(if blocked {
                MessagingEvent::ContactBlocked { owner, contact }
            } else {
                MessagingEvent::ContactUnblocked { owner, contact }
            });
        }
        Ok(c)
    }

    /// Block `target`, creating the contact first if there is none
    pub fn block_user(&self, owner: UserId, target: UserId) -> Result<Contact> {
        if self.contacts.get_contact(owner, target)?.is_none() {
            match self.add_contact_with(owner, target, true) {
                Ok(c) => return Ok(c),
                // Lost a race with a concurrent add; fall through to the flag update
                Err(MessagingError::DuplicateContact { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        self.set_blocked(owner, target, true)
    }

    /// Clear the blocked flag; unknown pairs are left alone and return false
    pub fn unblock_user(&self, owner: UserId, target: UserId) -> Result<bool> {
        if self.contacts.get_contact(owner, target)?.is_none() {
            return Ok(false);
        }
        match self.set_blocked(owner, target, false) {
            Ok(_) => Ok(true),
            Err(MessagingError::ContactNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn is_blocked(&self, owner: UserId, contact: UserId) -> Result<bool> {
        self.contacts.is_blocked(owner, contact)
    }

    pub fn is_contact(&self, owner: UserId, contact: UserId) -> Result<bool> {
        self.contacts.is_contact(owner, contact)
    }

    pub fn count_blocked(&self, owner: UserId) -> Result<usize> {
        self.contacts.count_blocked(owner)
    }

    pub fn get_contacts(&self, owner: UserId) -> Result<Vec<ContactSummary>> {
        self.conversations.get_contacts(owner, Utc::now())
    }

    // ─── Messages ────────────────────────────────────────────────────────────

    pub fn send_message(&self, from: UserId, to: UserId, body: &str) -> Result<Message> {
        self.send(from, to, body, MessageKind::Message)
    }

    pub fn send(&self, from: UserId, to: UserId, body: &str, kind: MessageKind) -> Result<Message> {
        self.send_at(from, to, body, kind, Utc::now())
    }

    /// Send with an explicit creation time (imports, backfills)
    pub fn send_at(
        &self,
        from: UserId,
        to: UserId,
        body: &str,
        kind: MessageKind,
        at: DateTime<Utc>,
    ) -> Result<Message> {
        self.require_user(from)?;
        self.require_user(to)?;
        let msg = self.messages.append(from, to, body, kind, at)?;
        self.publish(MessagingEvent::MessageSent {
            message_id: msg.id,
            from,
            to,
            kind,
        });
        Ok(msg)
    }

    /// Every message between `a` and `b` still visible to `a`, oldest first
    pub fn get_messages(&self, a: UserId, b: UserId) -> Result<Vec<Message>> {
        self.messages.thread(a, b)
    }

    pub fn get_most_recent_message(&self, a: UserId, b: UserId) -> Result<Option<Message>> {
        self.messages.most_recent(a, b)
    }

    // ─── Read state ──────────────────────────────────────────────────────────

    /// Mark one message read on behalf of its recipient
    pub fn mark_read(&self, actor: UserId, id: MessageId) -> Result<Message> {
        match self.messages.get(id)? {
            Some(msg) if msg.to == actor => {}
            // Someone else's message looks the same as a missing one
            _ => return Err(MessagingError::MessageNotFound(id)),
        }
        let (msg, changed) = self.messages.mark_read(id, Utc::now())?;
        if changed {
            self.publish(MessagingEvent::MessagesMarkedRead {
                user: actor,
                message_ids: vec![id],
            });
        }
        Ok(msg)
    }

    /// Mark everything addressed to `user` that passes `filter`; returns how many changed
    pub fn mark_all_read_for_user(&self, user: UserId, filter: ReadFilter) -> Result<usize> {
        let marked = self.messages.mark_all_read_for_user(user, filter, Utc::now())?;
        let n = marked.len();
        if n > 0 {
            self.publish(MessagingEvent::MessagesMarkedRead {
                user,
                message_ids: marked,
            });
        }
        Ok(n)
    }

    pub fn count_unread_messages(&self, user: UserId, from: Option<UserId>) -> Result<usize> {
        self.messages.count_unread(user, from)
    }

    // ─── Conversations ───────────────────────────────────────────────────────

    pub fn get_conversations(&self, user: UserId) -> Result<Vec<ConversationSummary>> {
        self.conversations.get_conversations(user, Utc::now())
    }

    pub fn count_unread_conversations(&self, user: UserId) -> Result<usize> {
        self.conversations.count_unread_conversations(user)
    }

    pub fn get_profile(&self, viewer: UserId, target: UserId) -> Result<Profile> {
        self.conversations.get_profile(viewer, target, Utc::now())
    }

    /// Hide the thread with `counterpart` from `user`; returns messages hidden
    pub fn delete_conversation(&self, user: UserId, counterpart: UserId) -> Result<usize> {
        let removal = self.messages.remove_thread(user, counterpart, Utc::now())?;
        let n = removal.removed;
        if !removal.marked_read.is_empty() {
            self.publish(MessagingEvent::MessagesMarkedRead {
                user,
                message_ids: removal.marked_read,
            });
        }
        if n > 0 {
            self.publish(MessagingEvent::ConversationDeleted {
                user,
                counterpart,
                message_count: n,
            });
        }
        Ok(n)
    }

    // ─── Search ──────────────────────────────────────────────────────────────

    pub fn search_users(&self, searcher: UserId, query: &str) -> Result<UserSearchResults> {
        self.search.search_users(searcher, query, Utc::now())
    }

    pub fn search_messages(&self, user: UserId, query: &str) -> Result<Vec<MessageSearchHit>> {
        self.search.search_messages(user, query, Utc::now())
    }

    pub fn search_users_in_course(
        &self,
        searcher: UserId,
        course: CourseId,
        query: &str,
    ) -> Result<Vec<CourseParticipantHit>> {
        self.search.search_users_in_course(searcher, course, query, Utc::now())
    }

    pub fn flush(&self) -> Result<()> {
        self.messages.flush()
    }
}
