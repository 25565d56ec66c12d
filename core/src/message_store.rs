/// Message persistence: append-only log plus per-user thread and unread indexes
///
/// Trees:
///   messages  id                      -> Message (json)
///   threads   user ++ counterpart ++ id -> ()   one entry per participant view
///   unread    to ++ from ++ id          -> kind byte, present while unread
///
/// Every write touching more than one key runs in a sled transaction.
use crate::error::{abort, MessagingError, Result};
use crate::messenger_types::{MessageId, MessageKind, UserId};
use crate::storage::{decode_triple, message_key, open_tree, pair_key, triple_key, user_key};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::transaction::TransactionResult;
use sled::Transactional;
use tracing::debug;

const EMPTY: &[u8] = &[];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub from: UserId,
    pub to: UserId,
    pub body: String,
    pub kind: MessageKind,
    pub time_created: DateTime<Utc>,
    pub time_read: Option<DateTime<Utc>>,
}

impl Message {
    pub fn is_read(&self) -> bool {
        self.time_read.is_some()
    }

    /// The other participant as seen from `user`
    pub fn counterpart_of(&self, user: UserId) -> UserId {
        if self.from == user {
            self.to
        } else {
            self.from
        }
    }

    /// Chronological order with the id as tiebreak
    pub fn order_key(&self) -> (DateTime<Utc>, MessageId) {
        (self.time_created, self.id)
    }
}

/// Outcome of hiding one side of a thread
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadRemoval {
    /// Thread entries removed from the caller's view
    pub removed: usize,
    /// Messages addressed to the caller that were still unread
    pub marked_read: Vec<MessageId>,
}

pub struct MessageStore {
    pub(crate) db: sled::Db,
    pub(crate) messages: sled::Tree,
    pub(crate) threads: sled::Tree,
    pub(crate) unread: sled::Tree,
}

impl MessageStore {
    pub fn new(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            db: db.clone(),
            messages: open_tree(db, "messages")?,
            threads: open_tree(db, "threads")?,
            unread: open_tree(db, "unread")?,
        })
    }

    /// Append a message created at `at`; it starts unread
    pub fn append(
        &self,
        from: UserId,
        to: UserId,
        body: &str,
        kind: MessageKind,
        at: DateTime<Utc>,
    ) -> Result<Message> {
        let id = MessageId(
            self.db
                .generate_id()
                .map_err(|e| MessagingError::Storage(format!("Failed to allocate message id: {}", e)))?,
        );
        let msg = Message {
            id,
            from,
            to,
            body: body.to_string(),
            kind,
            time_created: at,
            time_read: None,
        };
        let value = serde_json::to_vec(&msg).map_err(MessagingError::Serialization)?;
        let id_key = message_key(id);
        let sender_view = triple_key(from, to, id);
        let recipient_view = triple_key(to, from, id);
        let kind_byte = [kind.as_byte()];

        let outcome: TransactionResult<(), MessagingError> = (&self.messages, &self.threads, &self.unread)
            .transaction(|(messages, threads, unread)| {
                messages.insert(&id_key[..], value.as_slice())?;
                threads.insert(&sender_view[..], EMPTY)?;
                threads.insert(&recipient_view[..], EMPTY)?;
                unread.insert(&recipient_view[..], &kind_byte[..])?;
                Ok(())
            });
        outcome?;

        debug!("Message {} stored: {} -> {} ({} bytes)", id, from, to, msg.body.len());
        Ok(msg)
    }

    pub fn get(&self, id: MessageId) -> Result<Option<Message>> {
        match self
            .messages
            .get(message_key(id))
            .map_err(|e| MessagingError::Storage(format!("Failed to load message: {}", e)))?
        {
            Some(val) => Ok(Some(serde_json::from_slice::<Message>(&val).map_err(MessagingError::Serialization)?)),
            None => Ok(None),
        }
    }

    /// Messages between `user` and `counterpart` visible to `user`, oldest first
    pub fn thread(&self, user: UserId, counterpart: UserId) -> Result<Vec<Message>> {
        let ids = self.thread_ids(user, counterpart)?;
        let mut messages = self.load_snapshot(&ids)?;
        messages.sort_by_key(Message::order_key);
        Ok(messages)
    }

    pub fn most_recent(&self, user: UserId, counterpart: UserId) -> Result<Option<Message>> {
        Ok(self.thread(user, counterpart)?.pop())
    }

    /// Distinct counterparts with at least one message visible to `user`
    pub fn counterparts(&self, user: UserId) -> Result<Vec<UserId>> {
        let mut out: Vec<UserId> = Vec::new();
        for entry in self.threads.scan_prefix(user_key(user)) {
            let (key, _) = entry.map_err(|e| MessagingError::Storage(format!("counterparts: {}", e)))?;
            if let Some((_, counterpart, _)) = decode_triple(&key) {
                // keys are sorted, so duplicates are adjacent
                if out.last() != Some(&counterpart) {
                    out.push(counterpart);
                }
            }
        }
        Ok(out)
    }

    pub(crate) fn thread_ids(&self, user: UserId, counterpart: UserId) -> Result<Vec<MessageId>> {
        let mut ids = Vec::new();
        for entry in self.threads.scan_prefix(pair_key(user, counterpart)) {
            let (key, _) = entry.map_err(|e| MessagingError::Storage(format!("thread scan: {}", e)))?;
            if let Some((_, _, id)) = decode_triple(&key) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Load a set of messages in one read transaction, so concurrent read
    /// marking is seen either entirely or not at all
    pub(crate) fn load_snapshot(&self, ids: &[MessageId]) -> Result<Vec<Message>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let outcome: TransactionResult<Vec<Message>, MessagingError> = self.messages.transaction(|messages| {
            let mut out = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(raw) = messages.get(&message_key(*id)[..])? {
                    out.push(serde_json::from_slice::<Message>(&raw).map_err(abort)?);
                }
            }
            Ok(out)
        });
        Ok(outcome?)
    }

    /// Hide the thread with `counterpart` from `user`'s view.
    ///
    /// Unread messages addressed to `user` are marked read at `at` first.
    /// A message nobody can see any more is dropped from the log.
    pub fn remove_thread(&self, user: UserId, counterpart: UserId, at: DateTime<Utc>) -> Result<ThreadRemoval> {
        let ids = self.thread_ids(user, counterpart)?;
        if ids.is_empty() {
            return Ok(ThreadRemoval::default());
        }
        let outcome: TransactionResult<ThreadRemoval, MessagingError> = (&self.messages, &self.threads, &self.unread)
            .transaction(|(messages, threads, unread)| {
                let mut removal = ThreadRemoval::default();
                for id in &ids {
                    let own_view = triple_key(user, counterpart, *id);
                    if threads.remove(&own_view[..])?.is_none() {
                        continue;
                    }
                    removal.removed += 1;

                    let id_key = message_key(*id);
                    let Some(raw) = messages.get(&id_key[..])? else {
                        continue;
                    };
                    let mut msg = serde_json::from_slice::<Message>(&raw).map_err(abort)?;

                    let inbox_key = triple_key(msg.to, msg.from, *id);
                    if msg.to == user && unread.remove(&inbox_key[..])?.is_some() {
                        msg.time_read = Some(at);
                        removal.marked_read.push(*id);
                    }

                    let other_view = triple_key(counterpart, user, *id);
                    if threads.get(&other_view[..])?.is_some() {
                        let value = serde_json::to_vec(&msg).map_err(abort)?;
                        messages.insert(&id_key[..], value)?;
                    } else {
                        unread.remove(&inbox_key[..])?;
                        messages.remove(&id_key[..])?;
                    }
                }
                Ok(removal)
            });
        let removal = outcome?;
        debug!(
            "Thread {} <-> {} hidden for {}: {} entries, {} marked read",
            user,
            counterpart,
            user,
            removal.removed,
            removal.marked_read.len()
        );
        Ok(removal)
    }

    /// Number of messages in the log
    pub fn count(&self) -> usize {
        self.messages.len()
    }

    pub fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| MessagingError::Storage(format!("Failed to flush messaging store: {}", e)))?;
        Ok(())
    }
}

impl Clone for MessageStore {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            messages: self.messages.clone(),
            threads: self.threads.clone(),
            unread: self.unread.clone(),
        }
    }
}
