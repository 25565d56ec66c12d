/// Read-state transitions: UNREAD -> READ, single and bulk
///
/// The unread index entry is the source of truth for "still unread" inside a
/// transaction; removing it and stamping `time_read` happen together, so two
/// concurrent bulk calls can never both claim the same message.
use crate::error::{abort, MessagingError, Result};
use crate::message_store::{Message, MessageStore};
use crate::messenger_types::{MessageId, MessageKind, UserId};
use crate::storage::{decode_triple, message_key, pair_key, triple_key, user_key};
use chrono::{DateTime, Utc};
use sled::transaction::TransactionResult;
use sled::Transactional;
use tracing::debug;

/// Which unread messages of a recipient a bulk operation touches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadFilter {
    /// Only messages from this sender (None: any sender)
    pub from: Option<UserId>,
    /// Only messages of this kind (None: any kind)
    pub kind: Option<MessageKind>,
}

impl ReadFilter {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn from_user(from: UserId) -> Self {
        Self {
            from: Some(from),
            kind: None,
        }
    }

    pub fn of_kind(kind: MessageKind) -> Self {
        Self {
            from: None,
            kind: Some(kind),
        }
    }

    fn accepts_kind(&self, stored: &[u8]) -> bool {
        match self.kind {
            None => true,
            Some(kind) => stored.first().and_then(|b| MessageKind::from_byte(*b)) == Some(kind),
        }
    }
}

impl MessageStore {
    /// Mark one message read at `at`.
    ///
    /// Returns the stored message and whether this call performed the
    /// transition; an already-read message is left untouched.
    pub fn mark_read(&self, id: MessageId, at: DateTime<Utc>) -> Result<(Message, bool)> {
        let id_key = message_key(id);
        let outcome: TransactionResult<(Message, bool), MessagingError> = (&self.messages, &self.unread)
            .transaction(|(messages, unread)| {
                let Some(raw) = messages.get(&id_key[..])? else {
                    return Err(abort(MessagingError::MessageNotFound(id)));
                };
                let mut msg = serde_json::from_slice::<Message>(&raw).map_err(abort)?;
                if msg.time_read.is_some() {
                    return Ok((msg, false));
                }
                msg.time_read = Some(at);
                let value = serde_json::to_vec(&msg).map_err(abort)?;
                messages.insert(&id_key[..], value)?;
                unread.remove(&triple_key(msg.to, msg.from, id)[..])?;
                Ok((msg, true))
            });
        Ok(outcome?)
    }

    /// Mark every unread message addressed to `user` that passes `filter`.
    ///
    /// All-or-nothing: either every qualifying message is stamped or the
    /// store is left as it was. Returns the ids this call transitioned.
    pub fn mark_all_read_for_user(
        &self,
        user: UserId,
        filter: ReadFilter,
        at: DateTime<Utc>,
    ) -> Result<Vec<MessageId>> {
        let candidates = self.unread_candidates(user, filter)?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let outcome: TransactionResult<Vec<MessageId>, MessagingError> = (&self.messages, &self.unread)
            .transaction(|(messages, unread)| {
                let mut marked = Vec::with_capacity(candidates.len());
                for (key, id) in &candidates {
                    // Conditional: only still-unread entries qualify
                    if unread.remove(&key[..])?.is_none() {
                        continue;
                    }
                    let id_key = message_key(*id);
                    let Some(raw) = messages.get(&id_key[..])? else {
                        continue;
                    };
                    let mut msg = serde_json::from_slice::<Message>(&raw).map_err(abort)?;
                    if msg.time_read.is_none() {
                        msg.time_read = Some(at);
                        let value = serde_json::to_vec(&msg).map_err(abort)?;
                        messages.insert(&id_key[..], value)?;
                        marked.push(*id);
                    }
                }
                Ok(marked)
            });
        let marked = outcome?;
        debug!("Marked {} message(s) read for {} ({:?})", marked.len(), user, filter);
        Ok(marked)
    }

    /// Unread messages addressed to `user`, optionally from one sender
    pub fn count_unread(&self, user: UserId, from: Option<UserId>) -> Result<usize> {
        let prefix: Vec<u8> = match from {
            Some(sender) => pair_key(user, sender).to_vec(),
            None => user_key(user).to_vec(),
        };
        let mut n = 0;
        for entry in self.unread.scan_prefix(prefix) {
            entry.map_err(|e| MessagingError::Storage(format!("count_unread: {}", e)))?;
            n += 1;
        }
        Ok(n)
    }

    /// Distinct senders with at least one unread message to `user`
    pub fn unread_senders(&self, user: UserId) -> Result<Vec<UserId>> {
        let mut out: Vec<UserId> = Vec::new();
        for entry in self.unread.scan_prefix(user_key(user)) {
            let (key, _) = entry.map_err(|e| MessagingError::Storage(format!("unread_senders: {}", e)))?;
            if let Some((_, sender, _)) = decode_triple(&key) {
                if out.last() != Some(&sender) {
                    out.push(sender);
                }
            }
        }
        Ok(out)
    }

    fn unread_candidates(&self, user: UserId, filter: ReadFilter) -> Result<Vec<([u8; 24], MessageId)>> {
        let prefix: Vec<u8> = match filter.from {
            Some(sender) => pair_key(user, sender).to_vec(),
            None => user_key(user).to_vec(),
        };
        let mut out = Vec::new();
        for entry in self.unread.scan_prefix(prefix) {
            let (key, kind) = entry.map_err(|e| MessagingError::Storage(format!("unread scan: {}", e)))?;
            if !filter.accepts_kind(&kind) {
                continue;
            }
            if let Some((to, from, id)) = decode_triple(&key) {
                out.push((triple_key(to, from, id), id));
            }
        }
        Ok(out)
    }
}
