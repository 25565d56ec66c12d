/// Contact storage: directional (owner, contact) relationships in sled
use crate::error::{MessagingError, Result};
use crate::messenger_types::UserId;
use crate::storage::{open_tree, pair_key, user_key};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub owner: UserId,
    pub contact: UserId,
    /// Owner blocks contact; says nothing about the reverse direction
    pub blocked: bool,
    pub added_at: DateTime<Utc>,
    /// Insertion sequence, used for stable "added order" listings
    pub seq: u64,
}

pub struct ContactStore {
    db: sled::Db,
    tree: sled::Tree,
}

impl ContactStore {
    pub fn new(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            db: db.clone(),
            tree: open_tree(db, "contacts")?,
        })
    }

    /// Insert a new relationship; fails if the pair already exists
    pub fn add_contact(&self, owner: UserId, contact: UserId, blocked: bool) -> Result<Contact> {
        let seq = self
            .db
            .generate_id()
            .map_err(|e| MessagingError::Storage(format!("add_contact: {}", e)))?;
        let c = Contact {
            owner,
            contact,
            blocked,
            added_at: Utc::now(),
            seq,
        };
        let val = serde_json::to_vec(&c).map_err(MessagingError::Serialization)?;
        let swapped = self
            .tree
            .compare_and_swap(pair_key(owner, contact), None::<&[u8]>, Some(val))
            .map_err(|e| MessagingError::Storage(format!("add_contact: {}", e)))?;
        if swapped.is_err() {
            return Err(MessagingError::DuplicateContact { owner, contact });
        }
        debug!("Contact added: {} -> {} (blocked: {})", owner, contact, blocked);
        Ok(c)
    }

    /// Remove a relationship. Absent pairs are a no-op and return `false`.
    pub fn remove_contact(&self, owner: UserId, contact: UserId) -> Result<bool> {
        let removed = self
            .tree
            .remove(pair_key(owner, contact))
            .map_err(|e| MessagingError::Storage(format!("remove_contact: {}", e)))?;
        Ok(removed.is_some())
    }

    /// Set the blocked flag on an existing relationship.
    ///
    /// Returns the stored contact and whether the flag actually changed.
    pub fn set_blocked(&self, owner: UserId, contact: UserId, blocked: bool) -> Result<(Contact, bool)> {
        let key = pair_key(owner, contact);
        loop {
            let current = self
                .tree
                .get(key)
                .map_err(|e| MessagingError::Storage(format!("set_blocked: {}", e)))?
                .ok_or(MessagingError::ContactNotFound { owner, contact })?;
            let mut c = serde_json::from_slice::<Contact>(&current).map_err(MessagingError::Serialization)?;
            if c.blocked == blocked {
                return Ok((c, false));
            }
            c.blocked = blocked;
            let val = serde_json::to_vec(&c).map_err(MessagingError::Serialization)?;
            let swapped = self
                .tree
                .compare_and_swap(key, Some(&current), Some(val))
                .map_err(|e| MessagingError::Storage(format!("set_blocked: {}", e)))?;
            match swapped {
                Ok(()) => return Ok((c, true)),
                Err(_) => debug!("set_blocked: {} -> {} changed concurrently, retrying", owner, contact),
            }
        }
    }

    pub fn get_contact(&self, owner: UserId, contact: UserId) -> Result<Option<Contact>> {
        match self
            .tree
            .get(pair_key(owner, contact))
            .map_err(|e| MessagingError::Storage(format!("get_contact: {}", e)))?
        {
            Some(val) => {
                let c = serde_json::from_slice::<Contact>(&val).map_err(MessagingError::Serialization)?;
                Ok(Some(c))
            }
            None => Ok(None),
        }
    }

    pub fn is_contact(&self, owner: UserId, contact: UserId) -> Result<bool> {
        self.tree
            .contains_key(pair_key(owner, contact))
            .map_err(|e| MessagingError::Storage(format!("is_contact: {}", e)))
    }

    /// False when no relationship exists
    pub fn is_blocked(&self, owner: UserId, contact: UserId) -> Result<bool> {
        Ok(self
            .get_contact(owner, contact)?
            .map(|c| c.blocked)
            .unwrap_or(false))
    }

    /// All relationships owned by `owner`, in the order they were added
    pub fn contacts_of(&self, owner: UserId) -> Result<Vec<Contact>> {
        let mut out = Vec::new();
        for entry in self.tree.scan_prefix(user_key(owner)) {
            let (_, val) = entry.map_err(|e| MessagingError::Storage(format!("contacts_of: {}", e)))?;
            out.push(serde_json::from_slice::<Contact>(&val).map_err(MessagingError::Serialization)?);
        }
        out.sort_by_key(|c| c.seq);
        Ok(out)
    }

    pub fn count_blocked(&self, owner: UserId) -> Result<usize> {
        Ok(self.contacts_of(owner)?.iter().filter(|c| c.blocked).count())
    }
}

impl Clone for ContactStore {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            tree: self.tree.clone(),
        }
    }
}
