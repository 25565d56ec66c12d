/// sled database handle shared by the contact and message stores
/// Keys are fixed-width big-endian ids so prefix scans group by user
use crate::config::Config;
use crate::error::{MessagingError, Result};
use crate::messenger_types::{MessageId, UserId};
use tracing::{debug, info};

const DB_FILE: &str = "messaging.db";

/// Open the on-disk database under `config.data_dir`, or a temporary one
pub fn open_db(config: &Config) -> Result<sled::Db> {
    match &config.data_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(MessagingError::Io)?;
            let path = dir.join(DB_FILE);
            debug!("Opening messaging store at {:?}", path);
            let db = sled::open(&path)
                .map_err(|e| MessagingError::Storage(format!("Failed to open messaging DB: {}", e)))?;
            info!("Messaging store initialized at {:?}", path);
            Ok(db)
        }
        None => sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| MessagingError::Storage(format!("Failed to open temporary DB: {}", e))),
    }
}

pub(crate) fn open_tree(db: &sled::Db, name: &str) -> Result<sled::Tree> {
    db.open_tree(name)
        .map_err(|e| MessagingError::Storage(format!("open tree {}: {}", name, e)))
}

pub(crate) fn user_key(user: UserId) -> [u8; 8] {
    user.0.to_be_bytes()
}

pub(crate) fn message_key(id: MessageId) -> [u8; 8] {
    id.0.to_be_bytes()
}

/// `a ++ b`, used for contact keys and thread prefixes
pub(crate) fn pair_key(a: UserId, b: UserId) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&a.0.to_be_bytes());
    key[8..].copy_from_slice(&b.0.to_be_bytes());
    key
}

/// `a ++ b ++ id`, used for the thread and unread indexes
pub(crate) fn triple_key(a: UserId, b: UserId, id: MessageId) -> [u8; 24] {
    let mut key = [0u8; 24];
    key[..16].copy_from_slice(&pair_key(a, b));
    key[16..].copy_from_slice(&id.0.to_be_bytes());
    key
}

fn read_u64(bytes: &[u8], at: usize) -> Option<u64> {
    let slice = bytes.get(at..at + 8)?;
    let arr: [u8; 8] = slice.try_into().ok()?;
    Some(u64::from_be_bytes(arr))
}

/// Split a triple key back into (a, b, id)
pub(crate) fn decode_triple(key: &[u8]) -> Option<(UserId, UserId, MessageId)> {
    if key.len() != 24 {
        return None;
    }
    Some((
        UserId(read_u64(key, 0)?),
        UserId(read_u64(key, 8)?),
        MessageId(read_u64(key, 16)?),
    ))
}
