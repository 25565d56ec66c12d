/// Parley - messaging read-state and contact-relationship engine
///
/// One-to-one messages, directional contacts with blocking, derived
/// conversation summaries and search, on top of a single sled store.

pub mod error;
pub mod config;
pub mod storage;
pub mod messenger_types;
pub mod contact_store;
pub mod message_store;
pub mod read_state;
pub mod directory;
pub mod conversations;
pub mod search;
pub mod messenger;
pub mod utils;

pub use error::{MessagingError, Result};
pub use config::Config;
pub use contact_store::Contact;
pub use directory::{CourseCatalog, InMemoryDirectory, UserDirectory, UserRecord};
pub use message_store::Message;
pub use messenger::Messenger;
pub use messenger_types::*;
pub use read_state::ReadFilter;
pub use utils::{EventEmitter, EventSink, NullSink, RecordingSink};
