/// Derived views: conversation summaries, profiles and contact listings
///
/// Nothing here is stored. Every figure is recomputed from the message and
/// contact stores plus the directory on each call.
use crate::contact_store::ContactStore;
use crate::directory::{is_online, UserDirectory};
use crate::error::{MessagingError, Result};
use crate::message_store::{Message, MessageStore};
use crate::messenger_types::{ContactSummary, ConversationSummary, Profile, UserId};
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Duration;

pub struct ConversationAggregator {
    contacts: ContactStore,
    messages: MessageStore,
    directory: Arc<dyn UserDirectory>,
    online_window: Duration,
}

impl ConversationAggregator {
    pub fn new(
        contacts: ContactStore,
        messages: MessageStore,
        directory: Arc<dyn UserDirectory>,
        online_window: Duration,
    ) -> Self {
        Self {
            contacts,
            messages,
            directory,
            online_window,
        }
    }

    fn online(&self, user: UserId, now: DateTime<Utc>) -> bool {
        self.directory
            .user(user)
            .map(|record| is_online(&record, now, self.online_window))
            .unwrap_or(false)
    }

    /// One summary per counterpart with a visible message, most recent first
    pub fn get_conversations(&self, user: UserId, now: DateTime<Utc>) -> Result<Vec<ConversationSummary>> {
        let mut out = Vec::new();
        for counterpart in self.messages.counterparts(user)? {
            // Single snapshot per thread: unread count and last message agree
            let thread = self.messages.thread(user, counterpart)?;
            if let Some(summary) = self.summarize(user, counterpart, thread, now)? {
                out.push(summary);
            }
        }
        out.sort_by_key(|s| Reverse(s.last_message.order_key()));
        Ok(out)
    }

    fn summarize(
        &self,
        user: UserId,
        counterpart: UserId,
        thread: Vec<Message>,
        now: DateTime<Utc>,
    ) -> Result<Option<ConversationSummary>> {
        let unread_count = thread
            .iter()
            .filter(|m| m.to == user && m.from == counterpart && !m.is_read())
            .count();
        let Some(last_message) = thread.into_iter().last() else {
            return Ok(None);
        };
        let record = self.directory.user(counterpart);
        Ok(Some(ConversationSummary {
            counterpart,
            fullname: record.as_ref().map(|r| r.fullname.clone()),
            is_read: last_message.from == user || last_message.is_read(),
            last_message,
            unread_count,
            is_online: record
                .as_ref()
                .map(|r| is_online(r, now, self.online_window))
                .unwrap_or(false),
            is_blocked: self.contacts.is_blocked(user, counterpart)?,
        }))
    }

    /// Distinct senders with at least one unread message to `user`
    pub fn count_unread_conversations(&self, user: UserId) -> Result<usize> {
        Ok(self.messages.unread_senders(user)?.len())
    }

    /// `target` as seen by `viewer`; private fields only with permission
    pub fn get_profile(&self, viewer: UserId, target: UserId, now: DateTime<Utc>) -> Result<Profile> {
        let record = self
            .directory
            .user(target)
            .ok_or(MessagingError::UserNotFound(target))?;
        let details = self.directory.can_view_details(viewer, target);
        let relationship = self.contacts.get_contact(viewer, target)?;

        Ok(Profile {
            user_id: target,
            is_online: is_online(&record, now, self.online_window),
            is_blocked: relationship.as_ref().map(|c| c.blocked).unwrap_or(false),
            is_contact: relationship.is_some(),
            email: record.email.filter(|_| details),
            country: record.country.filter(|_| details),
            city: record.city.filter(|_| details),
            fullname: record.fullname,
        })
    }

    /// The owner's contacts in the order they were added
    pub fn get_contacts(&self, owner: UserId, now: DateTime<Utc>) -> Result<Vec<ContactSummary>> {
        Ok(self
            .contacts
            .contacts_of(owner)?
            .into_iter()
            .map(|c| ContactSummary {
                user_id: c.contact,
                fullname: self.directory.user(c.contact).map(|r| r.fullname),
                is_online: self.online(c.contact, now),
                is_blocked: c.blocked,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{InMemoryDirectory, UserRecord};
    use crate::messenger_types::MessageKind;

    struct Fixture {
        contacts: ContactStore,
        messages: MessageStore,
        directory: Arc<InMemoryDirectory>,
        aggregator: ConversationAggregator,
    }

    fn fixture() -> Fixture {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let contacts = ContactStore::new(&db).unwrap();
        let messages = MessageStore::new(&db).unwrap();
        let directory = Arc::new(InMemoryDirectory::new());
        for (id, name) in [(1, "Ann"), (2, "Bob"), (3, "Cid"), (4, "Dee")] {
            directory.add_user(UserRecord::new(UserId(id), name));
        }
        let aggregator = ConversationAggregator::new(
            contacts.clone(),
            messages.clone(),
            directory.clone(),
            Duration::from_secs(300),
        );
        Fixture {
            contacts,
            messages,
            directory,
            aggregator,
        }
    }

    #[test]
    fn test_summary_flags() {
        let f = fixture();
        let now = Utc::now();
        f.messages.append(UserId(2), UserId(1), "one", MessageKind::Message, now).unwrap();
        f.messages.append(UserId(2), UserId(1), "two", MessageKind::Message, now).unwrap();
        f.contacts.add_contact(UserId(1), UserId(2), true).unwrap();
        f.directory.touch(UserId(2), now).unwrap();

        let convs = f.aggregator.get_conversations(UserId(1), now).unwrap();
        assert_eq!(convs.len(), 1);
        let c = &convs[0];
        assert_eq!(c.counterpart, UserId(2));
        assert_eq!(c.fullname.as_deref(), Some("Bob"));
        assert_eq!(c.last_message.body, "two");
        assert_eq!(c.unread_count, 2);
        assert!(!c.is_read);
        assert!(c.is_online);
        assert!(c.is_blocked);

        // The sender sees its own last message as read and nothing unread
        let theirs = f.aggregator.get_conversations(UserId(2), now).unwrap();
        assert_eq!(theirs[0].unread_count, 0);
        assert!(theirs[0].is_read);
        assert!(!theirs[0].is_blocked);
    }

    #[test]
    fn test_unknown_counterpart_still_listed() {
        let f = fixture();
        f.messages.append(UserId(99), UserId(1), "ghost", MessageKind::Message, Utc::now()).unwrap();
        let convs = f.aggregator.get_conversations(UserId(1), Utc::now()).unwrap();
        assert_eq!(convs[0].fullname, None);
        assert!(!convs[0].is_online);
        assert_eq!(f.aggregator.count_unread_conversations(UserId(1)).unwrap(), 1);
    }

    #[test]
    fn test_profile_hides_details_without_permission() {
        let f = fixture();
        let mut bob = UserRecord::new(UserId(2), "Bob");
        bob.email = Some("bob@example.com".to_string());
        bob.city = Some("Oslo".to_string());
        f.directory.add_user(bob);

        let profile = f.aggregator.get_profile(UserId(1), UserId(2), Utc::now()).unwrap();
        assert_eq!(profile.fullname, "Bob");
        assert_eq!(profile.email, None);
        assert_eq!(profile.city, None);
        assert!(!profile.is_contact);
        assert!(!profile.is_blocked);

        f.directory.grant_details(UserId(1), UserId(2));
        let profile = f.aggregator.get_profile(UserId(1), UserId(2), Utc::now()).unwrap();
        assert_eq!(profile.email.as_deref(), Some("bob@example.com"));
        assert_eq!(profile.city.as_deref(), Some("Oslo"));
        assert_eq!(profile.country, None);

        let err = f.aggregator.get_profile(UserId(1), UserId(42), Utc::now()).unwrap_err();
        assert!(matches!(err, MessagingError::UserNotFound(UserId(42))));
    }

    #[test]
    fn test_contacts_listing() {
        let f = fixture();
        f.contacts.add_contact(UserId(1), UserId(3), false).unwrap();
        f.contacts.add_contact(UserId(1), UserId(2), true).unwrap();

        let list = f.aggregator.get_contacts(UserId(1), Utc::now()).unwrap();
        let names: Vec<_> = list.iter().filter_map(|c| c.fullname.clone()).collect();
        assert_eq!(names, vec!["Cid", "Bob"]);
        assert!(!list[0].is_blocked);
        assert!(list[1].is_blocked);
    }
}
