/// Messaging API tests
/// End-to-end scenarios through the `Messenger` facade on a temporary store

extern crate parley_core;

use chrono::{Duration, Utc};
use parley_core::directory::Course;
use parley_core::{
    Config, CourseId, InMemoryDirectory, MessageKind, Messenger, MessagingError, MessagingEvent, ReadFilter,
    RecordingSink, UserId, UserRecord,
};
use std::sync::Arc;
use tempfile::TempDir;

struct Harness {
    messenger: Messenger,
    directory: Arc<InMemoryDirectory>,
    events: Arc<RecordingSink>,
}

fn harness() -> Harness {
    harness_with(Config::default())
}

fn harness_with(config: Config) -> Harness {
    let directory = Arc::new(InMemoryDirectory::new());
    let events = Arc::new(RecordingSink::new());
    let messenger = Messenger::open(
        config,
        directory.clone(),
        directory.clone(),
        events.clone(),
    )
    .unwrap();
    Harness {
        messenger,
        directory,
        events,
    }
}

impl Harness {
    fn user(&self, id: u64, fullname: &str) -> UserId {
        self.directory.add_user(UserRecord::new(UserId(id), fullname));
        UserId(id)
    }

    fn course(&self, id: u64, fullname: &str, shortname: &str) -> CourseId {
        self.directory.add_course(Course {
            id: CourseId(id),
            fullname: fullname.to_string(),
            shortname: shortname.to_string(),
        });
        CourseId(id)
    }

    fn send(&self, from: UserId, to: UserId, body: &str) {
        self.messenger.send_message(from, to, body).unwrap();
    }

    /// The standard four-message exchange between two users
    fn banter(&self, a: UserId, b: UserId) {
        self.send(a, b, "Yo!");
        self.send(b, a, "Sup mang?");
        self.send(a, b, "Writing tests!");
        self.send(b, a, "Word.");
    }
}

#[test]
fn test_mark_all_read_for_user() {
    let h = harness();
    let sender = h.user(1, "Sender");
    let recipient = h.user(2, "Recipient");
    for i in 0..3 {
        h.messenger
            .send(sender, recipient, &format!("Notification {}", i), MessageKind::Notification)
            .unwrap();
    }
    for i in 0..3 {
        h.send(sender, recipient, &format!("Message {}", i));
    }
    assert_eq!(h.messenger.count_unread_messages(recipient, None).unwrap(), 6);

    assert_eq!(h.messenger.mark_all_read_for_user(recipient, ReadFilter::any()).unwrap(), 6);
    assert_eq!(h.messenger.count_unread_messages(recipient, None).unwrap(), 0);
}

#[test]
fn test_mark_all_read_scoped_to_sender() {
    let h = harness();
    let sender1 = h.user(1, "Sender One");
    let sender2 = h.user(2, "Sender Two");
    let recipient = h.user(3, "Recipient");
    for i in 0..6 {
        h.send(sender1, recipient, &format!("From one {}", i));
        h.send(sender2, recipient, &format!("From two {}", i));
    }

    let marked = h
        .messenger
        .mark_all_read_for_user(recipient, ReadFilter::from_user(sender1))
        .unwrap();
    assert_eq!(marked, 6);
    assert_eq!(h.messenger.count_unread_messages(recipient, None).unwrap(), 6);
    assert_eq!(h.messenger.count_unread_messages(recipient, Some(sender2)).unwrap(), 6);
}

#[test]
fn test_mark_all_read_scoped_to_kind() {
    let h = harness();
    let sender = h.user(1, "Sender");
    let recipient = h.user(2, "Recipient");
    for i in 0..3 {
        h.messenger
            .send(sender, recipient, &format!("Notification {}", i), MessageKind::Notification)
            .unwrap();
        h.send(sender, recipient, &format!("Message {}", i));
    }

    h.messenger
        .mark_all_read_for_user(recipient, ReadFilter::of_kind(MessageKind::Notification))
        .unwrap();
    assert_eq!(h.messenger.count_unread_messages(recipient, None).unwrap(), 3);

    h.messenger
        .mark_all_read_for_user(recipient, ReadFilter::of_kind(MessageKind::Message))
        .unwrap();
    assert_eq!(h.messenger.count_unread_messages(recipient, None).unwrap(), 0);
}

#[test]
fn test_count_blocked_users() {
    let h = harness();
    let admin = h.user(1, "Admin User");
    let user1 = h.user(2, "User One");
    let user2 = h.user(3, "User Two");

    assert_eq!(h.messenger.count_blocked(admin).unwrap(), 0);

    h.messenger.add_contact(admin, user1).unwrap();
    h.messenger.add_contact_with(admin, user2, true).unwrap();
    assert_eq!(h.messenger.count_blocked(admin).unwrap(), 1);

    // Another owner's blocking does not count
    h.messenger.block_user(user1, user2).unwrap();
    assert_eq!(h.messenger.count_blocked(admin).unwrap(), 1);

    h.messenger.set_blocked(admin, user1, true).unwrap();
    assert_eq!(h.messenger.count_blocked(admin).unwrap(), 2);
}

#[test]
fn test_search_users_in_course() {
    let h = harness();
    let user1 = h.user(1, "User One");
    let user2 = h.user(2, "User Two");
    let user3 = h.user(3, "User Three");
    h.directory.touch(user2, Utc::now()).unwrap();
    h.messenger.block_user(user1, user2).unwrap();

    let course = h.course(10, "Course", "One");
    h.directory.enrol(user1, course).unwrap();
    h.directory.enrol(user2, course).unwrap();

    let results = h.messenger.search_users_in_course(user1, course, "User").unwrap();
    assert_eq!(results.len(), 1);
    let hit = &results[0];
    assert_eq!(hit.user_id, user2);
    assert_eq!(hit.fullname, "User Two");
    assert!(!hit.is_messaging);
    assert!(hit.is_online);
    assert!(hit.is_blocked);
    assert!(hit.is_contact);
    assert!(results.iter().all(|r| r.user_id != user3));

    h.send(user2, user1, "hello");
    let results = h.messenger.search_users_in_course(user1, course, "two").unwrap();
    assert!(results[0].is_messaging);
}

#[test]
fn test_search_users() {
    let h = harness();
    let user1 = h.user(1, "User One");
    let user2 = h.user(2, "User search Two");
    let user3 = h.user(3, "User search Three");
    let user4 = h.user(4, "User Four");
    let user5 = h.user(5, "User search Five");
    h.user(6, "User Six");

    let course1 = h.course(11, "Course search", "One");
    h.course(12, "Course", "Two");
    let course3 = h.course(13, "Course", "Three search");

    h.messenger.add_contact(user1, user2).unwrap();
    h.messenger.add_contact(user1, user3).unwrap();
    h.messenger.add_contact(user1, user4).unwrap();

    let results = h.messenger.search_users(user1, "search").unwrap();

    let contacts: Vec<UserId> = results.contacts.iter().map(|c| c.user_id).collect();
    assert_eq!(contacts, vec![user3, user2]);

    let courses: Vec<CourseId> = results.courses.iter().map(|c| c.id).collect();
    assert_eq!(courses, vec![course3, course1]);

    let others: Vec<UserId> = results.non_contacts.iter().map(|c| c.user_id).collect();
    assert_eq!(others, vec![user5]);
}

#[test]
fn test_search_users_excludes_course_mates_from_non_contacts() {
    let h = harness();
    let searcher = h.user(1, "Searcher");
    let mate = h.user(2, "Alex Mate");
    let stranger = h.user(3, "Alex Stranger");
    let course = h.course(7, "Shared course", "SHR");
    h.directory.enrol(searcher, course).unwrap();
    h.directory.enrol(mate, course).unwrap();

    let results = h.messenger.search_users(searcher, "alex").unwrap();
    let others: Vec<UserId> = results.non_contacts.iter().map(|c| c.user_id).collect();
    assert_eq!(others, vec![stranger]);
}

#[test]
fn test_search_results_respect_limit() {
    let h = harness_with(Config {
        search_limit: 2,
        ..Config::default()
    });
    let searcher = h.user(1, "Searcher");
    let delta = h.user(2, "Match Delta");
    let alpha = h.user(3, "Match Alpha");
    let bravo = h.user(4, "Match Bravo");
    let echo = h.user(5, "Match Echo");
    let foxtrot = h.user(6, "Match Foxtrot");
    let golf = h.user(7, "Match Golf");
    for contact in [delta, alpha, bravo] {
        h.messenger.add_contact(searcher, contact).unwrap();
    }

    let exact = h.course(11, "Match", "M1");
    let prefixed = h.course(12, "Matches", "M2");
    h.course(13, "Rematch", "M3");
    let exact_newer = h.course(14, "Match", "M4");

    let results = h.messenger.search_users(searcher, "match").unwrap();
    let contacts: Vec<UserId> = results.contacts.iter().map(|c| c.user_id).collect();
    assert_eq!(contacts, vec![alpha, bravo]);
    let courses: Vec<CourseId> = results.courses.iter().map(|c| c.id).collect();
    assert_eq!(courses, vec![exact_newer, exact]);
    assert!(!courses.contains(&prefixed));
    let others: Vec<UserId> = results.non_contacts.iter().map(|c| c.user_id).collect();
    assert_eq!(others, vec![echo, foxtrot]);

    for other in [echo, foxtrot, golf] {
        h.send(searcher, other, "match report");
    }
    let hits: Vec<UserId> = h
        .messenger
        .search_messages(searcher, "match")
        .unwrap()
        .iter()
        .map(|hit| hit.counterpart)
        .collect();
    assert_eq!(hits, vec![echo, foxtrot]);

    let shared = h.course(20, "Shared", "SHR");
    for member in [searcher, delta, alpha, bravo] {
        h.directory.enrol(member, shared).unwrap();
    }
    let participants: Vec<UserId> = h
        .messenger
        .search_users_in_course(searcher, shared, "match")
        .unwrap()
        .iter()
        .map(|hit| hit.user_id)
        .collect();
    assert_eq!(participants, vec![alpha, bravo]);
}

#[test]
fn test_search_with_blank_query_is_empty() {
    let h = harness();
    let user1 = h.user(1, "User One");
    let user2 = h.user(2, "User Two");
    h.messenger.add_contact(user1, user2).unwrap();
    h.banter(user1, user2);

    let results = h.messenger.search_users(user1, "   ").unwrap();
    assert!(results.contacts.is_empty() && results.courses.is_empty() && results.non_contacts.is_empty());
    assert!(h.messenger.search_messages(user1, "").unwrap().is_empty());
}

#[test]
fn test_search_messages() {
    let h = harness();
    let user1 = h.user(1, "User One");
    let user2 = h.user(2, "User Two");
    let user3 = h.user(3, "User Three");
    h.banter(user1, user2);
    h.send(user1, user3, "Nothing to report");

    let hits = h.messenger.search_messages(user1, "o").unwrap();
    assert_eq!(hits.len(), 2);

    // Latest matching message per counterpart, oldest hit first
    assert_eq!(hits[0].counterpart, user2);
    assert_eq!(hits[0].fullname.as_deref(), Some("User Two"));
    assert_eq!(hits[0].message.body, "Word.");
    assert_eq!(hits[0].message.from, user2);
    assert!(!hits[0].is_read);
    assert!(!hits[0].is_online);
    assert!(!hits[0].is_blocked);

    assert_eq!(hits[1].counterpart, user3);
    assert_eq!(hits[1].message.body, "Nothing to report");
    assert!(!hits[1].is_read);

    // Read state of the hit itself, not the conversation
    h.messenger.mark_read(user1, hits[0].message.id).unwrap();
    let hits = h.messenger.search_messages(user1, "yo").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].message.body, "Yo!");
    assert!(!hits[0].is_read);
}

#[test]
fn test_get_conversations() {
    let h = harness();
    let user1 = h.user(1, "User One");
    let user2 = h.user(2, "User Two");
    let user3 = h.user(3, "User Three");
    let user4 = h.user(4, "User Four");

    h.banter(user1, user2);

    h.send(user1, user3, "Booyah");
    h.send(user3, user1, "Whaaat?");
    h.send(user1, user3, "Nothing.");
    h.send(user3, user1, "Cool.");

    h.send(user1, user4, "Hey mate, you see the new messaging UI?");
    h.send(user4, user1, "Yah brah, it's pretty rad.");
    h.send(user1, user4, "Dope.");

    let convs = h.messenger.get_conversations(user1).unwrap();
    let order: Vec<UserId> = convs.iter().map(|c| c.counterpart).collect();
    assert_eq!(order, vec![user4, user3, user2]);

    assert_eq!(convs[0].last_message.body, "Dope.");
    assert_eq!(convs[0].last_message.from, user1);
    assert!(convs[0].is_read);
    assert_eq!(convs[0].unread_count, 1);

    assert_eq!(convs[1].last_message.body, "Cool.");
    assert!(!convs[1].is_read);
    assert_eq!(convs[1].unread_count, 2);

    assert_eq!(convs[2].last_message.body, "Word.");
    assert!(!convs[2].is_read);
    assert_eq!(convs[2].unread_count, 2);

    assert!(convs.iter().all(|c| !c.is_online && !c.is_blocked));
    assert_eq!(h.messenger.count_unread_conversations(user1).unwrap(), 3);
}

#[test]
fn test_conversation_order_follows_creation_time() {
    let h = harness();
    let a = h.user(1, "A");
    let b = h.user(2, "B");
    let c = h.user(3, "C");
    let d = h.user(4, "D");
    let t0 = Utc::now() - Duration::hours(1);

    // Inserted out of order; creation time decides
    h.messenger.send_at(a, d, "third", MessageKind::Message, t0 + Duration::minutes(3)).unwrap();
    h.messenger.send_at(a, b, "first", MessageKind::Message, t0 + Duration::minutes(1)).unwrap();
    h.messenger.send_at(a, c, "second", MessageKind::Message, t0 + Duration::minutes(2)).unwrap();

    let order: Vec<UserId> = h
        .messenger
        .get_conversations(a)
        .unwrap()
        .into_iter()
        .map(|s| s.counterpart)
        .collect();
    assert_eq!(order, vec![d, c, b]);
}

#[test]
fn test_get_contacts() {
    let h = harness();
    let user1 = h.user(1, "User One");
    let user2 = h.user(2, "User A");
    let user3 = h.user(3, "User B");
    let user4 = h.user(4, "User C");
    h.user(5, "User D");

    h.messenger.add_contact(user1, user2).unwrap();
    h.messenger.add_contact(user1, user3).unwrap();
    h.messenger.add_contact(user1, user4).unwrap();

    let contacts = h.messenger.get_contacts(user1).unwrap();
    let ids: Vec<UserId> = contacts.iter().map(|c| c.user_id).collect();
    assert_eq!(ids, vec![user2, user3, user4]);
    assert!(contacts.iter().all(|c| !c.is_online && !c.is_blocked));
    assert_eq!(contacts[0].fullname.as_deref(), Some("User A"));
}

#[test]
fn test_get_messages_and_most_recent() {
    let h = harness();
    let user1 = h.user(1, "User One");
    let user2 = h.user(2, "User Two");
    h.banter(user1, user2);

    let messages = h.messenger.get_messages(user1, user2).unwrap();
    let bodies: Vec<&str> = messages.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, vec!["Yo!", "Sup mang?", "Writing tests!", "Word."]);
    assert_eq!((messages[0].from, messages[0].to), (user1, user2));
    assert_eq!((messages[1].from, messages[1].to), (user2, user1));
    assert!(messages.windows(2).all(|w| w[0].order_key() < w[1].order_key()));

    let recent = h.messenger.get_most_recent_message(user1, user2).unwrap().unwrap();
    assert_eq!(recent.from, user2);
    assert_eq!(recent.to, user1);
    assert_eq!(recent.body, "Word.");

    let stranger = h.user(3, "Stranger");
    assert!(h.messenger.get_most_recent_message(user1, stranger).unwrap().is_none());
}

#[test]
fn test_get_profile() {
    let h = harness();
    let user1 = h.user(1, "User One");
    let mut record = UserRecord::new(UserId(2), "User Two");
    record.country = Some("AU".to_string());
    record.city = Some("Perth".to_string());
    h.directory.add_user(record);
    let user2 = UserId(2);

    let profile = h.messenger.get_profile(user1, user2).unwrap();
    assert_eq!(profile.user_id, user2);
    assert_eq!(profile.fullname, "User Two");
    assert!(profile.email.is_none());
    assert!(profile.country.is_none());
    assert!(profile.city.is_none());
    assert!(!profile.is_online);
    assert!(!profile.is_blocked);
    assert!(!profile.is_contact);

    // Contact and block flags are the viewer's own relationship
    h.messenger.block_user(user2, user1).unwrap();
    let profile = h.messenger.get_profile(user1, user2).unwrap();
    assert!(!profile.is_blocked);
    assert!(!profile.is_contact);
    let reverse = h.messenger.get_profile(user2, user1).unwrap();
    assert!(reverse.is_blocked);
    assert!(reverse.is_contact);

    assert!(matches!(
        h.messenger.get_profile(user1, UserId(404)),
        Err(MessagingError::UserNotFound(UserId(404)))
    ));
}

#[test]
fn test_delete_conversation() {
    let h = harness();
    let user1 = h.user(1, "User One");
    let user2 = h.user(2, "User Two");
    h.banter(user1, user2);

    assert_eq!(h.messenger.delete_conversation(user1, user2).unwrap(), 4);
    assert!(h.messenger.get_messages(user1, user2).unwrap().is_empty());
    assert!(h.messenger.get_conversations(user1).unwrap().is_empty());
    assert_eq!(h.messenger.count_unread_messages(user1, None).unwrap(), 0);

    // The other side keeps its view
    assert_eq!(h.messenger.get_messages(user2, user1).unwrap().len(), 4);
    assert_eq!(h.messenger.get_conversations(user2).unwrap().len(), 1);

    // Nothing left to delete
    assert_eq!(h.messenger.delete_conversation(user1, user2).unwrap(), 0);
}

#[test]
fn test_delete_conversation_reports_implicit_reads() {
    let h = harness();
    let user1 = h.user(1, "User One");
    let user2 = h.user(2, "User Two");
    h.banter(user1, user2);
    let unread: Vec<_> = h
        .messenger
        .get_messages(user1, user2)
        .unwrap()
        .into_iter()
        .filter(|m| m.to == user1)
        .map(|m| m.id)
        .collect();
    assert_eq!(unread.len(), 2);
    h.events.take();

    assert_eq!(h.messenger.delete_conversation(user1, user2).unwrap(), 4);
    assert_eq!(
        h.events.take(),
        vec![
            MessagingEvent::MessagesMarkedRead {
                user: user1,
                message_ids: unread,
            },
            MessagingEvent::ConversationDeleted {
                user: user1,
                counterpart: user2,
                message_count: 4,
            },
        ]
    );
}

#[test]
fn test_count_unread_conversations() {
    let h = harness();
    let user1 = h.user(1, "User One");
    let user2 = h.user(2, "User Two");
    let user3 = h.user(3, "User Three");
    let user4 = h.user(4, "User Four");

    assert_eq!(h.messenger.count_unread_conversations(user1).unwrap(), 0);

    h.send(user2, user1, "one");
    h.send(user2, user1, "two");
    h.send(user3, user1, "three");
    h.send(user1, user4, "outgoing only");
    assert_eq!(h.messenger.count_unread_conversations(user1).unwrap(), 2);

    h.messenger
        .mark_all_read_for_user(user1, ReadFilter::from_user(user2))
        .unwrap();
    assert_eq!(h.messenger.count_unread_conversations(user1).unwrap(), 1);
}

#[test]
fn test_mark_read_only_by_recipient() {
    let h = harness();
    let user1 = h.user(1, "User One");
    let user2 = h.user(2, "User Two");
    let msg = h.messenger.send_message(user1, user2, "private").unwrap();

    assert!(matches!(
        h.messenger.mark_read(user1, msg.id),
        Err(MessagingError::MessageNotFound(_))
    ));

    let first = h.messenger.mark_read(user2, msg.id).unwrap();
    let second = h.messenger.mark_read(user2, msg.id).unwrap();
    assert!(first.time_read.is_some());
    assert_eq!(first.time_read, second.time_read);
}

#[test]
fn test_contact_round_trip_clears_block() {
    let h = harness();
    let user1 = h.user(1, "User One");
    let user2 = h.user(2, "User Two");

    h.messenger.block_user(user1, user2).unwrap();
    assert!(h.messenger.is_blocked(user1, user2).unwrap());
    assert!(matches!(
        h.messenger.add_contact(user1, user2),
        Err(MessagingError::DuplicateContact { .. })
    ));

    assert!(h.messenger.remove_contact(user1, user2).unwrap());
    assert!(!h.messenger.remove_contact(user1, user2).unwrap());
    h.messenger.add_contact(user1, user2).unwrap();
    assert!(!h.messenger.is_blocked(user1, user2).unwrap());
    assert!(h.messenger.is_contact(user1, user2).unwrap());

    assert!(h.messenger.unblock_user(user1, user2).unwrap());
    assert!(!h.messenger.unblock_user(user1, UserId(3)).unwrap());
}

#[test]
fn test_unknown_users_are_rejected() {
    let h = harness();
    let user1 = h.user(1, "User One");
    assert!(matches!(
        h.messenger.send_message(user1, UserId(99), "anyone?"),
        Err(MessagingError::UserNotFound(UserId(99)))
    ));
    assert!(matches!(
        h.messenger.add_contact(UserId(98), user1),
        Err(MessagingError::UserNotFound(UserId(98)))
    ));
    assert!(h.events.events().is_empty());
}

#[test]
fn test_events_follow_mutations() {
    let h = harness();
    let user1 = h.user(1, "User One");
    let user2 = h.user(2, "User Two");

    let msg = h.messenger.send_message(user2, user1, "ping").unwrap();
    h.messenger.add_contact(user1, user2).unwrap();
    h.messenger.block_user(user1, user2).unwrap();
    // Already blocked: no event
    h.messenger.block_user(user1, user2).unwrap();
    h.messenger.mark_all_read_for_user(user1, ReadFilter::any()).unwrap();
    // Nothing left unread: no event
    h.messenger.mark_all_read_for_user(user1, ReadFilter::any()).unwrap();
    h.messenger.unblock_user(user1, user2).unwrap();
    h.messenger.remove_contact(user1, user2).unwrap();
    h.messenger.delete_conversation(user1, user2).unwrap();

    let events = h.events.take();
    assert_eq!(
        events,
        vec![
            MessagingEvent::MessageSent {
                message_id: msg.id,
                from: user2,
                to: user1,
                kind: MessageKind::Message,
            },
            MessagingEvent::ContactAdded {
                owner: user1,
                contact: user2,
                blocked: false,
            },
            MessagingEvent::ContactBlocked {
                owner: user1,
                contact: user2,
            },
            MessagingEvent::MessagesMarkedRead {
                user: user1,
                message_ids: vec![msg.id],
            },
            MessagingEvent::ContactUnblocked {
                owner: user1,
                contact: user2,
            },
            MessagingEvent::ContactRemoved {
                owner: user1,
                contact: user2,
            },
            MessagingEvent::ConversationDeleted {
                user: user1,
                counterpart: user2,
                message_count: 1,
            },
        ]
    );
}

#[test]
fn test_block_creates_missing_contact() {
    let h = harness();
    let user1 = h.user(1, "User One");
    let user2 = h.user(2, "User Two");

    let contact = h.messenger.block_user(user1, user2).unwrap();
    assert!(contact.blocked);
    assert_eq!(
        h.events.take(),
        vec![
            MessagingEvent::ContactAdded {
                owner: user1,
                contact: user2,
                blocked: true,
            },
            MessagingEvent::ContactBlocked {
                owner: user1,
                contact: user2,
            },
        ]
    );

    // Adding an already blocked contact announces the block too
    let user3 = h.user(3, "User Three");
    h.messenger.add_contact_with(user1, user3, true).unwrap();
    assert_eq!(
        h.events.take(),
        vec![
            MessagingEvent::ContactAdded {
                owner: user1,
                contact: user3,
                blocked: true,
            },
            MessagingEvent::ContactBlocked {
                owner: user1,
                contact: user3,
            },
        ]
    );
}

#[test]
fn test_state_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config {
        data_dir: Some(temp_dir.path().to_path_buf()),
        ..Config::default()
    };
    let directory = Arc::new(InMemoryDirectory::new());
    directory.add_user(UserRecord::new(UserId(1), "User One"));
    directory.add_user(UserRecord::new(UserId(2), "User Two"));

    {
        let messenger = Messenger::open(
            config.clone(),
            directory.clone(),
            directory.clone(),
            Arc::new(RecordingSink::new()),
        )
        .unwrap();
        messenger.send_message(UserId(1), UserId(2), "persisted").unwrap();
        messenger.add_contact(UserId(2), UserId(1)).unwrap();
        messenger.flush().unwrap();
    }

    let messenger = Messenger::open(config, directory.clone(), directory, Arc::new(RecordingSink::new())).unwrap();
    assert_eq!(messenger.get_messages(UserId(2), UserId(1)).unwrap()[0].body, "persisted");
    assert_eq!(messenger.count_unread_messages(UserId(2), None).unwrap(), 1);
    assert!(messenger.is_contact(UserId(2), UserId(1)).unwrap());
}
