/// User, course and message search
///
/// Name matching is a case-insensitive substring test. Every result list is
/// cut to the configured limit after ordering.
use crate::contact_store::ContactStore;
use crate::directory::{is_online, Course, CourseCatalog, UserDirectory, UserRecord};
use crate::error::Result;
use crate::message_store::MessageStore;
use crate::messenger_types::{
    ContactSummary, CourseHit, CourseId, CourseParticipantHit, MessageSearchHit, UserId, UserSearchResults,
};
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Lower-cased, trimmed query; None when nothing is left to match
fn normalize(query: &str) -> Option<String> {
    let q = query.trim();
    if q.is_empty() {
        None
    } else {
        Some(q.to_lowercase())
    }
}

fn name_matches(fullname: &str, needle: &str) -> bool {
    fullname.to_lowercase().contains(needle)
}

/// exact 3, prefix 2, substring 1, none 0; best of fullname and shortname
fn course_relevance(course: &Course, needle: &str) -> u8 {
    [&course.fullname, &course.shortname]
        .iter()
        .map(|field| {
            let field = field.to_lowercase();
            if field == needle {
                3
            } else if field.starts_with(needle) {
                2
            } else if field.contains(needle) {
                1
            } else {
                0
            }
        })
        .max()
        .unwrap_or(0)
}

pub struct SearchEngine {
    contacts: ContactStore,
    messages: MessageStore,
    directory: Arc<dyn UserDirectory>,
    catalog: Arc<dyn CourseCatalog>,
    online_window: Duration,
    limit: usize,
}

impl SearchEngine {
    pub fn new(
        contacts: ContactStore,
        messages: MessageStore,
        directory: Arc<dyn UserDirectory>,
        catalog: Arc<dyn CourseCatalog>,
        online_window: Duration,
        limit: usize,
    ) -> Self {
        Self {
            contacts,
            messages,
            directory,
            catalog,
            online_window,
            limit,
        }
    }

    fn summary(&self, record: &UserRecord, blocked: bool, now: DateTime<Utc>) -> ContactSummary {
        ContactSummary {
            user_id: record.id,
            fullname: Some(record.fullname.clone()),
            is_online: is_online(record, now, self.online_window),
            is_blocked: blocked,
        }
    }

    /// Matching contacts, visible courses and other users
    pub fn search_users(&self, searcher: UserId, query: &str, now: DateTime<Utc>) -> Result<UserSearchResults> {
        let Some(needle) = normalize(query) else {
            return Ok(UserSearchResults::default());
        };

        let own = self.contacts.contacts_of(searcher)?;
        let contact_ids: HashSet<UserId> = own.iter().map(|c| c.contact).collect();

        let mut contacts: Vec<(String, ContactSummary)> = own
            .iter()
            .filter_map(|c| {
                let record = self.directory.user(c.contact)?;
                name_matches(&record.fullname, &needle)
                    .then(|| (record.fullname.to_lowercase(), self.summary(&record, c.blocked, now)))
            })
            .collect();
        contacts.sort_by(|a, b| (&a.0, a.1.user_id).cmp(&(&b.0, b.1.user_id)));

        let mut courses: Vec<(u8, Course)> = self
            .catalog
            .visible_courses(searcher)
            .into_iter()
            .map(|c| (course_relevance(&c, &needle), c))
            .filter(|(score, _)| *score > 0)
            .collect();
        courses.sort_by_key(|(score, c)| (Reverse(*score), Reverse(c.id)));

        let mut non_contacts: Vec<(String, ContactSummary)> = self
            .directory
            .users()
            .into_iter()
            .filter(|u| u.id != searcher && !contact_ids.contains(&u.id))
            .filter(|u| name_matches(&u.fullname, &needle))
            .filter(|u| !self.catalog.shares_course(searcher, u.id))
            .map(|u| (u.fullname.to_lowercase(), self.summary(&u, false, now)))
            .collect();
        non_contacts.sort_by(|a, b| (&a.0, a.1.user_id).cmp(&(&b.0, b.1.user_id)));

        let results = UserSearchResults {
            contacts: contacts.into_iter().take(self.limit).map(|(_, s)| s).collect(),
            courses: courses
                .into_iter()
                .take(self.limit)
                .map(|(_, c)| CourseHit {
                    id: c.id,
                    fullname: c.fullname,
                    shortname: c.shortname,
                })
                .collect(),
            non_contacts: non_contacts.into_iter().take(self.limit).map(|(_, s)| s).collect(),
        };
        debug!(
            "search_users({}, {:?}): {} contacts, {} courses, {} others",
            searcher,
            needle,
            results.contacts.len(),
            results.courses.len(),
            results.non_contacts.len()
        );
        Ok(results)
    }

    /// Per counterpart, the latest visible message containing the query
    pub fn search_messages(&self, user: UserId, query: &str, now: DateTime<Utc>) -> Result<Vec<MessageSearchHit>> {
        let Some(needle) = normalize(query) else {
            return Ok(Vec::new());
        };

        let mut hits = Vec::new();
        for counterpart in self.messages.counterparts(user)? {
            let thread = self.messages.thread(user, counterpart)?;
            let Some(message) = thread.into_iter().rev().find(|m| m.body.to_lowercase().contains(&needle)) else {
                continue;
            };
            let record = self.directory.user(counterpart);
            hits.push(MessageSearchHit {
                counterpart,
                fullname: record.as_ref().map(|r| r.fullname.clone()),
                is_read: message.is_read(),
                message,
                is_online: record
                    .as_ref()
                    .map(|r| is_online(r, now, self.online_window))
                    .unwrap_or(false),
                is_blocked: self.contacts.is_blocked(user, counterpart)?,
            });
        }
        hits.sort_by_key(|h| h.message.order_key());
        hits.truncate(self.limit);
        Ok(hits)
    }

    /// Participants of `course` other than the searcher whose name matches
    pub fn search_users_in_course(
        &self,
        searcher: UserId,
        course: CourseId,
        query: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<CourseParticipantHit>> {
        let Some(needle) = normalize(query) else {
            return Ok(Vec::new());
        };

        let mut hits = Vec::new();
        for participant in self.catalog.participants(course) {
            if participant == searcher {
                continue;
            }
            let Some(record) = self.directory.user(participant) else {
                continue;
            };
            if !name_matches(&record.fullname, &needle) {
                continue;
            }
            let relationship = self.contacts.get_contact(searcher, participant)?;
            hits.push(CourseParticipantHit {
                user_id: participant,
                is_online: is_online(&record, now, self.online_window),
                is_blocked: relationship.as_ref().map(|c| c.blocked).unwrap_or(false),
                is_contact: relationship.is_some(),
                is_messaging: !self.messages.thread_ids(searcher, participant)?.is_empty(),
                fullname: record.fullname,
            });
        }
        hits.sort_by(|a, b| {
            (a.fullname.to_lowercase(), a.user_id).cmp(&(b.fullname.to_lowercase(), b.user_id))
        });
        hits.truncate(self.limit);
        Ok(hits)
    }
}
