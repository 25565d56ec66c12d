/// User directory and course catalogue seams
///
/// The engine never owns user or course records. Hosts plug in their own
/// `UserDirectory` / `CourseCatalog`; `InMemoryDirectory` is the bundled
/// implementation used by the CLI and tests, persisted as `directory.json`.
use crate::error::{MessagingError, Result};
use crate::messenger_types::{CourseId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, warn};

const DIRECTORY_FILE: &str = "directory.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub fullname: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub last_access: Option<DateTime<Utc>>,
}

impl UserRecord {
    pub fn new(id: UserId, fullname: impl Into<String>) -> Self {
        Self {
            id,
            fullname: fullname.into(),
            email: None,
            country: None,
            city: None,
            last_access: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub fullname: String,
    pub shortname: String,
}

/// Read access to user records
pub trait UserDirectory: Send + Sync {
    fn user(&self, id: UserId) -> Option<UserRecord>;

    /// Every known user, ascending by id
    fn users(&self) -> Vec<UserRecord>;

    /// Whether `viewer` may see the private profile fields of `target`
    fn can_view_details(&self, viewer: UserId, target: UserId) -> bool;
}

/// Read access to courses and enrolments
pub trait CourseCatalog: Send + Sync {
    /// Courses `viewer` is allowed to find by name
    fn visible_courses(&self, viewer: UserId) -> Vec<Course>;

    fn participants(&self, course: CourseId) -> Vec<UserId>;

    fn courses_of(&self, user: UserId) -> Vec<CourseId>;

    fn shares_course(&self, a: UserId, b: UserId) -> bool {
        let mine: HashSet<CourseId> = self.courses_of(a).into_iter().collect();
        self.courses_of(b).iter().any(|c| mine.contains(c))
    }
}

/// Online if the last access falls within `window` before `now`
pub fn is_online(record: &UserRecord, now: DateTime<Utc>, window: Duration) -> bool {
    match record.last_access {
        // Access stamps ahead of `now` (clock skew) count as online
        Some(seen) => match now.signed_duration_since(seen).to_std() {
            Ok(elapsed) => elapsed <= window,
            Err(_) => true,
        },
        None => false,
    }
}

#[derive(Debug, Clone, Default)]
struct DirectoryState {
    users: BTreeMap<UserId, UserRecord>,
    courses: BTreeMap<CourseId, Course>,
    /// course -> enrolled users
    enrolments: BTreeMap<CourseId, BTreeSet<UserId>>,
    /// viewer -> targets whose details the viewer may see
    detail_grants: BTreeMap<UserId, BTreeSet<UserId>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DirectoryFileV1 {
    version: u8,
    users: Vec<UserRecord>,
    courses: Vec<Course>,
    enrolments: Vec<(CourseId, Vec<UserId>)>,
    #[serde(default)]
    detail_grants: Vec<(UserId, Vec<UserId>)>,
}

/// Directory and catalogue held in memory
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    state: RwLock<DirectoryState>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, DirectoryState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, DirectoryState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert or replace a user record
    pub fn add_user(&self, record: UserRecord) {
        debug!("Directory: upsert {} ({})", record.id, record.fullname);
        self.write().users.insert(record.id, record);
    }

    /// Insert or replace a course
    pub fn add_course(&self, course: Course) {
        debug!("Directory: upsert {} ({})", course.id, course.shortname);
        self.write().courses.insert(course.id, course);
    }

    pub fn enrol(&self, user: UserId, course: CourseId) -> Result<()> {
        let mut state = self.write();
        if !state.users.contains_key(&user) {
            return Err(MessagingError::UserNotFound(user));
        }
        if !state.courses.contains_key(&course) {
            return Err(MessagingError::Config(format!("Unknown course: {}", course)));
        }
        state.enrolments.entry(course).or_default().insert(user);
        Ok(())
    }

    /// Record an access by `user` at `at`
    pub fn touch(&self, user: UserId, at: DateTime<Utc>) -> Result<()> {
        let mut state = self.write();
        let record = state.users.get_mut(&user).ok_or(MessagingError::UserNotFound(user))?;
        record.last_access = Some(at);
        Ok(())
    }

    /// Allow `viewer` to see the private fields of `target`
    pub fn grant_details(&self, viewer: UserId, target: UserId) {
        self.write().detail_grants.entry(viewer).or_default().insert(target);
    }

    /// Load `directory.json` from `data_dir`; a missing file yields an empty directory
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(DIRECTORY_FILE);
        if !path.exists() {
            debug!("No directory file at {:?}, starting empty", path);
            return Ok(Self::new());
        }
        let raw = fs::read_to_string(&path).map_err(MessagingError::Io)?;
        let parsed: DirectoryFileV1 = serde_json::from_str(&raw).map_err(MessagingError::Serialization)?;
        if parsed.version != 1 {
            return Err(MessagingError::Config(format!(
                "Unsupported directory file version: {}",
                parsed.version
            )));
        }

        let mut state = DirectoryState::default();
        for user in parsed.users {
            state.users.insert(user.id, user);
        }
        for course in parsed.courses {
            state.courses.insert(course.id, course);
        }
        for (course, members) in parsed.enrolments {
            if !state.courses.contains_key(&course) {
                warn!("Skipping enrolments for unknown {}", course);
                continue;
            }
            state.enrolments.insert(course, members.into_iter().collect());
        }
        for (viewer, targets) in parsed.detail_grants {
            state.detail_grants.insert(viewer, targets.into_iter().collect());
        }
        debug!(
            "Directory loaded: {} users, {} courses",
            state.users.len(),
            state.courses.len()
        );
        Ok(Self {
            state: RwLock::new(state),
        })
    }

    /// Write the whole directory to `data_dir/directory.json`
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        fs::create_dir_all(data_dir).map_err(MessagingError::Io)?;
        let file = {
            let state = self.read();
            DirectoryFileV1 {
                version: 1,
                users: state.users.values().cloned().collect(),
                courses: state.courses.values().cloned().collect(),
                enrolments: state
                    .enrolments
                    .iter()
                    .map(|(c, members)| (*c, members.iter().copied().collect()))
                    .collect(),
                detail_grants: state
                    .detail_grants
                    .iter()
                    .map(|(v, targets)| (*v, targets.iter().copied().collect()))
                    .collect(),
            }
        };
        let json = serde_json::to_string_pretty(&file).map_err(MessagingError::Serialization)?;
        fs::write(data_dir.join(DIRECTORY_FILE), json).map_err(MessagingError::Io)?;
        Ok(())
    }
}

impl UserDirectory for InMemoryDirectory {
    fn user(&self, id: UserId) -> Option<UserRecord> {
        self.read().users.get(&id).cloned()
    }

    fn users(&self) -> Vec<UserRecord> {
        self.read().users.values().cloned().collect()
    }

    fn can_view_details(&self, viewer: UserId, target: UserId) -> bool {
        viewer == target
            || self
                .read()
                .detail_grants
                .get(&viewer)
                .map(|targets| targets.contains(&target))
                .unwrap_or(false)
    }
}

impl CourseCatalog for InMemoryDirectory {
    /// Every course is visible in the bundled catalogue
    fn visible_courses(&self, _viewer: UserId) -> Vec<Course> {
        self.read().courses.values().cloned().collect()
    }

    fn participants(&self, course: CourseId) -> Vec<UserId> {
        self.read()
            .enrolments
            .get(&course)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    fn courses_of(&self, user: UserId) -> Vec<CourseId> {
        self.read()
            .enrolments
            .iter()
            .filter(|(_, members)| members.contains(&user))
            .map(|(c, _)| *c)
            .collect()
    }
}
