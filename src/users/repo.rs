use std::collections::BTreeMap;

use time::OffsetDateTime;
use tracing::{debug, info};

use crate::users::repo_types::{User, UserPatch};

/// In-memory user table plus the id counter.
///
/// Has no locking of its own; `UserService` serializes access.
#[derive(Debug)]
pub struct UserStore {
    users: BTreeMap<i64, User>,
    next_id: i64,
}

impl Default for UserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UserStore {
    pub fn new() -> Self {
        Self {
            users: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Drop every record and restart ids at 1.
    pub fn reset(&mut self) {
        self.users.clear();
        self.next_id = 1;
        info!("in-memory user store initialized");
    }

    /// All users, most recently created first.
    pub fn list_all(&self) -> Vec<&User> {
        let mut rows: Vec<&User> = self.users.values().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows
    }

    pub fn get_by_id(&self, id: i64) -> Option<&User> {
        self.users.get(&id)
    }

    /// Exact match against the stored (already lower-cased) email.
    pub fn get_by_email(&self, email: &str) -> Option<&User> {
        self.users.values().find(|u| u.email == email)
    }

    /// Store a new record and return its id.
    pub fn insert(&mut self, name: &str, email: &str, password_hash: &str) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        self.users.insert(
            id,
            User {
                id,
                name: name.to_string(),
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                created_at: OffsetDateTime::now_utc(),
            },
        );
        debug!(user_id = id, "user row inserted");
        id
    }

    /// Apply `patch` in place. Unknown ids are a no-op.
    pub fn update(&mut self, id: i64, patch: UserPatch) {
        let Some(user) = self.users.get_mut(&id) else {
            return;
        };
        if let Some(name) = patch.name {
            user.name = name;
        }
        if let Some(email) = patch.email {
            user.email = email;
        }
        if let Some(password_hash) = patch.password_hash {
            user.password_hash = password_hash;
        }
    }

    /// Returns whether a record was removed.
    pub fn delete(&mut self, id: i64) -> bool {
        self.users.remove(&id).is_some()
    }

    /// Case-insensitive substring match on name, ordered by name.
    pub fn search_by_name(&self, term: &str) -> Vec<&User> {
        let needle = term.to_lowercase();
        let mut rows: Vec<&User> = self
            .users
            .values()
            .filter(|u| u.name.to_lowercase().contains(&needle))
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }
}
