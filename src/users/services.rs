use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{error, info, warn};

use crate::error::{UserError, UserResult};
use crate::users::dto::{NewUser, PublicUser, UserChanges};
use crate::users::password::PasswordHasher;
use crate::users::repo::UserStore;
use crate::users::repo_types::UserPatch;

pub const USER_DELETED: &str = "User deleted successfully";

/// User lifecycle rules over the store and a password hasher.
///
/// Every operation holds the store guard from its first read to its last write,
/// so email uniqueness and id assignment cannot race.
#[derive(Clone)]
pub struct UserService {
    store: Arc<Mutex<UserStore>>,
    hasher: Arc<dyn PasswordHasher>,
}

impl UserService {
    pub fn new(store: UserStore, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            hasher,
        }
    }

    fn lock(
        &self,
        op: &'static str,
        failure: &'static str,
    ) -> UserResult<MutexGuard<'_, UserStore>> {
        self.store.lock().map_err(|e| {
            error!(error = %e, op, "user store lock poisoned");
            UserError::Internal(failure)
        })
    }

    /// Empty the store and restart ids at 1.
    pub fn reset(&self) -> UserResult<()> {
        self.lock("reset", "Failed to reset users")?.reset();
        Ok(())
    }

    pub fn list_all(&self) -> UserResult<Vec<PublicUser>> {
        let store = self.lock("list_all", "Failed to list users")?;
        Ok(store.list_all().into_iter().map(PublicUser::from).collect())
    }

    pub fn get(&self, id: i64) -> UserResult<PublicUser> {
        let store = self.lock("get", "Failed to fetch user")?;
        store
            .get_by_id(id)
            .map(PublicUser::from)
            .ok_or(UserError::NotFound)
    }

    /// `input` must already have passed full validation.
    pub fn create(&self, input: NewUser) -> UserResult<PublicUser> {
        const FAILED: &str = "Failed to create user";
        let mut store = self.lock("create", FAILED)?;

        if store.get_by_email(&input.email).is_some() {
            warn!(email = %input.email, "email already exists");
            return Err(UserError::EmailExists);
        }

        let hash = self.hasher.hash(&input.password).map_err(|e| {
            error!(error = %e, "hash_password failed");
            UserError::Internal(FAILED)
        })?;

        let id = store.insert(&input.name, &input.email, &hash);
        let user = store.get_by_id(id).map(PublicUser::from).ok_or_else(|| {
            error!(user_id = id, "created user missing after insert");
            UserError::Internal(FAILED)
        })?;

        info!(user_id = user.id, email = %user.email, "user created");
        Ok(user)
    }

    /// `changes` must already have passed partial validation.
    pub fn update(&self, id: i64, changes: UserChanges) -> UserResult<PublicUser> {
        const FAILED: &str = "Failed to update user";
        let mut store = self.lock("update", FAILED)?;

        let current_email = match store.get_by_id(id) {
            Some(u) => u.email.clone(),
            None => {
                warn!(user_id = id, "update of unknown user");
                return Err(UserError::NotFound);
            }
        };

        if let Some(email) = changes.email.as_deref() {
            if email != current_email && store.get_by_email(email).is_some() {
                warn!(user_id = id, email = %email, "email already exists");
                return Err(UserError::EmailExists);
            }
        }

        let password_hash = match changes.password.as_deref() {
            Some(plain) => Some(self.hasher.hash(plain).map_err(|e| {
                error!(error = %e, user_id = id, "hash_password failed");
                UserError::Internal(FAILED)
            })?),
            None => None,
        };

        store.update(
            id,
            UserPatch {
                name: changes.name,
                email: changes.email,
                password_hash,
            },
        );

        let user = store.get_by_id(id).map(PublicUser::from).ok_or_else(|| {
            error!(user_id = id, "updated user missing after update");
            UserError::Internal(FAILED)
        })?;

        info!(user_id = id, "user updated");
        Ok(user)
    }

    pub fn delete(&self, id: i64) -> UserResult<&'static str> {
        let mut store = self.lock("delete", "Failed to delete user")?;
        if !store.delete(id) {
            warn!(user_id = id, "delete of unknown user");
            return Err(UserError::NotFound);
        }
        info!(user_id = id, "user deleted");
        Ok(USER_DELETED)
    }

    /// Unknown email and wrong password fail identically.
    pub fn authenticate(&self, email: &str, password: &str) -> UserResult<PublicUser> {
        const FAILED: &str = "Authentication failed";
        let store = self.lock("authenticate", FAILED)?;

        let Some(user) = store.get_by_email(email) else {
            warn!(email = %email, "login unknown email");
            return Err(UserError::InvalidCredentials);
        };

        let ok = self.hasher.verify(password, &user.password_hash).map_err(|e| {
            error!(error = %e, user_id = user.id, "verify_password failed");
            UserError::Internal(FAILED)
        })?;

        if !ok {
            warn!(email = %email, user_id = user.id, "login invalid password");
            return Err(UserError::InvalidCredentials);
        }

        info!(user_id = user.id, "user logged in");
        Ok(PublicUser::from(user))
    }

    pub fn search_by_name(&self, term: &str) -> UserResult<Vec<PublicUser>> {
        let store = self.lock("search_by_name", "Failed to search users")?;
        Ok(store
            .search_by_name(term)
            .into_iter()
            .map(PublicUser::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::password::fast_hasher;
    use crate::users::validation::{validate_new_user, validate_user_changes};
    use serde_json::json;

    fn service() -> UserService {
        UserService::new(UserStore::new(), Arc::new(fast_hasher()))
    }

    fn new_user(name: &str, email: &str, password: &str) -> NewUser {
        NewUser {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    /// Hasher that always fails, to exercise the internal-error path.
    struct BrokenHasher;

    impl PasswordHasher for BrokenHasher {
        fn hash(&self, _plain: &str) -> anyhow::Result<String> {
            anyhow::bail!("no entropy")
        }
        fn verify(&self, _plain: &str, _hash: &str) -> anyhow::Result<bool> {
            anyhow::bail!("bad hash")
        }
    }

    #[test]
    fn create_returns_safe_projection() {
        let svc = service();
        let user = svc
            .create(new_user("John Doe", "john@example.com", "password123"))
            .expect("created");
        assert_eq!(user.id, 1);
        assert_eq!(user.name, "John Doe");
        assert_eq!(user.email, "john@example.com");

        let body = serde_json::to_value(&user).unwrap();
        let mut keys: Vec<&str> = body.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["created_at", "email", "id", "name"]);
        assert!(!body.to_string().contains("argon2"));
    }

    #[test]
    fn duplicate_email_is_rejected_case_insensitively() {
        let svc = service();
        let first = validate_new_user(&json!({
            "name": "John Doe", "email": "john@example.com", "password": "password123"
        }))
        .unwrap();
        let second = validate_new_user(&json!({
            "name": "Johnny", "email": "JOHN@Example.com", "password": "password456"
        }))
        .unwrap();

        svc.create(first).unwrap();
        assert_eq!(svc.create(second), Err(UserError::EmailExists));
        assert_eq!(svc.list_all().unwrap().len(), 1);
    }

    #[test]
    fn create_reports_hash_failure_generically() {
        let svc = UserService::new(UserStore::new(), Arc::new(BrokenHasher));
        let err = svc
            .create(new_user("John Doe", "john@example.com", "password123"))
            .unwrap_err();
        assert_eq!(err, UserError::Internal("Failed to create user"));
        assert!(svc.list_all().unwrap().is_empty());
    }

    #[test]
    fn get_round_trips_created_fields() {
        let svc = service();
        let input = validate_new_user(&json!({
            "name": " Ann Lee ", "email": "Ann@Example.com", "password": "secret1"
        }))
        .unwrap();
        let created = svc.create(input).unwrap();
        let fetched = svc.get(created.id).unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.name, "Ann Lee");
        assert_eq!(fetched.email, "ann@example.com");
        assert_eq!(svc.get(999), Err(UserError::NotFound));
    }

    #[test]
    fn list_all_is_newest_first() {
        let svc = service();
        svc.create(new_user("Ann Lee", "ann@example.com", "secret1")).unwrap();
        svc.create(new_user("Ben Hill", "ben@example.com", "secret1")).unwrap();
        let names: Vec<String> = svc.list_all().unwrap().into_iter().map(|u| u.name).collect();
        assert_eq!(names, vec!["Ben Hill", "Ann Lee"]);
    }

    #[test]
    fn update_name_preserves_email_and_id() {
        let svc = service();
        let created = svc
            .create(new_user("Original Name", "original@example.com", "password123"))
            .unwrap();

        let changes = validate_user_changes(&json!({ "name": "Updated Name" })).unwrap();
        let updated = svc.update(created.id, changes).unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "Updated Name");
        assert_eq!(updated.email, "original@example.com");
        assert_eq!(updated.created_at, created.created_at);
    }

    #[test]
    fn update_unknown_user() {
        let svc = service();
        let changes = UserChanges {
            name: Some("Updated Name".into()),
            ..Default::default()
        };
        assert_eq!(svc.update(999, changes), Err(UserError::NotFound));
    }

    #[test]
    fn update_email_checks_uniqueness() {
        let svc = service();
        let ann = svc.create(new_user("Ann Lee", "ann@example.com", "secret1")).unwrap();
        svc.create(new_user("Ben Hill", "ben@example.com", "secret1")).unwrap();

        let taken = UserChanges {
            email: Some("ben@example.com".into()),
            ..Default::default()
        };
        assert_eq!(svc.update(ann.id, taken), Err(UserError::EmailExists));

        // keeping one's own email is not a conflict
        let same = UserChanges {
            email: Some("ann@example.com".into()),
            ..Default::default()
        };
        assert!(svc.update(ann.id, same).is_ok());

        let fresh = UserChanges {
            email: Some("annie@example.com".into()),
            ..Default::default()
        };
        assert_eq!(svc.update(ann.id, fresh).unwrap().email, "annie@example.com");
    }

    #[test]
    fn update_password_rehashes() {
        let svc = service();
        let ann = svc.create(new_user("Ann Lee", "ann@example.com", "secret1")).unwrap();
        let changes = UserChanges {
            password: Some("newpass2".into()),
            ..Default::default()
        };
        svc.update(ann.id, changes).unwrap();

        assert_eq!(
            svc.authenticate("ann@example.com", "secret1"),
            Err(UserError::InvalidCredentials)
        );
        assert_eq!(svc.authenticate("ann@example.com", "newpass2").unwrap().id, ann.id);
    }

    #[test]
    fn delete_removes_and_is_safe_to_retry() {
        let svc = service();
        let ann = svc.create(new_user("To Delete", "delete@example.com", "secret1")).unwrap();

        assert_eq!(svc.delete(ann.id), Ok(USER_DELETED));
        assert!(svc.list_all().unwrap().is_empty());
        assert_eq!(svc.delete(ann.id), Err(UserError::NotFound));
        assert_eq!(svc.delete(ann.id), Err(UserError::NotFound));
    }

    #[test]
    fn authenticate_does_not_leak_account_existence() {
        let svc = service();
        svc.create(new_user("Test User", "test@example.com", "password123")).unwrap();

        let ok = svc.authenticate("test@example.com", "password123").unwrap();
        assert_eq!(ok.email, "test@example.com");

        let wrong_password = svc.authenticate("test@example.com", "wrongpass1").unwrap_err();
        let unknown_email = svc.authenticate("nobody@example.com", "password123").unwrap_err();
        assert_eq!(wrong_password, unknown_email);
        assert_eq!(wrong_password.to_string(), "Invalid credentials");
    }

    #[test]
    fn authenticate_reports_verify_failure_generically() {
        let svc = UserService::new(UserStore::new(), Arc::new(BrokenHasher));
        svc.store.lock().unwrap().insert("Ann Lee", "ann@example.com", "garbage");
        assert_eq!(
            svc.authenticate("ann@example.com", "secret1"),
            Err(UserError::Internal("Authentication failed"))
        );
    }

    #[test]
    fn search_by_name_matches_substring_sorted() {
        let svc = service();
        svc.create(new_user("John Smith", "john@example.com", "password123")).unwrap();
        svc.create(new_user("Jane Doe", "jane@example.com", "password123")).unwrap();
        svc.create(new_user("Bob Johnson", "bob@example.com", "password123")).unwrap();

        let names: Vec<String> = svc
            .search_by_name("John")
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(names, vec!["Bob Johnson", "John Smith"]);

        let jane = svc.search_by_name("Jane").unwrap();
        assert_eq!(jane.len(), 1);
        assert_eq!(jane[0].name, "Jane Doe");
    }

    #[test]
    fn reset_restarts_ids() {
        let svc = service();
        svc.create(new_user("Ann Lee", "ann@example.com", "secret1")).unwrap();
        svc.reset().unwrap();
        assert!(svc.list_all().unwrap().is_empty());
        let again = svc.create(new_user("Ann Lee", "ann@example.com", "secret1")).unwrap();
        assert_eq!(again.id, 1);
    }

    #[test]
    fn concurrent_creates_with_same_email_store_one_user() {
        let svc = service();
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let svc = svc.clone();
                std::thread::spawn(move || {
                    svc.create(new_user(&format!("Racer {i}"), "same@example.com", "secret1"))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| *e == UserError::EmailExists));
        assert_eq!(svc.list_all().unwrap().len(), 1);
    }

    #[test]
    fn concurrent_creates_assign_distinct_sequential_ids() {
        const N: i64 = 16;
        let svc = service();
        let handles: Vec<_> = (0..N)
            .map(|i| {
                let svc = svc.clone();
                std::thread::spawn(move || {
                    let email = format!("user{i}@example.com");
                    svc.create(new_user("User Name", &email, "secret1")).map(|u| u.id)
                })
            })
            .collect();

        let mut ids: Vec<i64> = handles
            .into_iter()
            .map(|h| h.join().unwrap().expect("created"))
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=N).collect::<Vec<_>>());
        assert_eq!(svc.list_all().unwrap().len(), N as usize);
    }

    #[test]
    fn poisoned_store_is_an_internal_error() {
        let svc = service();
        let clone = svc.clone();
        let _ = std::thread::spawn(move || {
            let _guard = clone.store.lock().unwrap();
            panic!("poison the store");
        })
        .join();

        assert_eq!(
            svc.create(new_user("Ann Lee", "ann@example.com", "secret1")),
            Err(UserError::Internal("Failed to create user"))
        );
        assert_eq!(svc.delete(1), Err(UserError::Internal("Failed to delete user")));
    }
}
