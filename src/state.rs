use std::sync::Arc;

use crate::config::AppConfig;
use crate::users::password::{Argon2Hasher, PasswordHasher};
use crate::users::repo::UserStore;
use crate::users::services::UserService;

#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let hasher = Arc::new(Argon2Hasher::new()) as Arc<dyn PasswordHasher>;
        Ok(Self::from_parts(UserService::new(UserStore::new(), hasher), config))
    }

    pub fn from_parts(users: UserService, config: Arc<AppConfig>) -> Self {
        Self { users, config }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        let hasher = Arc::new(crate::users::password::fast_hasher()) as Arc<dyn PasswordHasher>;
        Self::from_parts(
            UserService::new(UserStore::new(), hasher),
            Arc::new(AppConfig::default()),
        )
    }
}
