use time::OffsetDateTime;

/// User record held by the store.
///
/// Deliberately not `Serialize`: the only way out of the core is through
/// [`PublicUser`](crate::users::dto::PublicUser).
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,                      // assigned by the store, never reused
    pub name: String,
    pub email: String,                // lower-cased, unique
    pub password_hash: String,        // Argon2 PHC string
    pub created_at: OffsetDateTime,   // set once on insert
}

/// Fields that an update may change. `id` and `created_at` are not patchable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}
