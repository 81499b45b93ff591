//! Request-shape checks for user payloads.
//!
//! Every detected problem is collected and reported as one `"; "`-joined
//! [`UserError::Validation`] message. On success the cleaned values are
//! returned: strings trimmed, name and email sanitized, email lower-cased.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{UserError, UserResult};
use crate::users::dto::{LoginCredentials, NewUser, UserChanges};
use crate::users::sanitize::sanitize;

const USER_FIELDS: [&str; 3] = ["name", "email", "password"];
const LOGIN_FIELDS: [&str; 2] = ["email", "password"];

const MIN_NAME_LENGTH: usize = 2;
const MAX_NAME_LENGTH: usize = 100;
const MIN_PASSWORD_LENGTH: usize = 6;

lazy_static! {
    static ref NAME_RE: Regex = Regex::new(r"^[a-zA-Z\s'\-.]+$").unwrap();
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
}

/// Whether absent fields are an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Creation: name, email and password are all required.
    Full,
    /// Update: only the fields present are checked.
    Partial,
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn check_name(name: &str) -> Result<(), &'static str> {
    let len = name.chars().count();
    if len == 0 {
        return Err("Name is required");
    }
    if len < MIN_NAME_LENGTH {
        return Err("Name must be at least 2 characters long");
    }
    if len > MAX_NAME_LENGTH {
        return Err("Name must be less than 100 characters");
    }
    if !NAME_RE.is_match(name) {
        return Err("Name contains invalid characters");
    }
    Ok(())
}

/// First failing rule wins: presence, length, letter, digit.
pub fn check_password(password: &str) -> Result<(), &'static str> {
    if password.is_empty() {
        return Err("Password is required");
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err("Password must be at least 6 characters long");
    }
    if !password.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err("Password must contain at least one letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one number");
    }
    Ok(())
}

/// Storage form of an email that already passed the format check.
pub fn normalize_email(email: &str) -> String {
    sanitize(email).to_lowercase()
}

/// Validate a user payload in either mode and return the cleaned fields.
pub fn validate_user_data(data: &Value, mode: ValidationMode) -> UserResult<UserChanges> {
    let fields = clean_fields(data)?;
    let mut errors: Vec<String> = Vec::new();
    let mut out = UserChanges::default();

    match fields.get("name") {
        Some(v) => match field_text(v, "Name") {
            Ok(name) => match check_name(name) {
                Ok(()) => out.name = Some(sanitize(name)),
                Err(msg) => errors.push(msg.into()),
            },
            Err(msg) => errors.push(msg),
        },
        None if mode == ValidationMode::Full => errors.push("Name is required".into()),
        None => {}
    }

    match fields.get("email") {
        Some(v) => match field_text(v, "Email") {
            Ok(email) if is_valid_email(email) => out.email = Some(normalize_email(email)),
            Ok(_) => errors.push("Invalid email format".into()),
            Err(msg) => errors.push(msg),
        },
        None if mode == ValidationMode::Full => errors.push("Email is required".into()),
        None => {}
    }

    match fields.get("password") {
        Some(v) => match field_text(v, "Password") {
            Ok(password) => match check_password(password) {
                Ok(()) => out.password = Some(password.to_string()),
                Err(msg) => errors.push(msg.into()),
            },
            Err(msg) => errors.push(msg),
        },
        None if mode == ValidationMode::Full => errors.push("Password is required".into()),
        None => {}
    }

    if let Some(msg) = unexpected_fields(&fields, &USER_FIELDS) {
        errors.push(msg);
    }

    finish(errors, out)
}

/// Full-mode validation for creation.
pub fn validate_new_user(data: &Value) -> UserResult<NewUser> {
    let fields = validate_user_data(data, ValidationMode::Full)?;
    match (fields.name, fields.email, fields.password) {
        (Some(name), Some(email), Some(password)) => Ok(NewUser {
            name,
            email,
            password,
        }),
        _ => Err(UserError::validation("Name, email and password are required")),
    }
}

/// Partial-mode validation for updates.
pub fn validate_user_changes(data: &Value) -> UserResult<UserChanges> {
    validate_user_data(data, ValidationMode::Partial)
}

/// Validate a login payload: both fields required, email well-formed.
pub fn validate_login_data(data: &Value) -> UserResult<LoginCredentials> {
    let fields = clean_fields(data)?;
    let mut errors: Vec<String> = Vec::new();
    let mut email = None;
    let mut password = None;

    match fields.get("email").map(|v| field_text(v, "Email")) {
        None | Some(Ok("")) => errors.push("Email is required".into()),
        Some(Ok(e)) if is_valid_email(e) => email = Some(normalize_email(e)),
        Some(Ok(_)) => errors.push("Invalid email format".into()),
        Some(Err(msg)) => errors.push(msg),
    }

    match fields.get("password").map(|v| field_text(v, "Password")) {
        None | Some(Ok("")) => errors.push("Password is required".into()),
        Some(Ok(p)) => password = Some(p.to_string()),
        Some(Err(msg)) => errors.push(msg),
    }

    if let Some(msg) = unexpected_fields(&fields, &LOGIN_FIELDS) {
        errors.push(msg);
    }

    match (email, password) {
        (Some(email), Some(password)) if errors.is_empty() => {
            Ok(LoginCredentials { email, password })
        }
        _ => Err(UserError::Validation(errors.join("; "))),
    }
}

/// Trim keys and string values; reject bodies that carry nothing.
fn clean_fields(data: &Value) -> UserResult<Map<String, Value>> {
    match data {
        Value::Object(map) if !map.is_empty() => Ok(map
            .iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => Value::String(s.trim().to_string()),
                    other => other.clone(),
                };
                (k.trim().to_string(), v)
            })
            .collect()),
        Value::Object(_) | Value::Null => Err(UserError::validation("No data provided")),
        _ => Err(UserError::validation("Request body must be a JSON object")),
    }
}

/// `null` reads as empty so presence checks report it as missing.
fn field_text<'a>(value: &'a Value, label: &str) -> Result<&'a str, String> {
    match value {
        Value::String(s) => Ok(s.as_str()),
        Value::Null => Ok(""),
        _ => Err(format!("{label} must be a string")),
    }
}

fn unexpected_fields(fields: &Map<String, Value>, allowed: &[&str]) -> Option<String> {
    let mut extra: Vec<&str> = fields
        .keys()
        .map(String::as_str)
        .filter(|k| !allowed.contains(k))
        .collect();
    if extra.is_empty() {
        return None;
    }
    extra.sort_unstable();
    Some(format!("Unexpected fields: {}", extra.join(", ")))
}

fn finish<T>(errors: Vec<String>, value: T) -> UserResult<T> {
    if errors.is_empty() {
        Ok(value)
    } else {
        Err(UserError::Validation(errors.join("; ")))
    }
}
