use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::FieldError;
use crate::users::repo_types::User;

pub const MIN_PASSWORD_LEN: usize = 8;

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Lowercases the domain only; the local part is case-sensitive.
fn normalize_email(email: &str) -> String {
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => email.to_string(),
    }
}

/// Request body for user creation, as received.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Checked and normalized creation input.
#[derive(Debug)]
pub struct NewUserInput {
    pub email: String,
    pub password: String,
    pub is_active: bool,
}

impl CreateUserRequest {
    /// Reports every failing field, not just the first.
    pub fn validate(self) -> Result<NewUserInput, Vec<FieldError>> {
        let email = normalize_email(self.email.trim());
        let mut errors = Vec::new();

        if !is_valid_email(&email) {
            errors.push(FieldError::new("email", "value is not a valid email address"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            errors.push(FieldError::new(
                "password",
                format!("password must be at least {MIN_PASSWORD_LEN} characters"),
            ));
        }

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(NewUserInput {
            email,
            password: self.password,
            is_active: self.is_active,
        })
    }
}

/// Public part of the user returned to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub is_active: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            is_active: user.is_active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    100
}
