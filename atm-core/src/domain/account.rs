//! Account domain model

use std::fmt;

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of a public identifier
pub const PUBLIC_ID_LEN: usize = 10;

/// Maximum username length, matching the `VARCHAR(150)` column
pub const MAX_USERNAME_LEN: usize = 150;

/// Public identifier used to address an account for transfers
///
/// Distinct from the internal account id. Ten ASCII letters or digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicId(String);

impl PublicId {
    /// Generate a new random identifier
    pub fn generate() -> Self {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(PUBLIC_ID_LEN)
            .map(char::from)
            .collect();
        Self(token)
    }

    /// Parse a user-supplied identifier, rejecting anything that could never
    /// have been generated
    pub fn parse(s: &str) -> Result<Self, &'static str> {
        let s = s.trim();
        if s.len() != PUBLIC_ID_LEN {
            return Err("public identifier must be 10 characters");
        }
        if !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err("public identifier must be letters and digits only");
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PublicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered user's account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    /// Argon2id hash in PHC string format, never serialized
    #[serde(skip)]
    pub credential: String,
    pub balance: Decimal,
    pub public_id: PublicId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with a zero balance
    pub fn new(username: impl Into<String>, credential: impl Into<String>, public_id: PublicId) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            credential: credential.into(),
            balance: Decimal::ZERO,
            public_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Normalize a username for storage and lookup
    pub fn normalize_username(username: &str) -> Result<String, &'static str> {
        let trimmed = username.trim();
        if trimmed.is_empty() {
            return Err("username cannot be empty");
        }
        if trimmed.chars().count() > MAX_USERNAME_LEN {
            return Err("username cannot be longer than 150 characters");
        }
        if trimmed.chars().any(char::is_control) {
            return Err("username cannot contain control characters");
        }
        Ok(trimmed.to_string())
    }
}
