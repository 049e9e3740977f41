//! Logged-in user context.
//!
//! A [`Session`] is created once at login and handed to every pipeline
//! explicitly. Nothing reads the current user from ambient storage.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct Session {
    /// Random id used to correlate log lines of one login.
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(email: impl Into<String>, username: Option<String>) -> Result<Self> {
        let email = email.into();
        let trimmed = email.trim();
        if trimmed.is_empty() || !trimmed.contains('@') {
            bail!("'{}' is not a valid email address", email);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            email: trimmed.to_string(),
            username,
            started_at: Utc::now(),
        })
    }

    /// Build the session from an explicit email, falling back to `[session]`.
    pub fn resolve(config: &Config, email_override: Option<&str>) -> Result<Self> {
        match (email_override, &config.session) {
            (Some(email), session) => Self::new(
                email,
                session.as_ref().and_then(|s| s.username.clone()),
            ),
            (None, Some(session)) => Self::new(session.email.clone(), session.username.clone()),
            (None, None) => bail!("no user email: pass --email or set [session].email in the config"),
        }
    }

    /// Name to greet the user with.
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.email)
    }
}
