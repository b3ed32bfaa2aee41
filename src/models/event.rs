use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::error::AppError;

pub const TITLE_MAX_LEN: usize = 255;
pub const LOCATION_MAX_LEN: usize = 255;
pub const DESCRIPTION_MAX_LEN: usize = 1000;

/// An event as stored and served over the wire. `organizer` and
/// `time_created` are server-assigned; client input never carries them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub date: DateTime<Utc>,
    pub organizer: Uuid,
    pub invited_users: Vec<Uuid>,
    pub time_created: DateTime<Utc>,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.id, self.title, self.date)
    }
}

/// Body of POST and PUT requests. Unknown fields (including any
/// client-supplied `organizer` or `time_created`) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct EventPayload {
    pub title: String,
    pub description: String,
    pub location: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub invited_users: Vec<Uuid>,
}

/// Body of PATCH requests; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub invited_users: Option<Vec<Uuid>>,
}

impl EventPayload {
    /// Runs before any write and blocks it entirely on failure.
    pub fn validate(&self, organizer: Uuid) -> Result<(), AppError> {
        check_text("title", &self.title, TITLE_MAX_LEN)?;
        check_text("description", &self.description, DESCRIPTION_MAX_LEN)?;
        check_text("location", &self.location, LOCATION_MAX_LEN)?;
        check_invited_users(&self.invited_users, organizer)
    }
}

impl EventPatch {
    pub fn validate(&self, organizer: Uuid) -> Result<(), AppError> {
        if let Some(title) = &self.title {
            check_text("title", title, TITLE_MAX_LEN)?;
        }
        if let Some(description) = &self.description {
            check_text("description", description, DESCRIPTION_MAX_LEN)?;
        }
        if let Some(location) = &self.location {
            check_text("location", location, LOCATION_MAX_LEN)?;
        }
        if let Some(invited) = &self.invited_users {
            check_invited_users(invited, organizer)?;
        }
        Ok(())
    }
}

fn check_invited_users(invited: &[Uuid], organizer: Uuid) -> Result<(), AppError> {
    if invited.contains(&organizer) {
        return Err(AppError::field(
            "invited_users",
            "You cannot invite yourself to your event!",
        ));
    }
    Ok(())
}

fn check_text(field: &'static str, value: &str, max_len: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::field(field, "must not be blank"));
    }
    if value.chars().count() > max_len {
        return Err(AppError::field(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }
    Ok(())
}
