use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::Entity;
use super::user::{Email, UserError};

/// Message submitted through the public contact form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    pub id: Uuid,
    pub version: i64,
    pub name: String,
    pub email: Email,
    pub subject: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ContactError {
    #[error("Name and message are required")]
    MissingFields,

    #[error(transparent)]
    Email(#[from] UserError),
}

impl ContactMessage {
    pub fn new(name: &str, email: &str, subject: Option<&str>, message: &str) -> Result<Self, ContactError> {
        if name.trim().is_empty() || message.trim().is_empty() {
            return Err(ContactError::MissingFields);
        }

        Ok(Self {
            id: Uuid::new_v4(),
            version: 0,
            name: name.trim().to_string(),
            email: Email::parse(email)?,
            subject: subject
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or("General enquiry")
                .to_string(),
            message: message.trim().to_string(),
            created_at: Utc::now(),
        })
    }
}

impl Entity for ContactMessage {
    const COLLECTION: &'static str = "contact_messages";

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_subject() {
        let msg = ContactMessage::new("Bo", "bo@example.com", Some("  "), "Hello").unwrap();
        assert_eq!(msg.subject, "General enquiry");
    }

    #[test]
    fn requires_name_message_and_valid_email() {
        assert_eq!(
            ContactMessage::new("", "bo@example.com", None, "hi").unwrap_err(),
            ContactError::MissingFields
        );
        assert!(matches!(
            ContactMessage::new("Bo", "nope", None, "hi"),
            Err(ContactError::Email(UserError::InvalidEmail(_)))
        ));
    }
}
