use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::Entity;
use super::errors::UserError;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

/// Lowercased, trimmed email address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str) -> Result<Self, UserError> {
        let email = raw.trim().to_lowercase();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(Self(email)),
            _ => Err(UserError::InvalidEmail(raw.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub version: i64,
    pub name: String,
    pub email: Email,
    pub password_hash: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What the API returns for a user; never includes the credential hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: &str, email: Email, password_hash: String, role: Role) -> Result<Self, UserError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(UserError::EmptyName);
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            version: 0,
            name: name.to_string(),
            email,
            password_hash,
            role,
            active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name.clone(),
            email: self.email.as_str().to_string(),
            role: self.role,
            active: self.active,
            created_at: self.created_at,
        }
    }

    pub fn rename(&mut self, name: &str) -> Result<(), UserError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(UserError::EmptyName);
        }
        self.name = name.to_string();
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Admin change of role or active flag. Admins may not demote or deactivate themselves.
    pub fn administer(
        &mut self,
        acting_admin: Uuid,
        role: Option<Role>,
        active: Option<bool>,
    ) -> Result<(), UserError> {
        let demotes = role.is_some_and(|r| r != Role::Admin) && self.is_admin();
        let deactivates = active == Some(false);
        if self.id == acting_admin && (demotes || deactivates) {
            return Err(UserError::SelfModification);
        }

        if let Some(role) = role {
            self.role = role;
        }
        if let Some(active) = active {
            self.active = active;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

pub fn validate_password(password: &str) -> Result<(), UserError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(UserError::WeakPassword(MIN_PASSWORD_LEN));
    }
    Ok(())
}

impl Entity for User {
    const COLLECTION: &'static str = "users";

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

    fn user(role: Role) -> User {
        User::new("Ada", Email::parse("ada@example.com").unwrap(), "hash".into(), role).unwrap()
    }

    #[test]
    fn email_is_normalized() {
        let email = Email::parse("  Ada@Example.COM ").unwrap();
        assert_eq!(email.as_str(), "ada@example.com");
    }

    #[test]
    fn malformed_emails_rejected() {
        for raw in ["", "ada", "@example.com", "ada@localhost"] {
            assert!(Email::parse(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn public_view_hides_hash() {
        let json = serde_json::to_value(user(Role::User).public()).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["role"], "user");
    }

    #[test]
    fn password_length_enforced() {
        assert_eq!(validate_password("short"), Err(UserError::WeakPassword(MIN_PASSWORD_LEN)));
        assert!(validate_password("long enough").is_ok());
    }

    #[test]
    fn admin_cannot_lock_themselves_out() {
        let mut admin = user(Role::Admin);
        let id = admin.id;

        assert_eq!(
            admin.administer(id, Some(Role::User), None),
            Err(UserError::SelfModification)
        );
        assert_eq!(admin.administer(id, None, Some(false)), Err(UserError::SelfModification));
        assert!(admin.is_admin());
        assert!(admin.active);
    }

    #[test]
    fn admin_can_promote_and_deactivate_others() {
        let admin = user(Role::Admin);
        let mut other = user(Role::User);

        other.administer(admin.id, Some(Role::Admin), Some(false)).unwrap();
        assert!(other.is_admin());
        assert!(!other.active);
    }
}
