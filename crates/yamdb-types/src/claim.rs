use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Hash, PartialEq, Eq, Serialize, Deserialize, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            other => Err(ValidationError::UnknownRole(other.to_string())),
        }
    }
}

pub trait Authorization {
    fn has_role(&self, role: Role) -> bool;

    fn is_superuser(&self) -> bool {
        false
    }

    fn has_any_role<I>(&self, roles: I) -> bool
    where
        I: IntoIterator<Item = Role>,
    {
        roles.into_iter().any(|role| self.has_role(role))
    }
}

/// Authenticated user acting in the request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub is_superuser: bool,
}

impl Authorization for Principal {
    fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    fn is_superuser(&self) -> bool {
        self.is_superuser
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role() {
        let role: Role = "moderator".parse().unwrap();
        assert_eq!(role, Role::Moderator);
        assert_eq!(role.as_ref(), "moderator");
        assert!("superuser".parse::<Role>().is_err());
        assert_eq!(Role::default(), Role::User);

        let principal = Principal {
            id: 1,
            username: "ivan".into(),
            role,
            is_superuser: false,
        };
        assert!(principal.has_role(Role::Moderator));
        assert!(!principal.has_role(Role::Admin));
        assert!(principal.has_any_role([Role::Admin, Role::Moderator]));
        assert!(!principal.has_any_role([Role::Admin]));
    }
}
