//! Access rules for the API resources.
//!
//! Access is decided in two steps. The endpoint step looks only at the
//! [`Scope`] of the endpoint and the [`Action`]: reads of public scopes are
//! open to everybody, anything else needs an authenticated principal whose
//! role is in the scope's role set (superuser always passes). The object step
//! applies to update/delete of owned objects (reviews, comments): the
//! principal must be the author, a moderator/admin or a superuser.

use crate::claim::{Authorization as _, Principal, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn is_safe(&self) -> bool {
        matches!(self, Action::Read)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Categories,
    Genres,
    Titles,
    Reviews,
    Comments,
    Users,
    OwnAccount,
}

const ADMIN_ONLY: &[Role] = &[Role::Admin];
const ANY_ROLE: &[Role] = &[Role::User, Role::Moderator, Role::Admin];
const OBJECT_MODERATORS: &[Role] = &[Role::Moderator, Role::Admin];

impl Scope {
    /// Roles permitted to call mutating endpoints of this scope
    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            Scope::Categories | Scope::Genres | Scope::Titles | Scope::Users => ADMIN_ONLY,
            Scope::Reviews | Scope::Comments | Scope::OwnAccount => ANY_ROLE,
        }
    }

    pub fn public_read(&self) -> bool {
        !matches!(self, Scope::Users | Scope::OwnAccount)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Endpoint level - collection or object of the scope, without ownership
    Endpoint(Scope),
    /// Concrete object with an author
    Owned { scope: Scope, author_id: i64 },
}

impl Resource {
    fn scope(&self) -> Scope {
        match self {
            Resource::Endpoint(scope) => *scope,
            Resource::Owned { scope, .. } => *scope,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Denied {
    #[error("Authentication credentials were not provided.")]
    AuthenticationRequired,
    #[error("You do not have sufficient rights for this action.")]
    InsufficientRights,
}

fn endpoint_allows(principal: &Principal, scope: Scope) -> bool {
    principal.is_superuser() || principal.has_any_role(scope.allowed_roles().iter().copied())
}

fn object_allows(principal: &Principal, author_id: i64) -> bool {
    principal.id == author_id
        || principal.is_superuser()
        || principal.has_any_role(OBJECT_MODERATORS.iter().copied())
}

/// Same as [`authorize`], but tells why access was denied
pub fn check(
    principal: Option<&Principal>,
    action: Action,
    resource: &Resource,
) -> Result<(), Denied> {
    let scope = resource.scope();
    if action.is_safe() && scope.public_read() {
        return Ok(());
    }
    let principal = principal.ok_or(Denied::AuthenticationRequired)?;
    if !endpoint_allows(principal, scope) {
        return Err(Denied::InsufficientRights);
    }
    match resource {
        Resource::Owned { author_id, .. }
            if matches!(action, Action::Update | Action::Delete) =>
        {
            if object_allows(principal, *author_id) {
                Ok(())
            } else {
                Err(Denied::InsufficientRights)
            }
        }
        _ => Ok(()),
    }
}

pub fn authorize(principal: Option<&Principal>, action: Action, resource: &Resource) -> bool {
    check(principal, action, resource).is_ok()
}
