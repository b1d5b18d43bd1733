use std::future::Future;

use argon2::{
    password_hash::{rand_core::OsRng, Result as HashResult, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use futures::{StreamExt as _, TryStreamExt as _};
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Acquire, Executor};
use time::OffsetDateTime;
use tracing::{debug, error};
use yamdb_types::{
    claim::{Principal, Role},
    general::{ValidEmail, ValidUsername},
};

use crate::{
    error::{on_unique_violation, Error, Result},
    Batch, ChosenDB, ListingParams,
};

const VALID_ORDER_FIELDS: &[&str] = &["id", "username", "email", "role"];

const USER_SELECT: &str = "SELECT id, username, email, first_name, last_name, bio, role, is_superuser FROM users";

fn hash_code(code: &str) -> HashResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let code_hash = argon2.hash_password(code.as_bytes(), &salt)?.to_string();
    Ok(code_hash)
}

fn verify_code(code: &str, code_hash: &str) -> HashResult<bool> {
    let parsed_hash = PasswordHash::new(code_hash)?;
    let res = Argon2::default().verify_password(code.as_bytes(), &parsed_hash);
    if let Err(e) = res {
        debug!("Invalid confirmation code, error {e}");
    }
    Ok(res.is_ok())
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserInt {
    id: i64,
    username: String,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    bio: Option<String>,
    role: String,
    is_superuser: bool,
}

#[derive(Debug, Serialize, Clone)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct User {
    #[serde(skip)]
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub role: Role,
    #[serde(skip)]
    pub is_superuser: bool,
}

impl TryFrom<UserInt> for User {
    type Error = Error;

    fn try_from(value: UserInt) -> Result<Self> {
        Ok(Self {
            id: value.id,
            username: value.username,
            email: value.email,
            first_name: value.first_name,
            last_name: value.last_name,
            bio: value.bio,
            role: value.role.parse()?,
            is_superuser: value.is_superuser,
        })
    }
}

impl User {
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id,
            username: self.username.clone(),
            role: self.role,
            is_superuser: self.is_superuser,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateUser {
    #[garde(dive)]
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub username: ValidUsername,
    #[garde(dive)]
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub email: ValidEmail,
    #[garde(length(max = 150))]
    pub first_name: Option<String>,
    #[garde(length(max = 150))]
    pub last_name: Option<String>,
    #[garde(length(max = 256))]
    pub bio: Option<String>,
    #[serde(default)]
    #[garde(skip)]
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateUser {
    #[garde(dive)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub username: Option<ValidUsername>,
    #[garde(dive)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub email: Option<ValidEmail>,
    #[garde(length(max = 150))]
    pub first_name: Option<String>,
    #[garde(length(max = 150))]
    pub last_name: Option<String>,
    #[garde(length(max = 256))]
    pub bio: Option<String>,
    #[garde(skip)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub role: Option<Role>,
}

/// Self registration request
#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SignupUser {
    #[garde(dive)]
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub email: ValidEmail,
    #[garde(dive)]
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub username: ValidUsername,
}

async fn get<'c, E>(id: i64, executor: E) -> Result<User>
where
    E: Executor<'c, Database = ChosenDB>,
{
    sqlx::query_as::<_, UserInt>(&format!("{USER_SELECT} WHERE id = ?"))
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| Error::RecordNotFound("User".to_string()))?
        .try_into()
}

async fn check_unique<'c, E>(
    username: Option<&str>,
    email: Option<&str>,
    exclude_id: Option<i64>,
    executor: E,
) -> Result<()>
where
    E: Executor<'c, Database = ChosenDB>,
{
    let (same_username, same_email): (i64, i64) = sqlx::query_as(
        r#"SELECT
        COALESCE(SUM(CASE WHEN username = ? THEN 1 ELSE 0 END), 0),
        COALESCE(SUM(CASE WHEN email = ? THEN 1 ELSE 0 END), 0)
        FROM users WHERE (? IS NULL OR id != ?)"#,
    )
    .bind(username)
    .bind(email)
    .bind(exclude_id)
    .bind(exclude_id)
    .fetch_one(executor)
    .await?;

    if same_username > 0 {
        Err(Error::Duplicate(
            "A user with that username already exists".to_string(),
        ))
    } else if same_email > 0 {
        Err(Error::Duplicate(
            "A user with that email already exists".to_string(),
        ))
    } else {
        Ok(())
    }
}

fn duplicate_user() -> Error {
    Error::Duplicate("A user with that username or email already exists".to_string())
}

pub type UserRepository = UserRepositoryImpl<sqlx::Pool<ChosenDB>>;

pub struct UserRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> UserRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateUser) -> Result<User> {
        check_unique(
            Some(payload.username.as_ref()),
            Some(payload.email.as_ref()),
            None,
            &self.executor,
        )
        .await?;
        let result = sqlx::query(
            r#"INSERT INTO users (username, email, first_name, last_name, bio, role, date_joined)
            VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(payload.username.as_ref())
        .bind(payload.email.as_ref())
        .bind(&payload.first_name)
        .bind(&payload.last_name)
        .bind(&payload.bio)
        .bind(payload.role.as_str())
        .bind(OffsetDateTime::now_utc())
        .execute(&self.executor)
        .await
        .map_err(|e| on_unique_violation(e, duplicate_user))?;

        let id = result.last_insert_rowid();
        self.get(id).await
    }

    /// Superuser flag is never changed through the API
    pub async fn set_superuser(&self, id: i64, is_superuser: bool) -> Result<User> {
        let res = sqlx::query("UPDATE users SET is_superuser = ? WHERE id = ?")
            .bind(is_superuser)
            .bind(id)
            .execute(&self.executor)
            .await?;
        if res.rows_affected() == 0 {
            return Err(Error::RecordNotFound("User".to_string()));
        }
        self.get(id).await
    }

    pub async fn get(&self, id: i64) -> Result<User> {
        get(id, &self.executor).await
    }

    pub async fn get_by_username(&self, username: &str) -> Result<User> {
        sqlx::query_as::<_, UserInt>(&format!("{USER_SELECT} WHERE username = ?"))
            .bind(username)
            .fetch_optional(&self.executor)
            .await?
            .ok_or_else(|| Error::RecordNotFound("User".to_string()))?
            .try_into()
    }

    /// Current identity and privileges of the user, `None` if the user does not exist anymore
    pub async fn principal(&self, id: i64) -> Result<Option<Principal>> {
        match get(id, &self.executor).await {
            Ok(user) => Ok(Some(user.principal())),
            Err(Error::RecordNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn count(&self, search: Option<&str>) -> Result<u64> {
        let pattern = search.map(crate::like_pattern);
        let count: u64 = sqlx::query_scalar(
            r"SELECT count(*) FROM users WHERE (? IS NULL OR username LIKE ? ESCAPE '\')",
        )
        .bind(&pattern)
        .bind(&pattern)
        .fetch_one(&self.executor)
        .await?;
        Ok(count)
    }

    pub async fn list(&self, params: ListingParams, search: Option<&str>) -> Result<Batch<User>> {
        let order = params.order_by(VALID_ORDER_FIELDS, "username")?;
        let pattern = search.map(crate::like_pattern);
        let sql = format!(
            r"{USER_SELECT} WHERE (? IS NULL OR username LIKE ? ESCAPE '\') {order} LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query_as::<_, UserInt>(&sql)
            .bind(&pattern)
            .bind(&pattern)
            .bind(params.limit)
            .bind(params.offset)
            .fetch(&self.executor)
            .take(crate::MAX_LIMIT)
            .map(|r| r.map_err(Error::from).and_then(User::try_from))
            .try_collect::<Vec<_>>()
            .await?;
        let total = self.count(search).await?;

        Ok(Batch {
            offset: params.offset,
            limit: params.limit,
            rows,
            total,
        })
    }

    pub async fn update(&self, id: i64, payload: UpdateUser) -> Result<User> {
        check_unique(
            payload.username.as_ref().map(|u| u.as_ref()),
            payload.email.as_ref().map(|e| e.as_ref()),
            Some(id),
            &self.executor,
        )
        .await?;
        let result = sqlx::query(
            r#"UPDATE users SET username = COALESCE(?, username), email = COALESCE(?, email),
            first_name = COALESCE(?, first_name), last_name = COALESCE(?, last_name),
            bio = COALESCE(?, bio), role = COALESCE(?, role)
            WHERE id = ?"#,
        )
        .bind(payload.username.as_ref().map(|u| u.as_ref()))
        .bind(payload.email.as_ref().map(|e| e.as_ref()))
        .bind(&payload.first_name)
        .bind(&payload.last_name)
        .bind(&payload.bio)
        .bind(payload.role.map(|r| r.as_str()))
        .bind(id)
        .execute(&self.executor)
        .await
        .map_err(|e| on_unique_violation(e, duplicate_user))?;

        if result.rows_affected() == 0 {
            Err(Error::RecordNotFound("User".to_string()))
        } else {
            self.get(id).await
        }
    }

    pub async fn delete_by_username(&self, username: &str) -> Result<()> {
        let res = sqlx::query("DELETE FROM users WHERE username = ?")
            .bind(username)
            .execute(&self.executor)
            .await?;

        if res.rows_affected() == 0 {
            Err(Error::RecordNotFound("User".to_string()))
        } else {
            Ok(())
        }
    }

    /// Stores hash of a new confirmation code for the user, replacing any previous one
    pub async fn issue_code(&self, user_id: i64, code: &str) -> Result<()> {
        store_code(user_id, code, &self.executor).await.map(|_| ())
    }

    /// Returns the stored code if `code` matches it
    pub async fn check_code(&self, user_id: i64, code: &str) -> Result<Option<StoredCode>> {
        let stored: Option<StoredCode> =
            sqlx::query_as("SELECT code_hash, created FROM confirmation_code WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.executor)
                .await?;
        match stored {
            Some(stored) if verify_code(code, &stored.code_hash)? => Ok(Some(stored)),
            Some(_) => Ok(None),
            None => {
                debug!("No confirmation code for user {user_id}");
                Ok(None)
            }
        }
    }

    /// Removes the checked code. Returns false if it was consumed or replaced meanwhile.
    pub async fn consume_code(&self, user_id: i64, stored: &StoredCode) -> Result<bool> {
        let res = sqlx::query("DELETE FROM confirmation_code WHERE user_id = ? AND code_hash = ?")
            .bind(user_id)
            .bind(&stored.code_hash)
            .execute(&self.executor)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn revoke_registration(&self, registration: &Registration) -> Result<()> {
        match registration {
            Registration::Created { user_id } => {
                sqlx::query("DELETE FROM users WHERE id = ?")
                    .bind(user_id)
                    .execute(&self.executor)
                    .await?;
            }
            Registration::Reissued { user_id, code_hash } => {
                sqlx::query("DELETE FROM confirmation_code WHERE user_id = ? AND code_hash = ?")
                    .bind(user_id)
                    .bind(code_hash)
                    .execute(&self.executor)
                    .await?;
            }
        }
        Ok(())
    }
}

/// Confirmation code as stored, `created` in unix seconds
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredCode {
    code_hash: String,
    pub created: i64,
}

#[derive(Debug)]
enum Registration {
    Created { user_id: i64 },
    Reissued { user_id: i64, code_hash: String },
}

impl Registration {
    fn user_id(&self) -> i64 {
        match self {
            Registration::Created { user_id } | Registration::Reissued { user_id, .. } => *user_id,
        }
    }
}

async fn store_code<'c, E>(user_id: i64, code: &str, executor: E) -> Result<String>
where
    E: Executor<'c, Database = ChosenDB>,
{
    let code_hash = hash_code(code)?;
    sqlx::query(
        r#"INSERT INTO confirmation_code (user_id, code_hash, created) VALUES (?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET code_hash = excluded.code_hash, created = excluded.created"#,
    )
    .bind(user_id)
    .bind(&code_hash)
    .bind(OffsetDateTime::now_utc().unix_timestamp())
    .execute(executor)
    .await?;
    Ok(code_hash)
}

impl<'c, E> UserRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB> + Acquire<'c, Database = ChosenDB>,
{
    /// Registers the user (or reuses an existing one with the same username and email)
    /// and issues a new confirmation code, then hands the user to `deliver`.
    ///
    /// The database is not locked while `deliver` runs. If delivery fails, the new user
    /// or the re-issued code is removed again.
    pub async fn register<F, Fut, X>(&self, payload: SignupUser, code: &str, deliver: F) -> Result<User>
    where
        F: FnOnce(User) -> Fut,
        Fut: Future<Output = std::result::Result<(), X>>,
        X: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let registration = self.store_registration(&payload, code).await?;
        let user = self.get(registration.user_id()).await?;
        if let Err(e) = deliver(user.clone()).await {
            let cause = Error::DeliveryFailed(e.into());
            if let Err(cleanup) = self.revoke_registration(&registration).await {
                error!("Cannot revoke registration of {}: {cleanup}", user.username);
            }
            return Err(cause);
        }
        Ok(user)
    }

    async fn store_registration(&self, payload: &SignupUser, code: &str) -> Result<Registration> {
        let mut tx = self.executor.begin().await?;
        let existing: Option<(i64, String)> =
            sqlx::query_as("SELECT id, email FROM users WHERE username = ?")
                .bind(payload.username.as_ref())
                .fetch_optional(&mut *tx)
                .await?;

        let registration = match existing {
            Some((user_id, email)) if email == payload.email.as_ref() => {
                debug!("Re-issuing confirmation code for user {user_id}");
                let code_hash = store_code(user_id, code, &mut *tx).await?;
                Registration::Reissued { user_id, code_hash }
            }
            Some(_) => {
                return Err(Error::Duplicate(
                    "A user with that username already exists".to_string(),
                ))
            }
            None => {
                check_unique(None, Some(payload.email.as_ref()), None, &mut *tx).await?;
                let user_id = sqlx::query(
                    "INSERT INTO users (username, email, role, date_joined) VALUES (?, ?, ?, ?)",
                )
                .bind(payload.username.as_ref())
                .bind(payload.email.as_ref())
                .bind(Role::User.as_str())
                .bind(OffsetDateTime::now_utc())
                .execute(&mut *tx)
                .await
                .map_err(|e| on_unique_violation(e, duplicate_user))?
                .last_insert_rowid();
                store_code(user_id, code, &mut *tx).await?;
                Registration::Created { user_id }
            }
        };
        tx.commit().await?;
        Ok(registration)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use super::*;

    #[test]
    fn test_code_hash() {
        let hash = hash_code("c0de").unwrap();
        assert!(verify_code("c0de", &hash).unwrap());
        assert!(!verify_code("other", &hash).unwrap());
    }

    #[test]
    fn test_signup_validation() {
        let signup = SignupUser {
            email: ValidEmail::from_str("ivan@example.com").unwrap(),
            username: ValidUsername::from_str("ivan").unwrap(),
        };
        assert!(signup.validate().is_ok());

        let res: std::result::Result<SignupUser, _> =
            serde_json::from_str(r#"{"email": "ivan@example.com", "username": "Me"}"#);
        let signup = res.unwrap();
        assert!(signup.validate().is_err());
    }
}
