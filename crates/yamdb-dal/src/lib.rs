#[macro_use]
mod macros;

pub mod category;
pub mod comment;
pub mod error;
pub mod genre;
pub mod import;
pub mod review;
pub mod title;
pub mod user;

use std::{fmt::Display, str::FromStr, time::Duration};

pub use error::Error;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::Result;

pub type ChosenDB = sqlx::Sqlite;
pub type Pool = sqlx::Pool<ChosenDB>;

pub const MAX_LIMIT: usize = 10_000;

pub async fn new_pool(database_url: &str) -> Result<Pool, Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));
    let pool = SqlitePoolOptions::new()
        .max_connections(50)
        .connect_with(options)
        .await?;
    Ok(pool)
}

pub async fn migrate(pool: &Pool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

#[derive(Debug, Clone)]
pub enum Order {
    Asc(String),
    Desc(String),
}

impl Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Order::Asc(s) => write!(f, "{}", s),
            Order::Desc(s) => write!(f, "{} DESC", s),
        }
    }
}

impl AsRef<str> for Order {
    fn as_ref(&self) -> &str {
        match self {
            Order::Asc(s) => s.as_str(),
            Order::Desc(s) => s.as_str(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListingParams {
    pub offset: i64,
    pub limit: i64,
    pub order: Option<Vec<Order>>,
}

impl Default for ListingParams {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: MAX_LIMIT as i64,
            order: None,
        }
    }
}

impl ListingParams {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self {
            offset,
            limit,
            order: None,
        }
    }
    pub fn with_order(mut self, order: Vec<Order>) -> Self {
        self.order = Some(order);
        self
    }

    pub fn ordering(&self, valid_fields: &[&str]) -> Result<String> {
        let ordering = self
            .order
            .as_ref()
            .map(|o| {
                o.iter()
                    .map(|o| {
                        if valid_fields.contains(&o.as_ref()) {
                            Ok(o.to_string())
                        } else {
                            Err(Error::InvalidOrderByField(o.as_ref().to_string()))
                        }
                    })
                    .collect::<Result<Vec<String>>>()
                    .map(|o| o.join(", "))
            })
            .transpose()?
            .unwrap_or_default();
        Ok(ordering)
    }

    /// Full `ORDER BY` clause, `default` is used when no ordering was requested
    pub fn order_by(&self, valid_fields: &[&str], default: &str) -> Result<String> {
        let ordering = self.ordering(valid_fields)?;
        if ordering.is_empty() {
            Ok(format!("ORDER BY {default}"))
        } else {
            Ok(format!("ORDER BY {ordering}"))
        }
    }
}

/// One page of records together with the total count of matching records
#[derive(Debug)]
pub struct Batch<T> {
    pub offset: i64,
    pub limit: i64,
    pub rows: Vec<T>,
    pub total: u64,
}

pub(crate) fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        let params = ListingParams::new(0, 10).with_order(vec![
            Order::Desc("year".into()),
            Order::Asc("name".into()),
        ]);
        assert_eq!(
            params.order_by(&["name", "year"], "id").unwrap(),
            "ORDER BY year DESC, name"
        );
        assert_eq!(
            ListingParams::default().order_by(&["name"], "name").unwrap(),
            "ORDER BY name"
        );
        let params = ListingParams::new(0, 10).with_order(vec![Order::Asc("1; DROP".into())]);
        assert!(matches!(
            params.ordering(&["name"]),
            Err(Error::InvalidOrderByField(_))
        ));
    }

    #[test]
    fn test_like_pattern() {
        assert_eq!(like_pattern("ab"), "%ab%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
    }
}
