//! Bulk load of CSV exports.
//!
//! Files are processed in a fixed order so that every referenced record already exists
//! when a dependent record is inserted. The whole load runs in a single transaction,
//! any failure leaves the database untouched.

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize};
use sqlx::SqliteConnection;
use time::{macros::format_description, OffsetDateTime, PrimitiveDateTime};
use tracing::{debug, info};
use yamdb_types::claim::Role;

use crate::{
    error::{Error, Result},
    Pool,
};

pub const GENRE_FILE: &str = "genre.csv";
pub const CATEGORY_FILE: &str = "category.csv";
pub const TITLE_FILE: &str = "titles.csv";
pub const GENRE_TITLE_FILE: &str = "genre_title.csv";
pub const USER_FILE: &str = "users.csv";
pub const REVIEW_FILE: &str = "review.csv";
pub const COMMENT_FILE: &str = "comments.csv";

#[derive(Debug, Deserialize)]
struct SlugRecord {
    id: i64,
    name: String,
    slug: String,
}

#[derive(Debug, Deserialize)]
struct TitleRecord {
    id: i64,
    name: String,
    year: i32,
    description: Option<String>,
    #[serde(rename = "category")]
    category_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct GenreTitleRecord {
    title_id: i64,
    genre_id: i64,
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    id: i64,
    username: String,
    email: String,
    role: Option<String>,
    bio: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReviewRecord {
    id: i64,
    title_id: i64,
    text: String,
    #[serde(rename = "author")]
    author_id: i64,
    score: i64,
    pub_date: String,
}

#[derive(Debug, Deserialize)]
struct CommentRecord {
    id: i64,
    review_id: i64,
    text: String,
    #[serde(rename = "author")]
    author_id: i64,
    pub_date: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportStats {
    pub genres: usize,
    pub categories: usize,
    pub titles: usize,
    pub genre_links: usize,
    pub users: usize,
    pub reviews: usize,
    pub comments: usize,
}

/// Parses timestamps like `2019-09-24T21:08:21.567Z`, always UTC
pub fn parse_pub_date(value: &str) -> Result<OffsetDateTime> {
    let format = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]Z");
    PrimitiveDateTime::parse(value, format)
        .map(|dt| dt.assume_utc())
        .map_err(|source| Error::InvalidTimestamp {
            value: value.to_string(),
            source,
        })
}

fn parse_role(role: Option<&str>) -> Result<Role> {
    match role.map(str::trim) {
        None | Some("") => Ok(Role::default()),
        Some(role) => Ok(role.parse()?),
    }
}

pub struct CsvLoader {
    dir: PathBuf,
}

impl CsvLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read<T>(&self, file: &'static str) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let path = self.dir.join(file);
        debug!("Reading {path:?}");
        tokio::task::spawn_blocking(move || {
            let csv_error = |source| Error::CsvError {
                file: file.to_string(),
                source,
            };
            let mut reader = csv::Reader::from_path(&path).map_err(csv_error)?;
            reader
                .deserialize()
                .collect::<std::result::Result<Vec<T>, csv::Error>>()
                .map_err(csv_error)
        })
        .await
        .map_err(|e| Error::ImportError(format!("Reading {file} failed: {e}")))?
    }

    pub async fn load(&self, pool: &Pool) -> Result<ImportStats> {
        let mut tx = pool.begin().await?;
        let mut stats = ImportStats::default();

        stats.genres = self.load_slugs(GENRE_FILE, "genre", &mut tx).await?;
        stats.categories = self.load_slugs(CATEGORY_FILE, "category", &mut tx).await?;
        stats.titles = self.load_titles(&mut tx).await?;
        stats.genre_links = self.load_genre_links(&mut tx).await?;
        stats.users = self.load_users(&mut tx).await?;
        stats.reviews = self.load_reviews(&mut tx).await?;
        stats.comments = self.load_comments(&mut tx).await?;

        tx.commit().await?;
        info!("CSV load from {:?} finished: {stats:?}", self.dir);
        Ok(stats)
    }

    async fn load_slugs(
        &self,
        file: &'static str,
        table: &str,
        conn: &mut SqliteConnection,
    ) -> Result<usize> {
        let records = self.read::<SlugRecord>(file).await?;
        let sql = format!("INSERT INTO {table} (id, name, slug) VALUES (?, ?, ?)");
        for record in &records {
            sqlx::query(&sql)
                .bind(record.id)
                .bind(&record.name)
                .bind(&record.slug)
                .execute(&mut *conn)
                .await?;
        }
        info!("{file} loaded, {} records", records.len());
        Ok(records.len())
    }

    async fn load_titles(&self, conn: &mut SqliteConnection) -> Result<usize> {
        let records = self.read::<TitleRecord>(TITLE_FILE).await?;
        for record in &records {
            sqlx::query(
                "INSERT INTO title (id, name, year, description, category_id) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(record.id)
            .bind(&record.name)
            .bind(record.year)
            .bind(&record.description)
            .bind(record.category_id)
            .execute(&mut *conn)
            .await?;
        }
        info!("{TITLE_FILE} loaded, {} records", records.len());
        Ok(records.len())
    }

    async fn load_genre_links(&self, conn: &mut SqliteConnection) -> Result<usize> {
        let records = self.read::<GenreTitleRecord>(GENRE_TITLE_FILE).await?;
        for record in &records {
            let title_id = sqlx::query_scalar::<_, i64>("SELECT id FROM title WHERE id = ?")
                .bind(record.title_id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| {
                    Error::ImportError(format!(
                        "{GENRE_TITLE_FILE}: title {} does not exist",
                        record.title_id
                    ))
                })?;
            let genre_id = sqlx::query_scalar::<_, i64>("SELECT id FROM genre WHERE id = ?")
                .bind(record.genre_id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| {
                    Error::ImportError(format!(
                        "{GENRE_TITLE_FILE}: genre {} does not exist",
                        record.genre_id
                    ))
                })?;
            crate::title::link_genres(title_id, &[genre_id], conn).await?;
        }
        info!("{GENRE_TITLE_FILE} loaded, {} records", records.len());
        Ok(records.len())
    }

    async fn load_users(&self, conn: &mut SqliteConnection) -> Result<usize> {
        let records = self.read::<UserRecord>(USER_FILE).await?;
        let joined = OffsetDateTime::now_utc();
        for record in &records {
            let role = parse_role(record.role.as_deref())?;
            sqlx::query(
                r#"INSERT INTO users (id, username, email, first_name, last_name, bio, role, date_joined)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(record.id)
            .bind(&record.username)
            .bind(&record.email)
            .bind(&record.first_name)
            .bind(&record.last_name)
            .bind(&record.bio)
            .bind(role.as_str())
            .bind(joined)
            .execute(&mut *conn)
            .await?;
        }
        info!("{USER_FILE} loaded, {} records", records.len());
        Ok(records.len())
    }

    async fn load_reviews(&self, conn: &mut SqliteConnection) -> Result<usize> {
        let records = self.read::<ReviewRecord>(REVIEW_FILE).await?;
        for record in &records {
            let pub_date = parse_pub_date(&record.pub_date)?;
            sqlx::query(
                r#"INSERT INTO review (id, title_id, author_id, text, score, pub_date)
                VALUES (?, ?, ?, ?, ?, ?)"#,
            )
            .bind(record.id)
            .bind(record.title_id)
            .bind(record.author_id)
            .bind(&record.text)
            .bind(record.score)
            .bind(pub_date)
            .execute(&mut *conn)
            .await?;
        }
        info!("{REVIEW_FILE} loaded, {} records", records.len());
        Ok(records.len())
    }

    async fn load_comments(&self, conn: &mut SqliteConnection) -> Result<usize> {
        let records = self.read::<CommentRecord>(COMMENT_FILE).await?;
        for record in &records {
            let pub_date = parse_pub_date(&record.pub_date)?;
            sqlx::query(
                "INSERT INTO comment (id, review_id, author_id, text, pub_date) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(record.id)
            .bind(record.review_id)
            .bind(record.author_id)
            .bind(&record.text)
            .bind(pub_date)
            .execute(&mut *conn)
            .await?;
        }
        info!("{COMMENT_FILE} loaded, {} records", records.len());
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pub_date() {
        let dt = parse_pub_date("2019-09-24T21:08:21.567Z").unwrap();
        assert_eq!(dt.year(), 2019);
        assert_eq!(dt.hour(), 21);
        assert_eq!(dt.millisecond(), 567);
        assert_eq!(dt.offset(), time::UtcOffset::UTC);

        assert!(parse_pub_date("2019-09-24 21:08:21").is_err());
    }

    #[test]
    fn test_parse_role() {
        assert_eq!(parse_role(None).unwrap(), Role::User);
        assert_eq!(parse_role(Some("")).unwrap(), Role::User);
        assert_eq!(parse_role(Some("moderator")).unwrap(), Role::Moderator);
        assert!(parse_role(Some("king")).is_err());
    }
}
