use std::collections::HashMap;

use futures::{StreamExt as _, TryStreamExt as _};
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Acquire, Executor, SqliteConnection};
use tracing::debug;

use crate::{
    category::Category,
    error::{Error, Result},
    genre::Genre,
    Batch, ChosenDB, ListingParams,
};

const VALID_ORDER_FIELDS: &[&str] = &["id", "name", "year", "rating"];

const TITLE_SELECT: &str = r#"
SELECT t.id AS id, t.name AS name, t.year AS year, t.description AS description,
c.name AS category_name, c.slug AS category_slug,
(SELECT AVG(r.score) FROM review r WHERE r.title_id = t.id) AS rating
FROM title t
LEFT JOIN category c ON t.category_id = c.id
"#;

const TITLE_FILTER: &str = r#"
WHERE (? IS NULL OR EXISTS (
    SELECT 1 FROM title_genres tg JOIN genre g ON g.id = tg.genre_id
    WHERE tg.title_id = t.id AND g.slug = ?))
AND (? IS NULL OR c.slug = ?)
AND (? IS NULL OR t.year = ?)
AND (? IS NULL OR t.name LIKE ? ESCAPE '\')
"#;

/// Years after the current calendar year are rejected
pub fn not_in_future(year: &i32, _ctx: &()) -> garde::Result {
    let current = time::OffsetDateTime::now_utc().year();
    if *year > current {
        Err(garde::Error::new(format!(
            "Year {year} is in the future, current year is {current}"
        )))
    } else {
        Ok(())
    }
}

#[derive(Debug, Serialize, Clone)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Title {
    pub id: i64,
    pub name: String,
    pub year: i32,
    pub description: Option<String>,
    pub genre: Vec<Genre>,
    pub category: Option<Category>,
    /// Mean score of the title's reviews, null without reviews
    pub rating: Option<f64>,
}

#[derive(Debug, sqlx::FromRow)]
struct TitleRow {
    id: i64,
    name: String,
    year: i32,
    description: Option<String>,
    category_name: Option<String>,
    category_slug: Option<String>,
    rating: Option<f64>,
}

impl TitleRow {
    fn into_title(self, genre: Vec<Genre>) -> Title {
        let category = match (self.category_name, self.category_slug) {
            (Some(name), Some(slug)) => Some(Category { name, slug }),
            _ => None,
        };
        Title {
            id: self.id,
            name: self.name,
            year: self.year,
            description: self.description,
            genre,
            category,
            rating: self.rating,
        }
    }
}

/// Genres and category are referenced by their slugs
#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateTitle {
    #[garde(length(min = 1, max = 100))]
    pub name: String,
    #[garde(custom(not_in_future))]
    pub year: i32,
    #[garde(length(max = 500))]
    pub description: Option<String>,
    #[serde(default)]
    #[garde(inner(length(min = 1, max = 50)))]
    pub genre: Vec<String>,
    #[garde(length(min = 1, max = 50))]
    pub category: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateTitle {
    #[garde(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[garde(inner(custom(not_in_future)))]
    pub year: Option<i32>,
    /// `null` clears the description
    #[serde(default, deserialize_with = "present")]
    #[garde(inner(inner(length(max = 500))))]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub description: Option<Option<String>>,
    #[garde(inner(inner(length(min = 1, max = 50))))]
    pub genre: Option<Vec<String>>,
    /// `null` removes the title from its category
    #[serde(default, deserialize_with = "present")]
    #[garde(inner(inner(length(min = 1, max = 50))))]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub category: Option<Option<String>>,
}

/// Tells an explicit `null` (`Some(None)`) from a missing field (`None`)
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default)]
pub struct TitleFilter {
    /// genre slug
    pub genre: Option<String>,
    /// category slug
    pub category: Option<String>,
    pub year: Option<i32>,
    /// substring of the name
    pub name: Option<String>,
}

macro_rules! bind_filter {
    ($query:expr, $filter:expr, $name_pattern:expr) => {
        $query
            .bind(&$filter.genre)
            .bind(&$filter.genre)
            .bind(&$filter.category)
            .bind(&$filter.category)
            .bind($filter.year)
            .bind($filter.year)
            .bind($name_pattern)
            .bind($name_pattern)
    };
}

async fn resolve_category<'c, X>(slug: Option<&str>, executor: X) -> Result<Option<i64>>
where
    X: Executor<'c, Database = ChosenDB>,
{
    let Some(slug) = slug else {
        return Ok(None);
    };
    sqlx::query_scalar::<_, i64>("SELECT id FROM category WHERE slug = ?")
        .bind(slug)
        .fetch_optional(executor)
        .await?
        .map(Some)
        .ok_or_else(|| {
            debug!("Unknown category slug {slug}");
            Error::InvalidReference(format!("Category with slug \"{slug}\" does not exist"))
        })
}

async fn resolve_genres(slugs: &[String], conn: &mut SqliteConnection) -> Result<Vec<i64>> {
    let mut ids = Vec::with_capacity(slugs.len());
    for slug in slugs {
        let id = sqlx::query_scalar::<_, i64>("SELECT id FROM genre WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| {
                Error::InvalidReference(format!("Genre with slug \"{slug}\" does not exist"))
            })?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

pub(crate) async fn link_genres(
    title_id: i64,
    genre_ids: &[i64],
    conn: &mut SqliteConnection,
) -> Result<()> {
    for genre_id in genre_ids {
        sqlx::query("INSERT OR IGNORE INTO title_genres (title_id, genre_id) VALUES (?, ?)")
            .bind(title_id)
            .bind(genre_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub type TitleRepository = TitleRepositoryImpl<sqlx::Pool<ChosenDB>>;

pub struct TitleRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> TitleRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB> + Acquire<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateTitle) -> Result<Title> {
        let mut tx = self.executor.begin().await?;
        let category_id = resolve_category(payload.category.as_deref(), &mut *tx).await?;
        let genre_ids = resolve_genres(&payload.genre, &mut tx).await?;
        let result = sqlx::query(
            "INSERT INTO title (name, year, description, category_id) VALUES (?, ?, ?, ?)",
        )
        .bind(&payload.name)
        .bind(payload.year)
        .bind(&payload.description)
        .bind(category_id)
        .execute(&mut *tx)
        .await?;
        let id = result.last_insert_rowid();
        link_genres(id, &genre_ids, &mut tx).await?;
        tx.commit().await?;

        self.get(id).await
    }

    pub async fn update(&self, id: i64, payload: UpdateTitle) -> Result<Title> {
        let mut tx = self.executor.begin().await?;
        let category_id = match &payload.category {
            Some(slug) => resolve_category(slug.as_deref(), &mut *tx).await?,
            None => None,
        };
        let result = sqlx::query(
            r#"UPDATE title SET name = COALESCE(?, name), year = COALESCE(?, year),
            description = CASE WHEN ? THEN ? ELSE description END,
            category_id = CASE WHEN ? THEN ? ELSE category_id END
            WHERE id = ?"#,
        )
        .bind(&payload.name)
        .bind(payload.year)
        .bind(payload.description.is_some())
        .bind(payload.description.as_ref().and_then(|d| d.as_deref()))
        .bind(payload.category.is_some())
        .bind(category_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::RecordNotFound("Title".to_string()));
        }

        if let Some(genre) = &payload.genre {
            let genre_ids = resolve_genres(genre, &mut tx).await?;
            sqlx::query("DELETE FROM title_genres WHERE title_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            link_genres(id, &genre_ids, &mut tx).await?;
        }
        tx.commit().await?;

        self.get(id).await
    }

    pub async fn get(&self, id: i64) -> Result<Title> {
        let row = sqlx::query_as::<_, TitleRow>(&format!("{TITLE_SELECT} WHERE t.id = ?"))
            .bind(id)
            .fetch_optional(&self.executor)
            .await?
            .ok_or_else(|| Error::RecordNotFound("Title".to_string()))?;
        let mut genres = self.load_genres(&[id]).await?;
        Ok(row.into_title(genres.remove(&id).unwrap_or_default()))
    }

    pub async fn exists(&self, id: i64) -> Result<bool> {
        let found = sqlx::query_scalar::<_, i64>("SELECT id FROM title WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.executor)
            .await?;
        Ok(found.is_some())
    }

    pub async fn count(&self, filter: &TitleFilter) -> Result<u64> {
        let name_pattern = filter.name.as_deref().map(crate::like_pattern);
        let sql = format!(
            "SELECT count(*) FROM title t LEFT JOIN category c ON t.category_id = c.id {TITLE_FILTER}"
        );
        let count: u64 = bind_filter!(sqlx::query_scalar(&sql), filter, &name_pattern)
            .fetch_one(&self.executor)
            .await?;
        Ok(count)
    }

    pub async fn list(&self, params: ListingParams, filter: TitleFilter) -> Result<Batch<Title>> {
        let order = params.order_by(VALID_ORDER_FIELDS, "name, id")?;
        let name_pattern = filter.name.as_deref().map(crate::like_pattern);
        let sql = format!("{TITLE_SELECT} {TITLE_FILTER} {order} LIMIT ? OFFSET ?");
        let rows = bind_filter!(sqlx::query_as::<_, TitleRow>(&sql), filter, &name_pattern)
            .bind(params.limit)
            .bind(params.offset)
            .fetch(&self.executor)
            .take(crate::MAX_LIMIT)
            .try_collect::<Vec<_>>()
            .await?;

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut genres = self.load_genres(&ids).await?;
        let rows = rows
            .into_iter()
            .map(|row| {
                let genre = genres.remove(&row.id).unwrap_or_default();
                row.into_title(genre)
            })
            .collect();
        let total = self.count(&filter).await?;

        Ok(Batch {
            offset: params.offset,
            limit: params.limit,
            rows,
            total,
        })
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM title WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;

        if res.rows_affected() == 0 {
            Err(Error::RecordNotFound("Title".to_string()))
        } else {
            Ok(())
        }
    }

    async fn load_genres(&self, title_ids: &[i64]) -> Result<HashMap<i64, Vec<Genre>>> {
        if title_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = vec!["?"; title_ids.len()].join(", ");
        let sql = format!(
            r#"SELECT tg.title_id, g.name, g.slug FROM title_genres tg
            JOIN genre g ON g.id = tg.genre_id
            WHERE tg.title_id IN ({placeholders}) ORDER BY g.slug"#
        );
        let mut query = sqlx::query_as::<_, (i64, String, String)>(&sql);
        for id in title_ids {
            query = query.bind(*id);
        }
        let rows = query.fetch_all(&self.executor).await?;

        let mut genres: HashMap<i64, Vec<Genre>> = HashMap::new();
        for (title_id, name, slug) in rows {
            genres
                .entry(title_id)
                .or_default()
                .push(Genre { name, slug });
        }
        Ok(genres)
    }
}
