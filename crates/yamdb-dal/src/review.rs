use futures::{StreamExt as _, TryStreamExt as _};
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::Executor;
use time::OffsetDateTime;

use crate::{
    error::{on_unique_violation, Error, Result},
    Batch, ChosenDB, ListingParams,
};

const VALID_ORDER_FIELDS: &[&str] = &["id", "score", "pub_date"];

const REVIEW_SELECT: &str = r#"
SELECT r.id AS id, r.text AS text, u.username AS author, r.score AS score,
r.pub_date AS pub_date, r.author_id AS author_id
FROM review r
JOIN users u ON u.id = r.author_id
"#;

#[derive(Debug, Serialize, Clone, sqlx::FromRow)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Review {
    pub id: i64,
    pub text: String,
    /// username of the author
    pub author: String,
    pub score: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub pub_date: OffsetDateTime,
    #[serde(skip)]
    pub author_id: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateReview {
    #[garde(length(min = 1))]
    pub text: String,
    #[garde(range(min = 1, max = 10))]
    pub score: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateReview {
    #[garde(length(min = 1))]
    pub text: Option<String>,
    #[garde(inner(range(min = 1, max = 10)))]
    pub score: Option<i64>,
}

pub type ReviewRepository = ReviewRepositoryImpl<sqlx::Pool<ChosenDB>>;

pub struct ReviewRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> ReviewRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Fails with [`Error::Conflict`] when the author already reviewed the title
    pub async fn create(
        &self,
        title_id: i64,
        author_id: i64,
        payload: CreateReview,
    ) -> Result<Review> {
        let result = sqlx::query(
            "INSERT INTO review (title_id, author_id, text, score, pub_date) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(title_id)
        .bind(author_id)
        .bind(&payload.text)
        .bind(payload.score)
        .bind(OffsetDateTime::now_utc())
        .execute(&self.executor)
        .await
        .map_err(|e| {
            on_unique_violation(e, || {
                Error::Conflict("Review of this title by this author already exists".to_string())
            })
        })?;

        let id = result.last_insert_rowid();
        self.get(title_id, id).await
    }

    pub async fn exists_for(&self, title_id: i64, author_id: i64) -> Result<bool> {
        let found =
            sqlx::query_scalar::<_, i64>("SELECT id FROM review WHERE title_id = ? AND author_id = ?")
                .bind(title_id)
                .bind(author_id)
                .fetch_optional(&self.executor)
                .await?;
        Ok(found.is_some())
    }

    pub async fn get(&self, title_id: i64, id: i64) -> Result<Review> {
        sqlx::query_as::<_, Review>(&format!(
            "{REVIEW_SELECT} WHERE r.id = ? AND r.title_id = ?"
        ))
        .bind(id)
        .bind(title_id)
        .fetch_optional(&self.executor)
        .await?
        .ok_or_else(|| Error::RecordNotFound("Review".to_string()))
    }

    pub async fn count(&self, title_id: i64) -> Result<u64> {
        let count: u64 = sqlx::query_scalar("SELECT count(*) FROM review WHERE title_id = ?")
            .bind(title_id)
            .fetch_one(&self.executor)
            .await?;
        Ok(count)
    }

    /// Newest reviews first unless other order is requested
    pub async fn list(&self, title_id: i64, params: ListingParams) -> Result<Batch<Review>> {
        let order = params.order_by(VALID_ORDER_FIELDS, "pub_date DESC, id DESC")?;
        let sql = format!("{REVIEW_SELECT} WHERE r.title_id = ? {order} LIMIT ? OFFSET ?");
        let rows = sqlx::query_as::<_, Review>(&sql)
            .bind(title_id)
            .bind(params.limit)
            .bind(params.offset)
            .fetch(&self.executor)
            .take(crate::MAX_LIMIT)
            .try_collect::<Vec<_>>()
            .await?;
        let total = self.count(title_id).await?;

        Ok(Batch {
            offset: params.offset,
            limit: params.limit,
            rows,
            total,
        })
    }

    pub async fn update(&self, title_id: i64, id: i64, payload: UpdateReview) -> Result<Review> {
        let result = sqlx::query(
            "UPDATE review SET text = COALESCE(?, text), score = COALESCE(?, score) WHERE id = ? AND title_id = ?",
        )
        .bind(&payload.text)
        .bind(payload.score)
        .bind(id)
        .bind(title_id)
        .execute(&self.executor)
        .await?;

        if result.rows_affected() == 0 {
            Err(Error::RecordNotFound("Review".to_string()))
        } else {
            self.get(title_id, id).await
        }
    }

    pub async fn delete(&self, title_id: i64, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM review WHERE id = ? AND title_id = ?")
            .bind(id)
            .bind(title_id)
            .execute(&self.executor)
            .await?;

        if res.rows_affected() == 0 {
            Err(Error::RecordNotFound("Review".to_string()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_range() {
        for score in [1, 5, 10] {
            let review = CreateReview {
                text: "ok".into(),
                score,
            };
            assert!(review.validate().is_ok(), "score {score} rejected");
        }
        for score in [0, 11, -3] {
            let review = CreateReview {
                text: "ok".into(),
                score,
            };
            assert!(review.validate().is_err(), "score {score} accepted");
        }
        let update = UpdateReview {
            score: Some(11),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }
}
