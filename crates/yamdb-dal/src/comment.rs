use futures::{StreamExt as _, TryStreamExt as _};
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::Executor;
use time::OffsetDateTime;

use crate::{
    error::{Error, Result},
    Batch, ChosenDB, ListingParams,
};

const VALID_ORDER_FIELDS: &[&str] = &["id", "pub_date"];

const COMMENT_SELECT: &str = r#"
SELECT c.id AS id, c.text AS text, u.username AS author,
c.pub_date AS pub_date, c.author_id AS author_id
FROM comment c
JOIN users u ON u.id = c.author_id
"#;

#[derive(Debug, Serialize, Clone, sqlx::FromRow)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub author: String,
    #[serde(with = "time::serde::rfc3339")]
    pub pub_date: OffsetDateTime,
    #[serde(skip)]
    pub author_id: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateComment {
    #[garde(length(min = 1))]
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateComment {
    #[garde(length(min = 1))]
    pub text: Option<String>,
}

pub type CommentRepository = CommentRepositoryImpl<sqlx::Pool<ChosenDB>>;

pub struct CommentRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> CommentRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(
        &self,
        review_id: i64,
        author_id: i64,
        payload: CreateComment,
    ) -> Result<Comment> {
        let result = sqlx::query(
            "INSERT INTO comment (review_id, author_id, text, pub_date) VALUES (?, ?, ?, ?)",
        )
        .bind(review_id)
        .bind(author_id)
        .bind(&payload.text)
        .bind(OffsetDateTime::now_utc())
        .execute(&self.executor)
        .await?;

        let id = result.last_insert_rowid();
        self.get(review_id, id).await
    }

    pub async fn get(&self, review_id: i64, id: i64) -> Result<Comment> {
        sqlx::query_as::<_, Comment>(&format!(
            "{COMMENT_SELECT} WHERE c.id = ? AND c.review_id = ?"
        ))
        .bind(id)
        .bind(review_id)
        .fetch_optional(&self.executor)
        .await?
        .ok_or_else(|| Error::RecordNotFound("Comment".to_string()))
    }

    pub async fn count(&self, review_id: i64) -> Result<u64> {
        let count: u64 = sqlx::query_scalar("SELECT count(*) FROM comment WHERE review_id = ?")
            .bind(review_id)
            .fetch_one(&self.executor)
            .await?;
        Ok(count)
    }

    pub async fn list(&self, review_id: i64, params: ListingParams) -> Result<Batch<Comment>> {
        let order = params.order_by(VALID_ORDER_FIELDS, "pub_date DESC, id DESC")?;
        let sql = format!("{COMMENT_SELECT} WHERE c.review_id = ? {order} LIMIT ? OFFSET ?");
        let rows = sqlx::query_as::<_, Comment>(&sql)
            .bind(review_id)
            .bind(params.limit)
            .bind(params.offset)
            .fetch(&self.executor)
            .take(crate::MAX_LIMIT)
            .try_collect::<Vec<_>>()
            .await?;
        let total = self.count(review_id).await?;

        Ok(Batch {
            offset: params.offset,
            limit: params.limit,
            rows,
            total,
        })
    }

    pub async fn update(&self, review_id: i64, id: i64, payload: UpdateComment) -> Result<Comment> {
        let result = sqlx::query(
            "UPDATE comment SET text = COALESCE(?, text) WHERE id = ? AND review_id = ?",
        )
        .bind(&payload.text)
        .bind(id)
        .bind(review_id)
        .execute(&self.executor)
        .await?;

        if result.rows_affected() == 0 {
            Err(Error::RecordNotFound("Comment".to_string()))
        } else {
            self.get(review_id, id).await
        }
    }

    pub async fn delete(&self, review_id: i64, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM comment WHERE id = ? AND review_id = ?")
            .bind(id)
            .bind(review_id)
            .execute(&self.executor)
            .await?;

        if res.rows_affected() == 0 {
            Err(Error::RecordNotFound("Comment".to_string()))
        } else {
            Ok(())
        }
    }
}
