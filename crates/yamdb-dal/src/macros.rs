/// Repository for reference entities identified by a unique slug (`name`, `slug` columns)
macro_rules! slug_repository {
    ($entity:ident, $create:ident, $repo:ident, $repo_impl:ident, $table:literal, $label:literal) => {
        use futures::{StreamExt as _, TryStreamExt as _};

        const VALID_ORDER_FIELDS: &[&str] = &["name", "slug"];

        pub type $repo = $repo_impl<sqlx::Pool<crate::ChosenDB>>;

        pub struct $repo_impl<E> {
            executor: E,
        }

        impl<'c, E> $repo_impl<E>
        where
            for<'a> &'a E: sqlx::Executor<'c, Database = crate::ChosenDB>,
        {
            pub fn new(executor: E) -> Self {
                Self { executor }
            }

            pub async fn create(&self, payload: $create) -> crate::error::Result<$entity> {
                sqlx::query(concat!("INSERT INTO ", $table, " (name, slug) VALUES (?, ?)"))
                    .bind(&payload.name)
                    .bind(&payload.slug)
                    .execute(&self.executor)
                    .await
                    .map_err(|e| {
                        crate::error::on_unique_violation(e, || {
                            crate::Error::Duplicate(format!(
                                "{} with this name or slug already exists",
                                $label
                            ))
                        })
                    })?;
                self.get(&payload.slug).await
            }

            pub async fn count(&self, search: Option<&str>) -> crate::error::Result<u64> {
                let pattern = search.map(crate::like_pattern);
                let count: u64 = sqlx::query_scalar(concat!(
                    "SELECT count(*) FROM ",
                    $table,
                    r" WHERE (? IS NULL OR name LIKE ? ESCAPE '\')"
                ))
                .bind(&pattern)
                .bind(&pattern)
                .fetch_one(&self.executor)
                .await?;
                Ok(count)
            }

            pub async fn list(
                &self,
                params: crate::ListingParams,
                search: Option<&str>,
            ) -> crate::error::Result<crate::Batch<$entity>> {
                let order = params.order_by(VALID_ORDER_FIELDS, "slug")?;
                let pattern = search.map(crate::like_pattern);
                let sql = format!(
                    concat!(
                        "SELECT name, slug FROM ",
                        $table,
                        r" WHERE (? IS NULL OR name LIKE ? ESCAPE '\') {} LIMIT ? OFFSET ?"
                    ),
                    order
                );
                let rows = sqlx::query_as::<_, $entity>(&sql)
                    .bind(&pattern)
                    .bind(&pattern)
                    .bind(params.limit)
                    .bind(params.offset)
                    .fetch(&self.executor)
                    .take(crate::MAX_LIMIT)
                    .try_collect::<Vec<_>>()
                    .await?;
                let total = self.count(search).await?;
                Ok(crate::Batch {
                    offset: params.offset,
                    limit: params.limit,
                    rows,
                    total,
                })
            }

            pub async fn get(&self, slug: &str) -> crate::error::Result<$entity> {
                sqlx::query_as::<_, $entity>(concat!(
                    "SELECT name, slug FROM ",
                    $table,
                    " WHERE slug = ?"
                ))
                .bind(slug)
                .fetch_optional(&self.executor)
                .await?
                .ok_or_else(|| crate::Error::RecordNotFound($label.to_string()))
            }

            pub async fn delete(&self, slug: &str) -> crate::error::Result<()> {
                let res = sqlx::query(concat!("DELETE FROM ", $table, " WHERE slug = ?"))
                    .bind(slug)
                    .execute(&self.executor)
                    .await?;

                if res.rows_affected() == 0 {
                    Err(crate::Error::RecordNotFound($label.to_string()))
                } else {
                    Ok(())
                }
            }
        }
    };
}
