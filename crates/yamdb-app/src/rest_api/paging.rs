use garde::Validate;
use serde::{Deserialize, Serialize};
use yamdb_dal::{Batch, ListingParams, Order};

use crate::error::{ApiError, ApiResult};

/// Paging and sorting query, `sort` is comma separated list of field names,
/// `-` prefix sorts descending
#[derive(Debug, Clone, Default, Validate, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct Paging {
    #[garde(range(min = 1))]
    page: Option<u32>,
    #[garde(range(min = 1, max = 1000))]
    page_size: Option<u32>,
    #[garde(length(max = 255))]
    sort: Option<String>,
}

impl Paging {
    pub fn new(page: Option<u32>, page_size: Option<u32>, sort: Option<String>) -> Self {
        Self {
            page,
            page_size,
            sort,
        }
    }

    pub fn into_listing_params(self, default_page_size: u32) -> ApiResult<ListingParams> {
        let page_size = self.page_size(default_page_size);
        let page = i64::from(self.page.unwrap_or(1).max(1));
        let offset = (page - 1) * i64::from(page_size);
        let params = ListingParams::new(offset, page_size.into());
        match self.sort {
            Some(sort) => Ok(params.with_order(parse_ordering(&sort)?)),
            None => Ok(params),
        }
    }

    pub fn page_size(&self, default_page_size: u32) -> u32 {
        self.page_size.unwrap_or(default_page_size).max(1)
    }
}

fn parse_ordering(orderings: &str) -> ApiResult<Vec<Order>> {
    orderings
        .split(',')
        .map(|name| {
            let (field_name, descending) = match name.trim() {
                "" => return Err(ApiError::InvalidQuery("Empty ordering name".to_string())),
                name if name.len() > 100 => {
                    return Err(ApiError::InvalidQuery("Ordering name too long".to_string()))
                }
                name if name.starts_with('+') => (&name[1..], false),
                name if name.starts_with('-') => (&name[1..], true),
                name => (name, false),
            };

            let order = if descending {
                Order::Desc(field_name.to_string())
            } else {
                Order::Asc(field_name.to_string())
            };

            Ok(order)
        })
        .collect()
}

#[derive(Debug, Clone, Default, Validate, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct SearchQuery {
    /// Substring of the name
    #[garde(length(min = 1, max = 255))]
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Page<T> {
    page: u32,
    page_size: u32,
    total_pages: u32,
    total: u64,
    rows: Vec<T>,
}

impl<T> Page<T>
where
    T: Serialize,
{
    pub fn try_from_batch(
        batch: Batch<T>,
        page_size: u32,
    ) -> Result<Self, std::num::TryFromIntError> {
        let size = u64::from(page_size);
        Ok(Self {
            page: u32::try_from(u64::try_from(batch.offset)? / size + 1)?,
            page_size,
            total_pages: u32::try_from(batch.total.div_ceil(size))?,
            total: batch.total,
            rows: batch.rows,
        })
    }

    pub fn from_batch(batch: Batch<T>, page_size: u32) -> ApiResult<Self> {
        Self::try_from_batch(batch, page_size)
            .map_err(|e| ApiError::Internal(format!("Invalid page: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_params() {
        let paging = Paging::new(Some(3), Some(20), Some("-year, name".to_string()));
        assert!(paging.validate().is_ok());
        let params = paging.into_listing_params(10).unwrap();
        assert_eq!(params.offset, 40);
        assert_eq!(params.limit, 20);
        assert_eq!(
            params.order_by(&["name", "year"], "id").unwrap(),
            "ORDER BY year DESC, name"
        );
    }

    #[test]
    fn test_default_page() {
        let params = Paging::default().into_listing_params(25).unwrap();
        assert_eq!(params.offset, 0);
        assert_eq!(params.limit, 25);
        assert!(params.order.is_none());
    }

    #[test]
    fn test_invalid_paging() {
        assert!(Paging::new(Some(0), None, None).validate().is_err());
        assert!(Paging::new(None, Some(0), None).validate().is_err());
        assert!(Paging::new(None, Some(1001), None).validate().is_err());
        let err = Paging::new(None, None, Some("name,,year".to_string()))
            .into_listing_params(10)
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidQuery(_)));
    }

    #[test]
    fn test_page_from_batch() {
        let batch = Batch {
            offset: 20,
            limit: 10,
            rows: vec![1, 2, 3],
            total: 23,
        };
        let page = Page::from_batch(batch, 10).unwrap();
        assert_eq!(page.page, 3);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total, 23);
        assert_eq!(page.rows.len(), 3);

        let empty: Page<i32> = Page::from_batch(
            Batch {
                offset: 0,
                limit: 10,
                rows: vec![],
                total: 0,
            },
            10,
        )
        .unwrap();
        assert_eq!(empty.page, 1);
        assert_eq!(empty.total_pages, 0);
    }
}
