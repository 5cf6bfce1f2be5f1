use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        (page, per_page, offset)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    PriceAsc,
    PriceDesc,
    #[default]
    Newest,
}

/// Filters shared by the product list and search endpoints. `category`
/// accepts an id, or `all`/empty for no filter, matching the browse UI.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ProductQuery {
    pub query: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub sort: Option<ProductSort>,
}

impl ProductQuery {
    pub fn category_id(&self) -> Result<Option<Uuid>, AppError> {
        match self.category.as_deref() {
            None | Some("") | Some("all") => Ok(None),
            Some(raw) => Uuid::parse_str(raw)
                .map(Some)
                .map_err(|_| AppError::BadRequest("Invalid category id".into())),
        }
    }
}

// Pagination fields are inlined rather than flattened: query-string
// deserialization cannot see through `#[serde(flatten)]` for numeric fields.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<String>,
    pub sort_order: Option<SortOrder>,
}

impl OrderListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_clamps_bounds() {
        let p = Pagination {
            page: Some(0),
            per_page: Some(1000),
        };
        assert_eq!(p.normalize(), (1, 100, 0));

        let p = Pagination {
            page: None,
            per_page: None,
        };
        assert_eq!(p.normalize(), (1, 20, 0));

        let p = Pagination {
            page: Some(3),
            per_page: Some(10),
        };
        assert_eq!(p.normalize(), (3, 10, 20));
    }

    #[test]
    fn category_all_means_unfiltered() {
        let q = ProductQuery {
            category: Some("all".into()),
            ..Default::default()
        };
        assert_eq!(q.category_id().unwrap(), None);

        let q = ProductQuery {
            category: Some("not-a-uuid".into()),
            ..Default::default()
        };
        assert!(q.category_id().is_err());

        let id = Uuid::new_v4();
        let q = ProductQuery {
            category: Some(id.to_string()),
            ..Default::default()
        };
        assert_eq!(q.category_id().unwrap(), Some(id));
    }
}
