//! Query parameter helpers shared by the thread endpoints.
//!
//! The types follow Rocket's `FromForm` conventions and derive `JsonSchema`
//! so the generated OpenAPI document lists the parameters and their defaults.

use rocket::form::{self, FromFormField, ValueField};
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};

const fn default_page() -> i64 {
    1
}

const fn default_page_size() -> i64 {
    50
}

/// Common pagination parameters applied to list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, rocket::form::FromForm)]
#[serde(rename_all = "camelCase")]
pub struct PaginationParams {
    /// One-based page index (defaults to the first page).
    #[field(default = 1)]
    #[serde(default = "default_page")]
    pub page: i64,
    /// Number of items per page (default 50, capped by `INBOX_MAX_PAGE_SIZE`).
    #[field(default = 50)]
    #[serde(default = "default_page_size")]
    pub size: i64,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            size: default_page_size(),
        }
    }
}

impl PaginationParams {
    /// Normalized 1-based page index.
    pub fn page(&self) -> i64 {
        self.page.max(1)
    }

    /// Page size clamped to `1..=max_page_size`.
    pub fn size(&self, max_page_size: i64) -> i64 {
        self.size.clamp(1, max_page_size.max(1))
    }

    /// Row offset for the normalized page, saturating for absurd page numbers
    /// (the query then simply returns an empty page).
    pub fn offset(&self, max_page_size: i64) -> i64 {
        (self.page() - 1).saturating_mul(self.size(max_page_size))
    }
}

/// Shape of an in-memory thread tree response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TreeLayout {
    /// Pre-order list with `depth` and `childIds`.
    #[default]
    Flat,
    /// Replies nested under their parents.
    Nested,
}

impl<'r> FromFormField<'r> for TreeLayout {
    fn from_value(field: ValueField<'r>) -> form::Result<'r, Self> {
        match field.value.to_ascii_lowercase().as_str() {
            "flat" => Ok(TreeLayout::Flat),
            "nested" => Ok(TreeLayout::Nested),
            other => Err(form::Error::validation(format!(
                "invalid layout '{other}'; expected 'flat' or 'nested'"
            ))
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_normalization() {
        let params = PaginationParams { page: 0, size: 500 };
        assert_eq!(params.page(), 1);
        assert_eq!(params.size(100), 100);
        assert_eq!(params.offset(100), 0);

        let params = PaginationParams { page: 3, size: 20 };
        assert_eq!(params.offset(100), 40);

        let params = PaginationParams { page: 2, size: -5 };
        assert_eq!(params.size(100), 1);
    }

    #[test]
    fn test_huge_page_offset_saturates() {
        let params = PaginationParams {
            page: i64::MAX,
            size: 50,
        };
        assert_eq!(params.offset(100), i64::MAX);

        let params = PaginationParams {
            page: i64::MIN,
            size: 50,
        };
        assert_eq!(params.offset(100), 0);
    }
}
