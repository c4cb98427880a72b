//! Request DTOs.

use serde::Deserialize;
use validator::Validate;

use crate::file::{FileQuery, StorageSource};
use crate::web::error::ApiError;

/// Login request.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Username and password are required"))]
    pub username: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 128, message = "Username and password are required"))]
    pub password: String,
}

/// Query string of `GET /api/files`.
///
/// Numbers arrive as strings so that garbage falls back to defaults
/// instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct FileListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
    pub category: Option<String>,
    pub source: Option<String>,
}

impl FileListQuery {
    pub fn to_file_query(&self) -> Result<FileQuery, ApiError> {
        let source = match self.source.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(
                StorageSource::parse(s)
                    .ok_or_else(|| ApiError::bad_request(format!("Unknown source: {}", s)))?,
            ),
        };

        Ok(FileQuery::new(parse_number(&self.page), parse_number(&self.limit))
            .with_search(self.search.as_deref())
            .with_category(self.category.as_deref())
            .with_source(source))
    }
}

fn parse_number(value: &Option<String>) -> Option<i64> {
    value.as_deref().and_then(|v| v.trim().parse().ok())
}
