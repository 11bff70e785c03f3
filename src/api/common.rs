//! Common API utilities and shared types
//!
//! This module contains shared utilities used across multiple API endpoints.

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};

use crate::api::middleware::ApiError;
use crate::models::ListParams;

// ============================================================================
// Pagination Query Types
// ============================================================================

/// `?limit=&offset=` query parameters
#[derive(Debug, Default, Deserialize)]
pub struct PaginationQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PaginationQuery {
    /// Validate into list parameters (defaults applied, limit clamped)
    pub fn params(&self) -> Result<ListParams, ApiError> {
        Ok(ListParams::new(self.limit, self.offset)?)
    }
}

// ============================================================================
// Request Bodies
// ============================================================================

/// JSON body extractor that reports malformed input with the API error envelope
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(ApiError::validation_error(rejection.body_text())),
        }
    }
}

// ============================================================================
// Query Strings and Path Segments
// ============================================================================

/// Query string extractor that reports bad parameters with the API error envelope
#[derive(Debug)]
pub struct QueryParams<T>(pub T);

impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(QueryParams(value)),
            Err(rejection) => Err(ApiError::validation_error(rejection.body_text())),
        }
    }
}

/// Path extractor; a segment that doesn't parse (e.g. a non-numeric id) is a validation error
#[derive(Debug)]
pub struct PathParam<T>(pub T);

impl<T, S> FromRequestParts<S> for PathParam<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(PathParam(value)),
            Err(rejection) => Err(ApiError::validation_error(rejection.body_text())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DEFAULT_LIMIT, MAX_LIMIT};

    #[test]
    fn test_pagination_query_defaults_and_clamping() {
        let params = PaginationQuery::default().params().unwrap();
        assert_eq!(params.limit, DEFAULT_LIMIT);
        assert_eq!(params.offset, 0);

        let query = PaginationQuery {
            limit: Some(MAX_LIMIT * 10),
            offset: Some(5),
        };
        let params = query.params().unwrap();
        assert_eq!(params.limit, MAX_LIMIT);
        assert_eq!(params.offset, 5);
    }

    #[test]
    fn test_pagination_query_rejects_bad_values() {
        let zero = PaginationQuery {
            limit: Some(0),
            offset: None,
        };
        assert_eq!(zero.params().unwrap_err().error.code, "VALIDATION_ERROR");

        let negative = PaginationQuery {
            limit: None,
            offset: Some(-1),
        };
        assert_eq!(negative.params().unwrap_err().error.code, "VALIDATION_ERROR");
    }
}
