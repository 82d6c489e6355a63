use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Number of items in `data`, for list results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solver: Option<&'static str>,
    /// Wall time of the whole request in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.metadata.get_or_insert_with(ResponseMetadata::default).total_count = Some(count);
        self
    }

    pub fn with_solver(mut self, solver: &'static str) -> Self {
        self.metadata.get_or_insert_with(ResponseMetadata::default).solver = Some(solver);
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.metadata.get_or_insert_with(ResponseMetadata::default).duration_ms = Some(duration_ms);
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_response() {
        let response = ApiResponse::success(1.5);
        assert!(response.success);
        assert_eq!(response.data, Some(1.5));
        assert!(response.metadata.is_none());
    }

    #[test]
    fn test_metadata_builders_accumulate() {
        let response = ApiResponse::success(vec![1, 2, 3])
            .with_count(3)
            .with_solver("goldfarb-idnani")
            .with_duration(12);
        let metadata = response.metadata.unwrap();
        assert_eq!(metadata.total_count, Some(3));
        assert_eq!(metadata.solver, Some("goldfarb-idnani"));
        assert_eq!(metadata.duration_ms, Some(12));
    }

    #[test]
    fn test_metadata_serialized_camel_case() {
        let json = serde_json::to_value(ApiResponse::success(()).with_duration(5)).unwrap();
        assert_eq!(json["metadata"]["durationMs"], 5);
        assert!(json["metadata"].get("totalCount").is_none());
    }
}
