// Mapping of service failures onto HTTP responses
use crate::application::chart_service::ServiceError;
use crate::domain::error::ChartError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("failed to encode response")]
    Encoding(StatusCode),
}

impl From<ChartError> for ApiError {
    fn from(e: ChartError) -> Self {
        Self::Service(ServiceError::Chart(e))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Service(ServiceError::Chart(
                ChartError::NoPendingDraft | ChartError::UnknownSession(_),
            )) => StatusCode::NOT_FOUND,
            Self::Service(ServiceError::Chart(_)) => StatusCode::BAD_REQUEST,
            Self::Service(ServiceError::Backend(_)) => StatusCode::BAD_GATEWAY,
            Self::Service(ServiceError::Internal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Encoding(status) => *status,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::from(ChartError::EmptyDescription).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(ChartError::NoPendingDraft).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(ChartError::UnknownSession("s".to_string())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(ServiceError::Backend(anyhow::anyhow!("timeout"))).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::Encoding(StatusCode::INTERNAL_SERVER_ERROR).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
