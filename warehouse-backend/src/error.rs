use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde::Serialize;
use tracing::error;
use warehouse_config::ConfigError;
use warehouse_database::migrations::MigrationError;
use warehouse_database::DatabaseError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("migration error: {0}")]
    Migration(#[from] MigrationError),
    #[error("project {0} does not exist")]
    ProjectNotFound(String),
}

impl From<diesel_async::pooled_connection::deadpool::PoolError> for AppError {
    fn from(value: diesel_async::pooled_connection::deadpool::PoolError) -> Self {
        Self::Database(value.into())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::ProjectNotFound(_) => StatusCode::NOT_FOUND,
            Self::Io(_) | Self::Config(_) | Self::Database(_) | Self::Migration(_) => {
                error!("{self}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let message = match status {
            StatusCode::NOT_FOUND => self.to_string(),
            _ => "internal server error".to_owned(),
        };
        (status, Json(ErrorBody { message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt as _;

    use super::*;

    #[tokio::test]
    async fn missing_project_is_404() {
        let response = AppError::ProjectNotFound("requests".to_owned()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["message"], "project requests does not exist");
    }

    #[tokio::test]
    async fn internal_details_are_not_leaked() {
        let error = AppError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk on fire",
        ));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(!String::from_utf8_lossy(&body).contains("disk on fire"));
    }
}
