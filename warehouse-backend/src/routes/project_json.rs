use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use http::HeaderName;
use serde::Serialize;
use warehouse_database::queries::find_project;
use warehouse_database::Pool;

use crate::error::AppError;

pub static X_PYPI_LAST_SERIAL: HeaderName = HeaderName::from_static("x-pypi-last-serial");

#[derive(Serialize)]
pub struct ProjectInfo {
    pub name: String,
}

#[derive(Serialize)]
pub struct ProjectJson {
    pub info: ProjectInfo,
    pub last_serial: i32,
}

/// Project metadata. The serial comes from the denormalized
/// `packages.last_serial` column, not from scanning `journals`.
pub async fn project_json(
    State(pool): State<Pool>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut connection = pool.get().await?;
    let project = find_project(&mut connection, &name).await?;
    let project = project.ok_or(AppError::ProjectNotFound(name))?;

    Ok((
        [(X_PYPI_LAST_SERIAL.clone(), project.last_serial.to_string())],
        Json(ProjectJson {
            info: ProjectInfo { name: project.name },
            last_serial: project.last_serial,
        }),
    ))
}
