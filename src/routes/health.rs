use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;
use tokio::task;
use tracing::warn;

use crate::{repository, state::AppState};

const STATUS_OK: &str = "ok";
const STATUS_ERROR: &str = "error";

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub db_status: &'static str,
    pub llm_status: &'static str,
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let llm_status = if state.config.has_llm_credential() {
        STATUS_OK
    } else {
        STATUS_ERROR
    };

    let db_state = state.clone();
    let db_reachable = task::spawn_blocking(move || {
        let mut conn = db_state.db()?;
        repository::any_documents(&mut conn)?;
        Ok::<_, crate::error::AppError>(())
    })
    .await;

    let db_status = match db_reachable {
        Ok(Ok(())) => STATUS_OK,
        Ok(Err(err)) => {
            warn!(error = ?err, "health check could not query the database");
            STATUS_ERROR
        }
        Err(join_err) => {
            warn!(error = %join_err, "health check database probe crashed");
            STATUS_ERROR
        }
    };

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "up",
            db_status,
            llm_status,
        }),
    )
}
