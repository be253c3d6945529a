//! Администрирование таблицы задач.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::AppState;
use crate::{
    error::{ApiError, ApiResult, StoreError},
    schedule::{PartitionKey, SortKey, Task},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub owner_name: String,
    pub period: i64,
    pub day: i64,
    pub start_hour: i64,
    pub operation: String,
    pub duration: i64,
}

/// Задача партиции вместе с ключом сортировки.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEntry {
    pub day: i64,
    pub start_hour: i64,
    pub task: Task,
}

/// Ошибки стора превращаются в ответ. Остановленный цикл при работающем
/// сервере означает нарушение целостности: процесс останавливается.
fn store_failure(
    state: &AppState,
    err: StoreError,
) -> ApiError {
    if err.is_domain() {
        debug!(error = %err, "Schedule store rejected request");
        return err.into();
    }

    warn!(error = %err, "Schedule store request failed");
    if err == StoreError::Unavailable && !state.shutdown.is_cancelled() {
        state
            .shutdown_handle
            .signal_integrity_fault("schedule store stopped while serving requests");
    }
    err.into()
}

pub async fn create_task(
    State(state): State<AppState>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskEntry>)> {
    if req.owner_name.trim().is_empty() {
        return Err(ApiError::Validation("ownerName is required".into()));
    }
    if req.operation.trim().is_empty() {
        return Err(ApiError::Validation("operation is required".into()));
    }

    let partition = PartitionKey::new(req.owner_name.clone(), req.period);
    let sort = SortKey::new(req.day, req.start_hour);
    let task = Task::new(req.operation, req.start_hour, req.duration);

    state
        .store
        .create_task(partition, sort, task.clone())
        .await
        .map_err(|e| store_failure(&state, e))?;

    info!(
        owner = %req.owner_name,
        period = req.period,
        day = req.day,
        start_hour = req.start_hour,
        "Task created"
    );
    Ok((
        StatusCode::CREATED,
        Json(TaskEntry {
            day: req.day,
            start_hour: req.start_hour,
            task,
        }),
    ))
}

pub async fn read_task(
    State(state): State<AppState>,
    Path((owner, period, day, start_hour)): Path<(String, i64, i64, i64)>,
) -> ApiResult<Json<Task>> {
    let task = state
        .store
        .read_task(PartitionKey::new(owner, period), SortKey::new(day, start_hour))
        .await
        .map_err(|e| store_failure(&state, e))?;
    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Path((owner, period, day, start_hour)): Path<(String, i64, i64, i64)>,
) -> ApiResult<StatusCode> {
    state
        .store
        .delete_task(
            PartitionKey::new(owner.clone(), period),
            SortKey::new(day, start_hour),
        )
        .await
        .map_err(|e| store_failure(&state, e))?;

    debug!(%owner, period, day, start_hour, "Task deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Все задачи партиции в порядке ключей сортировки.
pub async fn read_partition(
    State(state): State<AppState>,
    Path((owner, period)): Path<(String, i64)>,
) -> ApiResult<Json<Vec<TaskEntry>>> {
    let partition = state
        .store
        .read_partition(PartitionKey::new(owner, period))
        .await
        .map_err(|e| store_failure(&state, e))?;

    let entries = partition
        .iter()
        .map(|(sort, task)| TaskEntry {
            day: sort.day(),
            start_hour: sort.start_hour(),
            task: task.clone(),
        })
        .collect();
    Ok(Json(entries))
}
