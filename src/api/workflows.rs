//! Workflow CRUD endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::error::AppError;
use crate::server::AppState;
use crate::workflow::{
    CreateWorkflowRequest, UpdateWorkflowRequest, Workflow, WorkflowListResponse,
};

use super::Data;

/// POST /v1/workflows - Create a new workflow
#[tracing::instrument(
    name = "http.create_workflow",
    skip(state, request),
    fields(workflow_id = %request.id)
)]
pub async fn create_workflow(
    State(state): State<AppState>,
    Json(request): Json<CreateWorkflowRequest>,
) -> Result<(StatusCode, Json<Data<Workflow>>), AppError> {
    let workflow: Workflow = request.into();
    let created = state.workflows.create(workflow)?;
    Ok((StatusCode::CREATED, Json(Data::new(created))))
}

/// GET /v1/workflows - List all workflows
#[tracing::instrument(name = "http.list_workflows", skip(state))]
pub async fn list_workflows(State(state): State<AppState>) -> Json<Data<WorkflowListResponse>> {
    let workflows = state.workflows.list();
    let total = workflows.len();
    Json(Data::new(WorkflowListResponse { workflows, total }))
}

/// GET /v1/workflows/{id} - Get a specific workflow
#[tracing::instrument(name = "http.get_workflow", skip(state))]
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Data<Workflow>>, AppError> {
    let workflow = state.workflows.get(&id)?;
    Ok(Json(Data::new(workflow)))
}

/// PUT /v1/workflows/{id} - Update an existing workflow
#[tracing::instrument(name = "http.update_workflow", skip(state, request))]
pub async fn update_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateWorkflowRequest>,
) -> Result<Json<Data<Workflow>>, AppError> {
    let updated = state.workflows.update(&id, request)?;
    Ok(Json(Data::new(updated)))
}

/// DELETE /v1/workflows/{id} - Delete a workflow
#[tracing::instrument(name = "http.delete_workflow", skip(state))]
pub async fn delete_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.workflows.delete(&id)?;
    Ok(StatusCode::NO_CONTENT)
}
