use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use rusqlite::Connection;
use std::sync::Arc;
use uuid::Uuid;

use tenantnotes_api::db::notes;
use tenantnotes_api::service::{self, NoteAction, NoteLimitScope};
use tenantnotes_api::{CreateNoteRequest, MessageResponse, NoteResponse, UpdateNoteRequest};

use super::auth::AuthUser;
use crate::config::AppConfig;
use crate::error::ApiErr;
use crate::storage::{
    Db, find_tenant_by_id, note_from_row, sq_execute, sq_query_map, sq_query_opt, sq_query_row,
};

/// Notes that count against the free-plan ceiling for this caller.
pub(crate) fn quota_usage(
    conn: &Connection,
    scope: NoteLimitScope,
    user: &AuthUser,
) -> rusqlite::Result<i64> {
    let query = match scope {
        NoteLimitScope::User => notes::count_by_owner(&user.tenant_id, &user.user_id),
        NoteLimitScope::Tenant => notes::count_by_tenant(&user.tenant_id),
    };
    sq_query_row(conn, query, |row| row.get(0))
}

fn load_note(conn: &Connection, id: &str, tenant_id: &str) -> Result<NoteResponse, ApiErr> {
    sq_query_opt(conn, notes::get(id, tenant_id), note_from_row)
        .map_err(ApiErr::from_db("load note"))?
        .ok_or_else(|| ApiErr::not_found("Note not found"))
}

/// GET /api/notes: the caller's notes, newest first.
pub async fn list_notes(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<Vec<NoteResponse>>, ApiErr> {
    let conn = db.conn();
    if find_tenant_by_id(&conn, &user.tenant_id)
        .map_err(ApiErr::from_db("list notes tenant lookup"))?
        .is_none()
    {
        return Err(ApiErr::not_found("Tenant not found"));
    }

    let rows = sq_query_map(
        &conn,
        notes::list_by_owner(&user.tenant_id, &user.user_id),
        note_from_row,
    )
    .map_err(ApiErr::from_db("list notes"))?;

    Ok(Json(rows))
}

/// GET /api/notes/{id}
pub async fn get_note(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<NoteResponse>, ApiErr> {
    let conn = db.conn();
    let note = load_note(&conn, &id, &user.tenant_id)?;
    service::note_visible_to(&note.user_id, &user.user_id)?;
    Ok(Json(note))
}

/// POST /api/notes: create a note, enforcing the free-plan ceiling.
pub async fn create_note(
    State(db): State<Db>,
    State(config): State<Arc<AppConfig>>,
    user: AuthUser,
    body: Result<Json<CreateNoteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<NoteResponse>), ApiErr> {
    let Json(req) = body?;
    let title = service::validate_note_title(&req.title)?;

    // Count and insert under one guard.
    let conn = db.conn();

    let tenant = find_tenant_by_id(&conn, &user.tenant_id)
        .map_err(ApiErr::from_db("create note tenant lookup"))?
        .ok_or_else(|| ApiErr::not_found("Tenant not found"))?;

    if tenant.plan.note_limit().is_some() {
        let used = quota_usage(&conn, config.note_limit_scope, &user)
            .map_err(ApiErr::from_db("count notes"))?;
        if let Err(e) = service::check_note_quota(tenant.plan, used) {
            tracing::info!(
                "free plan limit reached: tenant={} user={} count={used}",
                tenant.slug,
                user.email
            );
            return Err(e.into());
        }
    }

    let id = Uuid::new_v4().to_string();
    sq_execute(
        &conn,
        notes::insert(&id, &title, &req.content, &user.user_id, &user.tenant_id),
    )
    .map_err(ApiErr::from_db("insert note"))?;

    let note = load_note(&conn, &id, &user.tenant_id)?;
    tracing::info!("note created: id={id} tenant={} user={}", tenant.slug, user.email);

    Ok((StatusCode::CREATED, Json(note)))
}

/// PUT /api/notes/{id}: partial update by the owner.
pub async fn update_note(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
    body: Result<Json<UpdateNoteRequest>, JsonRejection>,
) -> Result<Json<NoteResponse>, ApiErr> {
    let Json(req) = body?;
    let title = req
        .title
        .as_deref()
        .map(service::validate_note_title)
        .transpose()?;

    let conn = db.conn();
    let note = load_note(&conn, &id, &user.tenant_id)?;
    if let Err(e) = service::authorize_note_mutation(&note.user_id, &user.user_id, NoteAction::Update)
    {
        tracing::warn!("user {} tried to update note {id} owned by {}", user.user_id, note.user_id);
        return Err(e.into());
    }

    sq_execute(
        &conn,
        notes::update(&id, &user.tenant_id, title.as_deref(), req.content.as_deref()),
    )
    .map_err(ApiErr::from_db("update note"))?;

    let note = load_note(&conn, &id, &user.tenant_id)?;
    tracing::info!("note updated: id={id} user={}", user.email);
    Ok(Json(note))
}

/// DELETE /api/notes/{id}
pub async fn delete_note(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiErr> {
    let conn = db.conn();
    let note = load_note(&conn, &id, &user.tenant_id)?;
    if let Err(e) = service::authorize_note_mutation(&note.user_id, &user.user_id, NoteAction::Delete)
    {
        tracing::warn!("user {} tried to delete note {id} owned by {}", user.user_id, note.user_id);
        return Err(e.into());
    }

    let deleted = sq_execute(&conn, notes::delete(&id, &user.tenant_id))
        .map_err(ApiErr::from_db("delete note"))?;
    if deleted == 0 {
        return Err(ApiErr::not_found("Note not found"));
    }

    tracing::info!("note deleted: id={id} user={}", user.email);
    Ok(Json(MessageResponse::new("Note deleted successfully")))
}
