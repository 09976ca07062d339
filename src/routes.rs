use actix_web::cookie::Cookie;
use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest, HttpResponse, Responder};
use log::{info, warn};
use parking_lot::{Mutex, MutexGuard};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::future::{ready, Ready};
use std::sync::Arc;
use uuid::Uuid;

use crate::client::SolverClient;
use crate::config::ValidationPolicy;
use crate::dataset::DatasetUpload;
use crate::error::{Result, StudioError};
use crate::models::{
    ConstraintRow, DatasetKind, DatasetTable, DecisionVariable, Objective, ProblemMeta,
};
use crate::render::{SolveView, DEFAULT_PAGE_SIZE};
use crate::session::Session;

/// Request header naming the caller's session.
pub const SESSION_HEADER: &str = "x-session-id";
/// Cookie set by `POST /sessions`, read when the header is absent.
pub const SESSION_COOKIE: &str = "studio_session";
/// Session used by requests that name none.
pub const DEFAULT_SESSION: &str = "default";

/// Shared by every worker: the sessions by id and the client for the solver.
pub struct AppState {
    sessions: Mutex<HashMap<String, Arc<Mutex<Session>>>>,
    meta: ProblemMeta,
    policy: ValidationPolicy,
    pub client: SolverClient,
}

impl AppState {
    pub fn new(meta: ProblemMeta, policy: ValidationPolicy, client: SolverClient) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            meta,
            policy,
            client,
        }
    }

    /// The session called `id`, created blank on first use.
    pub fn session(&self, id: &str) -> Arc<Mutex<Session>> {
        let mut sessions = self.sessions.lock();
        sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                info!("opening session {}", id);
                Arc::new(Mutex::new(Session::new(self.meta.clone(), self.policy)))
            })
            .clone()
    }

    /// Start a session under a fresh random id.
    pub fn open_session(&self) -> String {
        let id = Uuid::new_v4().to_string();
        self.session(&id);
        id
    }

    /// Forget a session. Returns false when no such session existed.
    pub fn close_session(&self, id: &str) -> bool {
        self.sessions.lock().remove(id).is_some()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }
}

pub type State = web::Data<AppState>;

/// The caller's session, resolved from the `X-Session-Id` header, then the
/// `studio_session` cookie, then [`DEFAULT_SESSION`].
pub struct SessionHandle {
    id: String,
    session: Arc<Mutex<Session>>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Never hold the guard across an `.await`.
    pub fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock()
    }
}

fn session_id(req: &HttpRequest) -> String {
    req.headers()
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| req.cookie(SESSION_COOKIE).map(|c| c.value().to_string()))
        .unwrap_or_else(|| DEFAULT_SESSION.to_string())
}

impl FromRequest for SessionHandle {
    type Error = actix_web::Error;
    type Future = Ready<std::result::Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let handle = match req.app_data::<State>() {
            Some(state) => {
                let id = session_id(req);
                Ok(SessionHandle {
                    session: state.session(&id),
                    id,
                })
            }
            None => Err(actix_web::error::ErrorInternalServerError(
                "studio state is not configured",
            )),
        };
        ready(handle)
    }
}

/// Register every studio route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(root_redirect))
        .route("/health", web::get().to(health_check))
        .route("/docs", web::get().to(docs))
        .route("/solver/health", web::get().to(solver_health))
        .route("/sessions", web::post().to(open_session))
        .route("/sessions/current", web::delete().to(close_session))
        .route("/rows", web::get().to(list_rows))
        .route("/rows/decision-variables", web::post().to(add_decision_variable))
        .route("/rows/decision-variables/{index}", web::put().to(update_decision_variable))
        .route("/rows/decision-variables/{index}", web::delete().to(remove_decision_variable))
        .route("/rows/objectives", web::post().to(add_objective))
        .route("/rows/objectives/{index}", web::put().to(update_objective))
        .route("/rows/objectives/{index}", web::delete().to(remove_objective))
        .route("/rows/constraints", web::post().to(add_constraint))
        .route("/rows/constraints/{index}", web::put().to(update_constraint))
        .route("/rows/constraints/{index}", web::delete().to(remove_constraint))
        .route("/datasets", web::post().to(upload_datasets))
        .route("/datasets/{kind}", web::get().to(dataset_page))
        .route("/document", web::get().to(document))
        .route("/validation", web::get().to(validation))
        .route("/problem", web::post().to(submit_problem))
        .route("/solve", web::post().to(solve))
        .route("/result", web::get().to(last_result));
}

/// JSON extractor settings: size limit and `{ "error": ... }` bodies for
/// malformed input.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default().limit(limit).error_handler(|err, _| {
        let err_string = err.to_string();
        actix_web::error::InternalError::from_response(
            err,
            HttpResponse::BadRequest().json(json!({ "error": err_string })),
        )
        .into()
    })
}

// ---------- misc ----------

/// GET /health
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("OK")
}

/// GET /docs
pub async fn docs() -> impl Responder {
    let docs_html = include_str!("../static/docs.html");
    HttpResponse::Ok().content_type("text/html").body(docs_html)
}

/// GET / - Redirect to docs
pub async fn root_redirect() -> impl Responder {
    HttpResponse::Found()
        .append_header(("Location", "/docs"))
        .finish()
}

/// GET /solver/health
///
/// Always 200; `reachable` says whether the solver answered its own health
/// route.
pub async fn solver_health(state: State) -> impl Responder {
    let solver = state.client.base_url().to_string();
    match state.client.health_check().await {
        Ok(reachable) => HttpResponse::Ok().json(json!({
            "solver": solver,
            "reachable": reachable,
        })),
        Err(e) => {
            warn!("solver at {} is unreachable: {}", solver, e);
            HttpResponse::Ok().json(json!({
                "solver": solver,
                "reachable": false,
                "error": e.to_string(),
            }))
        }
    }
}

// ---------- sessions ----------

/// POST /sessions
pub async fn open_session(state: State) -> impl Responder {
    let id = state.open_session();
    let cookie = Cookie::build(SESSION_COOKIE, id.clone())
        .path("/")
        .http_only(true)
        .finish();
    HttpResponse::Created()
        .cookie(cookie)
        .json(json!({ "session": id }))
}

/// DELETE /sessions/current
pub async fn close_session(state: State, req: HttpRequest) -> impl Responder {
    let id = session_id(&req);
    let closed = state.close_session(&id);
    HttpResponse::Ok().json(json!({ "session": id, "closed": closed }))
}

// ---------- rows ----------

/// GET /rows
pub async fn list_rows(session: SessionHandle) -> impl Responder {
    let session = session.lock();
    HttpResponse::Ok().json(session.builder().rows())
}

/// POST /rows/decision-variables
pub async fn add_decision_variable(session: SessionHandle) -> impl Responder {
    let mut session = session.lock();
    let index = session.builder_mut().add_decision_variable_row();
    HttpResponse::Created().json(json!({ "index": index, "row": DecisionVariable::default() }))
}

/// PUT /rows/decision-variables/{index}
pub async fn update_decision_variable(
    session: SessionHandle,
    index: web::Path<usize>,
    row: web::Json<DecisionVariable>,
) -> Result<HttpResponse> {
    let mut session = session.lock();
    let slot = session.builder_mut().decision_variable_mut(index.into_inner())?;
    *slot = row.into_inner();
    Ok(HttpResponse::Ok().json(&*slot))
}

/// DELETE /rows/decision-variables/{index}
pub async fn remove_decision_variable(
    session: SessionHandle,
    index: web::Path<usize>,
) -> Result<HttpResponse> {
    let removed = session
        .lock()
        .builder_mut()
        .remove_decision_variable_row(index.into_inner())?;
    Ok(HttpResponse::Ok().json(removed))
}

/// POST /rows/objectives
pub async fn add_objective(session: SessionHandle) -> impl Responder {
    let mut session = session.lock();
    let index = session.builder_mut().add_objective_row();
    HttpResponse::Created().json(json!({ "index": index, "row": Objective::default() }))
}

/// PUT /rows/objectives/{index}
pub async fn update_objective(
    session: SessionHandle,
    index: web::Path<usize>,
    row: web::Json<Objective>,
) -> Result<HttpResponse> {
    let mut session = session.lock();
    let slot = session.builder_mut().objective_mut(index.into_inner())?;
    *slot = row.into_inner();
    Ok(HttpResponse::Ok().json(&*slot))
}

/// DELETE /rows/objectives/{index}
pub async fn remove_objective(session: SessionHandle, index: web::Path<usize>) -> Result<HttpResponse> {
    let removed = session
        .lock()
        .builder_mut()
        .remove_objective_row(index.into_inner())?;
    Ok(HttpResponse::Ok().json(removed))
}

/// POST /rows/constraints
pub async fn add_constraint(session: SessionHandle) -> impl Responder {
    let mut session = session.lock();
    let index = session.builder_mut().add_constraint_row();
    HttpResponse::Created().json(json!({ "index": index, "row": ConstraintRow::default() }))
}

/// PUT /rows/constraints/{index}
pub async fn update_constraint(
    session: SessionHandle,
    index: web::Path<usize>,
    row: web::Json<ConstraintRow>,
) -> Result<HttpResponse> {
    let mut session = session.lock();
    let slot = session.builder_mut().constraint_mut(index.into_inner())?;
    *slot = row.into_inner();
    Ok(HttpResponse::Ok().json(&*slot))
}

/// DELETE /rows/constraints/{index}
pub async fn remove_constraint(session: SessionHandle, index: web::Path<usize>) -> Result<HttpResponse> {
    let removed = session
        .lock()
        .builder_mut()
        .remove_constraint_row(index.into_inner())?;
    Ok(HttpResponse::Ok().json(removed))
}

// ---------- datasets ----------

fn table_summary(table: &DatasetTable) -> serde_json::Value {
    json!({ "columns": table.columns(), "records": table.len() })
}

/// POST /datasets
///
/// Both files are parsed together on the blocking pool; the session only
/// sees the pair once both parses have succeeded.
pub async fn upload_datasets(
    session: SessionHandle,
    upload: web::Json<DatasetUpload>,
) -> Result<HttpResponse> {
    let upload = upload.into_inner();
    let (salas, horarios) = web::block(move || upload.parse())
        .await
        .map_err(|e| StudioError::Blocking(e.to_string()))??;

    info!(
        "datasets uploaded: {} salas, {} horarios",
        salas.len(),
        horarios.len()
    );
    let body = json!({
        "salas": table_summary(&salas),
        "horarios": table_summary(&horarios),
    });
    session.lock().publish_datasets(salas, horarios);

    Ok(HttpResponse::Ok().json(body))
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    page: Option<usize>,
    size: Option<usize>,
    field: Option<String>,
    filter: Option<String>,
}

/// GET /datasets/{kind}?page=&size=&field=&filter=
pub async fn dataset_page(
    session: SessionHandle,
    kind: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let kind: DatasetKind = kind.parse().map_err(StudioError::UnknownDataset)?;
    let page = query.page.unwrap_or(1);
    let size = query.size.unwrap_or(DEFAULT_PAGE_SIZE);

    let guard = session.lock();
    let grid = guard
        .grid(kind)
        .ok_or(StudioError::DatasetNotLoaded(kind))?;

    match (&query.field, &query.filter) {
        (Some(field), Some(needle)) => {
            let filtered = grid
                .filter(field, needle)
                .ok_or_else(|| StudioError::UnknownColumn(field.clone()))?;
            Ok(HttpResponse::Ok().json(filtered.page(page, size)))
        }
        _ => Ok(HttpResponse::Ok().json(grid.page(page, size))),
    }
}

// ---------- problem & solve ----------

/// GET /document
pub async fn document(session: SessionHandle) -> impl Responder {
    let document = session.lock().document();
    HttpResponse::Ok().json(document)
}

/// GET /validation
pub async fn validation(session: SessionHandle) -> impl Responder {
    let issues = session.lock().validation_issues();
    HttpResponse::Ok().json(json!({
        "valid": issues.is_empty(),
        "issues": issues,
        "messages": issues.iter().map(ToString::to_string).collect::<Vec<_>>(),
    }))
}

/// POST /problem
pub async fn submit_problem(state: State, session: SessionHandle) -> Result<HttpResponse> {
    let document = session.lock().prepare_submission()?;
    let ack = state.client.submit_problem(&document).await?;
    session.lock().record_ack(ack.clone());

    Ok(HttpResponse::Ok().json(json!({
        "message": "Problem created on the solver",
        "ack": ack,
    })))
}

/// POST /solve
pub async fn solve(state: State, session: SessionHandle) -> Result<HttpResponse> {
    let ticket = session.lock().begin_solve();
    let outcome = state.client.solve().await?;
    let view = SolveView::from_outcome(&outcome);
    let text = view.to_string();
    let current = session.lock().finish_solve(ticket, view.clone());

    Ok(HttpResponse::Ok().json(json!({
        "current": current,
        "view": view,
        "text": text,
    })))
}

/// GET /result
pub async fn last_result(session: SessionHandle) -> impl Responder {
    let session = session.lock();
    HttpResponse::Ok().json(session.last_solve())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        AppState::new(
            ProblemMeta::default(),
            ValidationPolicy::Warn,
            SolverClient::new("http://localhost:8080").unwrap(),
        )
    }

    #[test]
    fn test_session_is_created_once_per_id() {
        let state = state();
        let first = state.session("a");
        first.lock().builder_mut().add_constraint_row();

        let again = state.session("a");
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(state.session("b").lock().builder().rows().constraints.len(), 0);
        assert_eq!(state.session_count(), 2);
    }

    #[test]
    fn test_open_and_close_session() {
        let state = state();
        let id = state.open_session();
        assert!(Uuid::parse_str(&id).is_ok());
        assert_eq!(state.session_count(), 1);

        assert!(state.close_session(&id));
        assert!(!state.close_session(&id));
        assert_eq!(state.session_count(), 0);
    }
}
