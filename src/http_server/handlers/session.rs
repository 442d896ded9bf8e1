use crate::{
    consts::SESSION_COOKIE,
    service::{CheckedContractRequest, EtherscanRequest, VerificationService},
    session::{PathContent, SessionStore, SessionView},
    Error,
};
use actix_web::{
    cookie::{Cookie, SameSite},
    web::{self, Json},
    HttpRequest, HttpResponse, ResponseError,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::instrument;
use uuid::Uuid;

pub struct SessionState {
    pub store: SessionStore,
    pub service: VerificationService,
}

#[derive(Debug, Deserialize)]
pub struct InputFilesRequest {
    pub files: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyCheckedRequest {
    pub contracts: Vec<CheckedContractRequest>,
}

fn session_id(request: &HttpRequest) -> Option<Uuid> {
    request
        .cookie(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
}

/// Sets the session cookie, on error responses as well.
fn respond(session_id: Uuid, result: Result<SessionView, Error>) -> HttpResponse {
    let mut response = match result {
        Ok(view) => HttpResponse::Ok().json(view),
        Err(err) => {
            if err.is_client_error() {
                tracing::debug!(err = %err, "request rejected");
            } else {
                tracing::error!(err = %err, "request failed");
            }
            err.error_response()
        }
    };
    let mut cookie = Cookie::new(SESSION_COOKIE, session_id.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    if let Err(err) = response.add_cookie(&cookie) {
        tracing::warn!(err = %err, "failed to set session cookie");
    }
    response
}

#[instrument(skip_all, fields(chain_id = %params.chain, address = %params.address), level = "debug")]
pub async fn verify_from_etherscan(
    request: HttpRequest,
    state: web::Data<SessionState>,
    params: Json<EtherscanRequest>,
) -> HttpResponse {
    let (id, session) = state.store.get_or_create(session_id(&request));
    let mut session = session.lock().await;
    let result = state
        .service
        .verify_from_etherscan(&mut session, &params)
        .await;
    respond(id, result)
}

#[instrument(skip_all, level = "debug")]
pub async fn add_input_files(
    request: HttpRequest,
    state: web::Data<SessionState>,
    params: Json<InputFilesRequest>,
) -> HttpResponse {
    let files = params
        .into_inner()
        .files
        .into_iter()
        .map(|(path, content)| PathContent::new(path, content))
        .collect();
    let (id, session) = state.store.get_or_create(session_id(&request));
    let mut session = session.lock().await;
    let result = state.service.add_input_files(&mut session, files).await;
    respond(id, result)
}

#[instrument(skip_all, level = "debug")]
pub async fn verify_checked(
    request: HttpRequest,
    state: web::Data<SessionState>,
    params: Json<VerifyCheckedRequest>,
) -> HttpResponse {
    let (id, session) = state.store.get_or_create(session_id(&request));
    let mut session = session.lock().await;
    let result = state
        .service
        .verify_checked(&mut session, params.into_inner().contracts)
        .await;
    respond(id, result)
}

pub async fn data(request: HttpRequest, state: web::Data<SessionState>) -> HttpResponse {
    let (id, session) = state.store.get_or_create(session_id(&request));
    let session = session.lock().await;
    respond(id, Ok(SessionView::from(&*session)))
}
