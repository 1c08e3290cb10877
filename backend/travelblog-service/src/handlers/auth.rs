/// Session endpoints
use crate::auth::{SessionProvider, SignInRequest, SignUpRequest};
use crate::error::Result;
use crate::middleware::CurrentUser;
use crate::AppState;
use actix_web::{web, HttpResponse};

/// Create an account and start a session
pub async fn sign_up(
    state: web::Data<AppState>,
    req: web::Json<SignUpRequest>,
) -> Result<HttpResponse> {
    let session = SessionProvider::new(state.auth.clone());
    let created = session.sign_up(req.into_inner()).await?;
    Ok(HttpResponse::Created().json(created))
}

pub async fn sign_in(
    state: web::Data<AppState>,
    req: web::Json<SignInRequest>,
) -> Result<HttpResponse> {
    let session = SessionProvider::new(state.auth.clone());
    let started = session.sign_in(req.into_inner()).await?;
    Ok(HttpResponse::Ok().json(started))
}

/// Revoke the token this request was made with
pub async fn sign_out(state: web::Data<AppState>, current: CurrentUser) -> Result<HttpResponse> {
    let session = SessionProvider::new(state.auth.clone());
    session.restore(Some(&current.token)).await?;
    session.sign_out().await?;

    Ok(HttpResponse::NoContent().finish())
}

pub async fn me(current: CurrentUser) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(current.user))
}
