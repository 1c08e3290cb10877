/// HTTP middleware for travelblog-service
///
/// `AuthMiddleware` is the route guard: it resolves `Authorization: Bearer`
/// tokens through a `SessionProvider` and stores the signed-in user in the
/// request extensions as `CurrentUser`.
use crate::auth::{AuthProvider, SessionProvider};
use crate::error::AppError;
use crate::models::UserIdentity;
use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{
    error::ErrorUnauthorized, Error, FromRequest, HttpMessage, HttpRequest, ResponseError,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

/// Signed-in user and the token that authenticated the request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: UserIdentity,
    pub token: String,
}

/// Actix middleware that requires a valid, unrevoked session token.
pub struct AuthMiddleware {
    auth: Arc<dyn AuthProvider>,
}

impl AuthMiddleware {
    pub fn new(auth: Arc<dyn AuthProvider>) -> Self {
        Self { auth }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
            auth: self.auth.clone(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
    auth: Arc<dyn AuthProvider>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let auth = self.auth.clone();

        Box::pin(async move {
            match authenticate(req.request(), auth).await {
                Ok(current) => {
                    req.extensions_mut().insert(current);
                    service
                        .call(req)
                        .await
                        .map(ServiceResponse::map_into_left_body)
                }
                Err(err) => {
                    tracing::debug!(path = %req.path(), "request rejected: {}", err);
                    let response = err.error_response();
                    Ok(req.into_response(response).map_into_right_body())
                }
            }
        })
    }
}

async fn authenticate(
    req: &HttpRequest,
    auth: Arc<dyn AuthProvider>,
) -> Result<CurrentUser, AppError> {
    let token = bearer_token(req)
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

    let session = SessionProvider::new(auth);
    let user = session
        .restore(Some(&token))
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".to_string()))?;

    Ok(CurrentUser { user, token })
}

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

impl FromRequest for CurrentUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<CurrentUser>()
                .cloned()
                .ok_or_else(|| ErrorUnauthorized("Not signed in")),
        )
    }
}
