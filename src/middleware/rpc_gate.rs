//! RPC gate middleware
//! Mission: Run the interceptor in front of every handler and hand the admitted identity on

use crate::api::error::ApiError;
use crate::auth::{
    interceptor::{Admission, AuthContext, CallMetadata, Interceptor, AUTHORIZATION_HEADER, SECTION_HEADER},
    models::UserId,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Identity of an admitted protected call. Only present once the gate has run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub AuthContext);

impl Caller {
    pub fn user_id(&self) -> UserId {
        self.0.user_id
    }
}

pub async fn rpc_gate(
    State(interceptor): State<Arc<Interceptor>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let admission = {
        let headers = req.headers();
        let call = CallMetadata {
            method: req.uri().path(),
            authorization: header_str(headers, AUTHORIZATION_HEADER),
            section: header_str(headers, SECTION_HEADER),
        };
        interceptor.admit(&call).await?
    };

    if let Admission::Authorized(context) = admission {
        req.extensions_mut().insert(Caller(context));
    }

    // Handler errors pass through untouched
    Ok(next.run(req).await)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Caller>()
            .cloned()
            .ok_or(ApiError::Unauthenticated)
    }
}
