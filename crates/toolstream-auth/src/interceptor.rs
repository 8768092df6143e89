//! tonic interceptor attaching claims to incoming requests.

use std::sync::Arc;

use tonic::metadata::MetadataMap;
use tonic::service::Interceptor;
use tonic::{Request, Status};
use tracing::warn;

use crate::claims::{Action, Claims};
use crate::error::AuthError;
use crate::jwt::JwtValidator;

/// Extracts and validates the bearer token, attaching [`Claims`] to the
/// request extensions.
///
/// With `require_auth` a missing token rejects the request; without it a
/// token-less request passes through unauthenticated, but a token that is
/// present must still validate.
#[derive(Clone)]
pub struct AuthInterceptor {
    validator: Arc<JwtValidator>,
    require_auth: bool,
}

impl AuthInterceptor {
    pub fn new(validator: Arc<JwtValidator>, require_auth: bool) -> Self {
        Self {
            validator,
            require_auth,
        }
    }
}

impl Interceptor for AuthInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        match bearer_token(request.metadata()) {
            Some(token) => {
                let claims = self.validator.validate(token).map_err(|e| {
                    warn!(error = %e, "rejected bearer token");
                    Status::from(e)
                })?;
                request.extensions_mut().insert(claims);
                Ok(request)
            }
            None if self.require_auth => Err(AuthError::MissingToken.into()),
            None => Ok(request),
        }
    }
}

fn bearer_token(metadata: &MetadataMap) -> Option<&str> {
    metadata
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Handler-side authorization check.
///
/// When the request carries claims they must grant `action` on `subject`;
/// a request without claims (auth disabled or optional) passes.
pub fn authorize<T>(request: &Request<T>, action: Action, subject: &str) -> Result<(), Status> {
    if let Some(claims) = request.extensions().get::<Claims>() {
        if !claims.allows(action, subject) {
            warn!(
                client_id = %claims.client_id,
                action = action.as_str(),
                subject,
                "permission denied"
            );
            return Err(AuthError::PermissionDenied {
                action: action.as_str(),
                subject: subject.to_string(),
            }
            .into());
        }
    }
    Ok(())
}
