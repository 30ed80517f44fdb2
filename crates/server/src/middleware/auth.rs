//! Bearer token authentication.
//!
//! Access tokens are HS256 JWTs issued by the hosted auth provider. The `sub`
//! claim is the profile ID; admins carry `app_metadata.role = "admin"`.

use axum::{extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use secrecy::ExposeSecret;
use serde::Deserialize;
use uuid::Uuid;

use cyclemart_core::ProfileId;

use crate::config::AuthConfig;
use crate::error::{AppError, set_sentry_user};
use crate::state::AppState;

/// Role granted to marketplace staff.
pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Deserialize)]
struct Claims {
    sub: Uuid,
    email: Option<String>,
    #[serde(default)]
    app_metadata: AppMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct AppMetadata {
    role: Option<String>,
}

/// The caller identified by a valid access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: ProfileId,
    pub email: Option<String>,
    pub is_admin: bool,
}

/// Verify an access token and read the caller from it.
///
/// # Errors
///
/// Returns the `jsonwebtoken` error for bad signatures, wrong audience,
/// expired tokens or malformed claims.
pub fn verify_token(
    token: &str,
    config: &AuthConfig,
) -> Result<AuthUser, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[config.audience.as_str()]);

    let key = DecodingKey::from_secret(config.jwt_secret.expose_secret().as_bytes());
    let claims = decode::<Claims>(token, &key, &validation)?.claims;

    Ok(AuthUser {
        id: ProfileId::new(claims.sub),
        email: claims.email,
        is_admin: claims.app_metadata.role.as_deref() == Some(ADMIN_ROLE),
    })
}

/// Read the caller from the `Authorization` header, if any.
///
/// `Ok(None)` means no header; `Err` means a header that does not verify.
fn authenticate(parts: &Parts, state: &AppState) -> Result<Option<AuthUser>, AppError> {
    let Some(header) = parts.headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let token = header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization header".to_string()))?;

    let user = verify_token(token, &state.config().auth).map_err(|e| {
        tracing::debug!(error = %e, "Rejected access token");
        AppError::Unauthorized("Invalid or expired token".to_string())
    })?;

    set_sentry_user(&user.id, user.email.as_deref());
    Ok(Some(user))
}

/// Extractor that requires a valid access token.
///
/// # Example
///
/// ```rust,ignore
/// async fn my_orders(RequireAuth(user): RequireAuth) -> Result<Json<Vec<Order>>> {
///     // user.id is the caller's profile
/// }
/// ```
pub struct RequireAuth(pub AuthUser);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state)?
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

/// Extractor that requires a marketplace admin.
///
/// Unauthenticated callers get 401, authenticated non-admins 403.
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        Ok(Self(user))
    }
}

/// Extractor that optionally gets the caller.
///
/// A missing header is `None`; a header that does not verify is still a 401.
pub struct OptionalAuth(pub Option<AuthUser>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).map(Self)
    }
}
