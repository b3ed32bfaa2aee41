pub mod policy;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::models::User;
use crate::repo::session_repo::SessionRepo;
use crate::utils::error::AppError;
use crate::AppState;

pub const SESSION_COOKIE: &str = "session";

/// Caller identity resolved from the session cookie. Rejects with 401
/// when the cookie is missing or does not match a live session.
pub struct AuthUser(pub User);

/// Like [`AuthUser`] but tolerates anonymous callers.
pub struct MaybeAuthUser(pub Option<User>);

impl MaybeAuthUser {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

/// Extracts the session token from the `Cookie` header, if any.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
        })
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers)
            .ok_or_else(|| AppError::Auth("authentication required".to_string()))?;
        let user = SessionRepo::new(&state.pool)
            .resolve(&token)
            .await?
            .ok_or_else(|| AppError::Auth("session is invalid or expired".to_string()))?;
        Ok(AuthUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = match session_token(&parts.headers) {
            Some(token) => SessionRepo::new(&state.pool).resolve(&token).await?,
            None => None,
        };
        Ok(MaybeAuthUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn finds_session_cookie_among_others() {
        let h = headers("theme=dark; session=abc123; lang=en");
        assert_eq!(session_token(&h), Some("abc123".to_string()));
    }

    #[test]
    fn missing_cookie_yields_none() {
        assert_eq!(session_token(&HeaderMap::new()), None);
        let h = headers("theme=dark");
        assert_eq!(session_token(&h), None);
    }

    #[test]
    fn empty_session_value_is_treated_as_absent() {
        let h = headers("session=; theme=dark");
        assert_eq!(session_token(&h), None);
    }

    #[test]
    fn similarly_named_cookies_do_not_match() {
        let h = headers("session_hint=abc; oldsession=def");
        assert_eq!(session_token(&h), None);
    }
}
