use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{Html, IntoResponse, Redirect, Response};

use crate::auth::{self, MaybeAuthUser};
use crate::repo::session_repo::SessionRepo;
use crate::utils::error::AppError;
use crate::AppState;

const LOGIN_PAGE: &str = r#"<!doctype html>
<html>
  <head><title>Sign in</title></head>
  <body>
    <h1>Sign in</h1>
    <p><a href="/social-auth/login/">Continue with your OAuth provider</a></p>
  </body>
</html>"#;

/// Credential exchange happens in the external OAuth flow; this page
/// only points at it.
pub async fn login_page() -> Html<&'static str> {
    Html(LOGIN_PAGE)
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if let Some(token) = auth::session_token(&headers) {
        if let Some(session) = SessionRepo::new(&state.pool).delete(&token).await? {
            tracing::info!(user_id = %session.user_id, "Session terminated");
        }
    }

    let mut response = Redirect::to("/login/").into_response();
    response.headers_mut().insert(
        SET_COOKIE,
        HeaderValue::from_static("session=; Max-Age=0; Path=/; HttpOnly"),
    );
    Ok(response)
}

pub async fn home(caller: MaybeAuthUser) -> Response {
    match caller.0 {
        Some(user) => Html(format!(
            "<!doctype html>\n<html>\n  <head><title>Events</title></head>\n  <body>\n    \
             <h1>Welcome, {}</h1>\n    <p><a href=\"/api/v1/events/\">Browse events</a> \
             &middot; <a href=\"/logout/\">Log out</a></p>\n  </body>\n</html>",
            user.username
        ))
        .into_response(),
        None => Redirect::to("/login/").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn login_page_links_to_the_oauth_flow() {
        let Html(body) = login_page().await;
        assert!(body.contains("/social-auth/login/"));
    }
}
