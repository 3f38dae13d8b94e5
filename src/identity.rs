//! Middleware that resolves the caller's identity.
//!
//! Authentication happens upstream; this service only requires an opaque
//! numeric caller ID on every protected request.

use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{Error, UserID};

/// The request header that carries the caller's user ID.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Middleware that places the caller's [UserID] into the request extensions.
///
/// Responds with [Error::Unauthorized] if the header is missing or is not an integer.
///
/// **Note**: Route handlers can use the function argument `Extension(user_id): Extension<UserID>` to receive the user ID.
pub async fn identity_guard(mut request: Request, next: Next) -> Response {
    match get_user_id(request.headers()) {
        Some(user_id) => {
            request.extensions_mut().insert(user_id);
            next.run(request).await
        }
        None => {
            tracing::debug!("Rejecting request to {} without a caller ID", request.uri());
            Error::Unauthorized.into_response()
        }
    }
}

fn get_user_id(headers: &HeaderMap) -> Option<UserID> {
    headers
        .get(USER_ID_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
        .map(UserID::new)
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue};

    use crate::UserID;

    use super::{USER_ID_HEADER, get_user_id};

    #[test]
    fn parses_numeric_header() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("42"));

        assert_eq!(get_user_id(&headers), Some(UserID::new(42)));
    }

    #[test]
    fn missing_header_is_none() {
        assert_eq!(get_user_id(&HeaderMap::new()), None);
    }

    #[test]
    fn non_numeric_header_is_none() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("alice"));

        assert_eq!(get_user_id(&headers), None);
    }
}
