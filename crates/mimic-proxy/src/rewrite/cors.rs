//! CORS echo on proxy responses.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use hyper::{HeaderMap, Response, StatusCode};

/// Reflect the caller's `Origin` and allow credentials.
///
/// Echoing the exact origin (instead of `*`) is what lets the developer page
/// send credentialed requests through the proxy.
pub fn apply(headers: &mut HeaderMap, origin: Option<&str>) {
    let Some(origin) = origin else { return };
    let Ok(value) = HeaderValue::from_str(origin) else {
        return;
    };
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
    headers.insert(
        ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
}

/// Preflight answer for the API routes; sits around the rewrite state
/// machine, which never sees `OPTIONS`.
pub fn preflight(origin: Option<&str>) -> Response<Full<Bytes>> {
    let mut response = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, PUT, DELETE, OPTIONS")
        .header(ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type, Origin, Cookie")
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())));
    apply(response.headers_mut(), origin);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_echoed_with_credentials() {
        let mut headers = HeaderMap::new();
        apply(&mut headers, Some("http://fakeorigin.com"));
        assert_eq!(
            headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://fakeorigin.com"
        );
        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(), "true");
    }

    #[test]
    fn test_no_origin_no_headers() {
        let mut headers = HeaderMap::new();
        apply(&mut headers, None);
        assert!(headers.is_empty());
    }

    #[test]
    fn test_preflight_allows_api_methods() {
        let response = preflight(Some("http://ui.local"));
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.headers().contains_key(ACCESS_CONTROL_ALLOW_METHODS));
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://ui.local"
        );
    }
}
