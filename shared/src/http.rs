//! HTTP helpers for the site Lambda.

use lambda_http::{Body, Response};
use std::collections::HashMap;

/// Create an HTML response with the given status code.
pub fn html_response(status: u16, html: impl Into<String>) -> Result<Response<Body>, lambda_http::Error> {
    Ok(Response::builder()
        .status(status)
        .header("content-type", "text/html; charset=utf-8")
        .body(Body::from(html.into()))?)
}

/// 303 See Other, so browsers follow a form POST with a GET.
pub fn redirect(location: &str) -> Result<Response<Body>, lambda_http::Error> {
    Ok(Response::builder()
        .status(303)
        .header("location", location)
        .body(Body::Empty)?)
}

/// Percent-decode a path segment. Invalid UTF-8 is replaced rather than rejected.
pub fn decode_path_segment(raw: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(raw.as_bytes())).into_owned()
}

fn decode_component(raw: &str) -> String {
    decode_path_segment(&raw.replace('+', " "))
}

/// Decode an `application/x-www-form-urlencoded` body, keeping field order.
pub fn parse_form(body: &[u8]) -> Vec<(String, String)> {
    String::from_utf8_lossy(body)
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

/// Collapse decoded fields into a map; the last occurrence of a key wins.
pub fn form_map(fields: &[(String, String)]) -> HashMap<String, String> {
    fields.iter().cloned().collect()
}

/// Accept only same-site paths as redirect targets.
pub fn safe_redirect_target(candidate: &str) -> Option<String> {
    let candidate = candidate.trim();
    let is_local = candidate.starts_with('/')
        && !candidate.starts_with("//")
        && !candidate.contains('\\')
        && !candidate.chars().any(char::is_control);
    is_local.then(|| candidate.to_string())
}

/// Append query parameters to a path that may already carry some.
pub fn with_query(path: &str, params: &[(&str, &str)]) -> String {
    let mut url = path.to_string();
    for (key, value) in params {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(&urlencoding::encode(key));
        url.push('=');
        url.push_str(&urlencoding::encode(value));
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_form() {
        let fields = parse_form(b"name=Ada+Lovelace&email=ada%40example.com&message=hi%21+%F0%9F%8E%89&empty=&flag");
        assert_eq!(
            fields,
            vec![
                ("name".to_string(), "Ada Lovelace".to_string()),
                ("email".to_string(), "ada@example.com".to_string()),
                ("message".to_string(), "hi! 🎉".to_string()),
                ("empty".to_string(), String::new()),
                ("flag".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_parse_form_literal_plus_and_equals() {
        let fields = parse_form(b"math=1%2B1%3D2&eq=a=b");
        let map = form_map(&fields);
        assert_eq!(map["math"], "1+1=2");
        assert_eq!(map["eq"], "a=b");
    }

    #[test]
    fn test_decode_path_segment_keeps_plus() {
        assert_eq!(decode_path_segment("a+b%20c"), "a+b c");
    }

    #[test]
    fn test_parse_empty_body() {
        assert!(parse_form(b"").is_empty());
    }

    #[test]
    fn test_safe_redirect_target() {
        assert_eq!(safe_redirect_target("/events/1").as_deref(), Some("/events/1"));
        assert_eq!(safe_redirect_target("//evil.example"), None);
        assert_eq!(safe_redirect_target("https://evil.example"), None);
        assert_eq!(safe_redirect_target("/\\evil.example"), None);
        assert_eq!(safe_redirect_target("/ok\r\nSet-Cookie: x"), None);
        assert_eq!(safe_redirect_target(""), None);
    }

    #[test]
    fn test_with_query() {
        assert_eq!(
            with_query("/events/e1", &[("guestbook", "error"), ("reason", "schema")]),
            "/events/e1?guestbook=error&reason=schema"
        );
        assert_eq!(with_query("/thanks?from=form", &[("guestbook", "thanks")]), "/thanks?from=form&guestbook=thanks");
    }

    #[test]
    fn test_redirect_response() {
        let response = redirect("/events/e1?guestbook=thanks").unwrap();
        assert_eq!(response.status(), 303);
        assert_eq!(response.headers()["location"], "/events/e1?guestbook=thanks");
    }

    #[test]
    fn test_html_response() {
        let response = html_response(404, "<h1>nope</h1>").unwrap();
        assert_eq!(response.status(), 404);
        assert_eq!(response.headers()["content-type"], "text/html; charset=utf-8");
    }
}
