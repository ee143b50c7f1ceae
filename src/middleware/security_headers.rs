use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, Response},
    middleware::Next,
};

// The API only ever returns JSON, so nothing may be loaded or framed from it.
const CSP: &str = "default-src 'none'; frame-ancestors 'none'";

const HEADERS: [(&str, &str); 3] = [
    ("content-security-policy", CSP),
    ("referrer-policy", "no-referrer"),
    ("x-content-type-options", "nosniff"),
];

/// Add security headers to every response unless a handler already set them.
pub async fn security_headers(req: Request<Body>, next: Next) -> Response<Body> {
    let mut res = next.run(req).await;

    for (name, value) in HEADERS {
        if res.headers().get(name).is_none() {
            res.headers_mut().insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }
    }

    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn adds_headers_without_overriding() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .route(
                "/custom",
                get(|| async { ([("referrer-policy", "same-origin")], "ok") }),
            )
            .layer(axum::middleware::from_fn(security_headers));

        let res = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.headers()["content-security-policy"], CSP);
        assert_eq!(res.headers()["x-content-type-options"], "nosniff");

        let res = app
            .oneshot(Request::builder().uri("/custom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.headers()["referrer-policy"], "same-origin");
    }
}
