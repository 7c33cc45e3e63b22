use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderName, Method};
use tower_http::cors::{Any, CorsLayer};

use crate::config::AppConfig;

pub fn build_cors_layer(config: &AppConfig) -> CorsLayer {
    let headers = vec![ACCEPT, CONTENT_TYPE, HeaderName::from_static("x-request-id")];

    let mut layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(headers)
        .expose_headers([HeaderName::from_static("x-request-id")]);

    if config
        .cors_origins
        .iter()
        .any(|origin| origin.trim() == "*")
    {
        layer = layer.allow_origin(Any).allow_credentials(false);
    } else {
        let origins = config
            .cors_origins
            .iter()
            .filter_map(|origin| origin.trim().parse().ok())
            .collect::<Vec<_>>();
        layer = layer.allow_origin(origins);
    }

    layer
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request, routing::get, Router};
    use tower::ServiceExt;

    use super::build_cors_layer;
    use crate::config::AppConfig;

    #[tokio::test]
    async fn allows_configured_origin_only() {
        let config = AppConfig {
            cors_origins: vec!["https://staybook.example".to_string()],
            ..AppConfig::default()
        };
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(build_cors_layer(&config));

        let allowed = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("origin", "https://staybook.example")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(
            allowed
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("https://staybook.example")
        );

        let denied = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("origin", "https://elsewhere.example")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert!(denied.headers().get("access-control-allow-origin").is_none());
    }
}
