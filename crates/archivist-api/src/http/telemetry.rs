//! Request counting keyed by route template.

use archivist_telemetry::Metrics;
use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;

/// Label used when a request reached the middleware without a matched route.
const UNROUTED: &str = "unmatched";

/// Count the request under its route template once the handler has answered.
///
/// Mounted with `route_layer`, so streamed archive bodies are counted when headers
/// leave, not when the download ends.
pub(crate) async fn count_requests(
    State(telemetry): State<Metrics>,
    request: Request,
    next: Next,
) -> Response {
    let route = route_label(request.extensions().get::<MatchedPath>());
    let response = next.run(request).await;
    telemetry.inc_http_request(&route, response.status().as_u16());
    response
}

fn route_label(matched: Option<&MatchedPath>) -> String {
    matched.map_or_else(|| UNROUTED.to_string(), |path| path.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{self, StatusCode};
    use axum::middleware::from_fn_with_state;
    use axum::routing::get;
    use tower::ServiceExt;

    #[tokio::test]
    async fn requests_are_labelled_by_template_not_raw_path() -> Result<(), Box<dyn std::error::Error>>
    {
        let telemetry = Metrics::new()?;
        let router = Router::new()
            .route("/archive/{identifier}/", get(|| async { StatusCode::ACCEPTED }))
            .route_layer(from_fn_with_state(telemetry.clone(), count_requests));

        for identifier in ["7kna", "8mpr"] {
            let request = http::Request::builder()
                .uri(format!("/archive/{identifier}/"))
                .body(Body::empty())?;
            let response = router.clone().oneshot(request).await?;
            assert_eq!(response.status(), StatusCode::ACCEPTED);
        }

        let rendered = telemetry.render()?;
        let line = rendered
            .lines()
            .find(|line| line.starts_with("http_requests_total"))
            .ok_or("http_requests_total missing")?;
        assert!(line.contains("route=\"/archive/{identifier}/\""));
        assert!(line.contains("code=\"202\""));
        assert!(line.ends_with(" 2"));
        assert!(!rendered.contains("7kna"));
        Ok(())
    }

    #[test]
    fn missing_match_falls_back_to_unrouted() {
        assert_eq!(route_label(None), UNROUTED);
    }
}
