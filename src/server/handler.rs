// src/server/handler.rs
use crate::aggregator::Aggregator;
use crate::registry::Registry;
use crate::reporter;
use hyper::{header, Body, Method, Request, Response, StatusCode};
use std::sync::Arc;
use tower::Service;
use tracing::{debug, error};
use uuid::Uuid;

/// Everything a request needs: the immutable registry and the aggregator
/// that probes it. Shared read-only across connections.
pub struct AppState {
    pub registry: Registry,
    pub aggregator: Aggregator,
}

#[derive(Clone)]
pub struct RequestHandler {
    state: Arc<AppState>,
}

impl RequestHandler {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

impl Service<Request<Body>> for RequestHandler {
    type Response = Response<Body>;
    type Error = Box<dyn std::error::Error + Send + Sync>;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let state = self.state.clone();

        Box::pin(async move {
            let request_id = Uuid::new_v4();
            debug!("[{}] {} {}", request_id, req.method(), req.uri().path());

            let response = match (req.method(), req.uri().path()) {
                (&Method::GET, "/health") => json_response(reporter::render_self_check()?),

                // The HTTP status reflects transport success, never
                // downstream health; `ok` lives in the body.
                (&Method::GET, "/status") => {
                    match state.aggregator.aggregate(&state.registry).await {
                        Ok(snapshot) => json_response(reporter::render(&snapshot)?),
                        Err(e) => {
                            error!("[{}] aggregation refused: {}", request_id, e);
                            error_response()
                        }
                    }
                }

                (&Method::GET, "/dashboard") => {
                    match state.aggregator.aggregate(&state.registry).await {
                        Ok(snapshot) => html_response(reporter::render_dashboard(&snapshot)),
                        Err(e) => {
                            error!("[{}] aggregation refused: {}", request_id, e);
                            error_response()
                        }
                    }
                }

                _ => Response::builder()
                    .status(StatusCode::NOT_FOUND)
                    .body(Body::from("Not Found"))
                    .unwrap(),
            };

            Ok(response)
        })
    }
}

fn json_response(body: String) -> Response<Body> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn html_response(body: String) -> Response<Body> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .body(Body::from(body))
        .unwrap()
}

// Only reachable through programmer error: the registry was validated before
// the server ever started.
fn error_response() -> Response<Body> {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .body(Body::from("Internal Server Error"))
        .unwrap()
}
