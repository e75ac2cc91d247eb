//! src/bin/demo_service.rs
//! Run: cargo run --bin demo_service -- <port> [name] [delay_ms] [jitter_ms]
//!
//! A fake downstream service for driving the aggregator by hand: answers
//! `/health` after a configurable delay, and `/toggle` flips it between
//! healthy and unhealthy.

use hyper::{
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server, StatusCode,
};
use rand::Rng;
use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::time::sleep;

#[derive(Clone)]
struct DemoState {
    name: String,
    req_counter: Arc<AtomicU64>,
    healthy_flag: Arc<AtomicBool>,
    base_delay: u64,
    jitter_ms: u64,
}

async fn handle(req: Request<Body>, state: DemoState) -> Result<Response<Body>, Infallible> {
    let n = state.req_counter.fetch_add(1, Ordering::SeqCst) + 1;
    let path = req.uri().path().to_owned();

    match path.as_str() {
        "/health" => {
            // Simulate latency so timeout handling can be exercised
            let delay = state.base_delay
                + if state.jitter_ms > 0 {
                    rand::thread_rng().gen_range(0..=state.jitter_ms)
                } else {
                    0
                };
            if delay > 0 {
                sleep(Duration::from_millis(delay)).await;
            }

            if state.healthy_flag.load(Ordering::SeqCst) {
                println!("[{}] #{} /health -> 200 ({}ms)", state.name, n, delay);
                Ok(Response::new(Body::from("OK")))
            } else {
                println!("[{}] #{} /health -> 503 ({}ms)", state.name, n, delay);
                Ok(Response::builder()
                    .status(StatusCode::SERVICE_UNAVAILABLE)
                    .body(Body::from("Unhealthy"))
                    .unwrap())
            }
        }
        "/toggle" => {
            let healthy = !state.healthy_flag.fetch_xor(true, Ordering::SeqCst);
            println!("[{}] now {}", state.name, if healthy { "healthy" } else { "unhealthy" });
            Ok(Response::new(Body::from(format!("healthy={}\n", healthy))))
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::from("Not Found"))
            .unwrap()),
    }
}

#[tokio::main]
async fn main() {
    let mut args = std::env::args().skip(1);
    let port: u16 = args
        .next()
        .and_then(|s| s.parse().ok())
        .expect("usage: demo_service <port> [name] [delay_ms] [jitter_ms]");
    let name = args.next().unwrap_or_else(|| format!("demo-{}", port));
    let base_delay: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    let jitter_ms: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(0);

    let state = DemoState {
        name: name.clone(),
        req_counter: Arc::new(AtomicU64::new(0)),
        healthy_flag: Arc::new(AtomicBool::new(true)),
        base_delay,
        jitter_ms,
    };

    let make_service = make_service_fn(move |_| {
        let state = state.clone();
        async move { Ok::<_, Infallible>(service_fn(move |req| handle(req, state.clone()))) }
    });

    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    println!("[{}] listening on http://{}/health", name, addr);

    if let Err(e) = Server::bind(&addr).serve(make_service).await {
        eprintln!("[{}] server error: {}", name, e);
    }
}
