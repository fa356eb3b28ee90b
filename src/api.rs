// ===============================
// src/api.rs
// ===============================
//
// HTTP API (hyper 0.14):
//   POST /predict  -> rekomendasi harga (JSON)
//   GET  /         -> liveness
//   GET  /metrics  -> Prometheus text
//   OPTIONS *      -> CORS preflight
// CORS terbuka untuk semua origin.
//
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::domain::{Event, PricingRequest, RecommendationEvent};
use crate::metrics::{HTTP_REQUESTS, LAT_PREDICT, RECOMMENDATIONS, RECOMMENDATIONS_UPLIFT};
use crate::predictor::DemandPredictor;
use crate::pricing;

pub const LIVENESS_MESSAGE: &str = "PriceOptima API is Running!";

/// Dibangun sekali di main, read-only selama proses hidup.
pub struct AppContext {
    pub predictor: DemandPredictor,
    pub recorder: Option<mpsc::Sender<Event>>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request body: {0}")]
    Validation(#[from] serde_json::Error),
    #[error("failed to read request body: {0}")]
    Body(#[from] hyper::Error),
    #[error("not found")]
    NotFound,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Body(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

fn with_cors(mut resp: Response<Body>) -> Response<Body> {
    let h = resp.headers_mut();
    h.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    h.insert("access-control-allow-methods", HeaderValue::from_static("*"));
    h.insert("access-control-allow-headers", HeaderValue::from_static("*"));
    resp
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    let bytes = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    let mut resp = Response::new(Body::from(bytes));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    resp
}

fn error_response(err: &ApiError) -> Response<Body> {
    json_response(err.status(), &json!({ "detail": err.to_string() }))
}

async fn predict(req: Request<Body>, ctx: &AppContext) -> Result<Response<Body>, ApiError> {
    let started = Instant::now();
    let bytes = hyper::body::to_bytes(req.into_body()).await?;
    let input: PricingRequest = serde_json::from_slice(&bytes)?;

    let rec = pricing::recommend(&ctx.predictor, &input);
    RECOMMENDATIONS.inc();
    if rec.uplift_detected {
        RECOMMENDATIONS_UPLIFT.inc();
    }
    LAT_PREDICT.observe(started.elapsed().as_secs_f64() * 1000.0);

    if let Some(tx) = &ctx.recorder {
        let ev = Event::Recommendation(RecommendationEvent {
            ts: Utc::now(),
            request: input,
            recommendation: rec.clone(),
            predictor: ctx.predictor.kind().to_string(),
        });
        if tx.try_send(ev).is_err() {
            warn!("recorder channel full or closed, event dropped");
        }
    }

    Ok(json_response(StatusCode::OK, &rec))
}

/// Router utama. Tidak pernah gagal: semua error dipetakan ke response JSON.
pub async fn handle(req: Request<Body>, ctx: Arc<AppContext>) -> Result<Response<Body>, Infallible> {
    let route = match (req.method(), req.uri().path()) {
        (&Method::OPTIONS, _) => "preflight",
        (&Method::GET, "/") => "home",
        (&Method::GET, "/metrics") => "metrics",
        (&Method::POST, "/predict") => "predict",
        _ => "unknown",
    };

    let result = match route {
        "preflight" => {
            let mut resp = Response::new(Body::empty());
            *resp.status_mut() = StatusCode::NO_CONTENT;
            Ok(resp)
        }
        "home" => Ok(json_response(StatusCode::OK, &json!({ "message": LIVENESS_MESSAGE }))),
        "metrics" => {
            let mut resp = Response::new(Body::from(crate::metrics::encode_metrics()));
            resp.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
            );
            Ok(resp)
        }
        "predict" => predict(req, &ctx).await,
        _ => Err(ApiError::NotFound),
    };

    let resp = match result {
        Ok(r) => r,
        Err(e) => {
            warn!(route, error = %e, "request rejected");
            error_response(&e)
        }
    };
    HTTP_REQUESTS
        .with_label_values(&[route, resp.status().as_str()])
        .inc();
    Ok(with_cors(resp))
}

pub async fn serve(addr: SocketAddr, ctx: Arc<AppContext>) -> Result<(), hyper::Error> {
    let make_svc = make_service_fn(move |_conn| {
        let ctx = ctx.clone();
        async move { Ok::<_, Infallible>(service_fn(move |req| handle(req, ctx.clone()))) }
    });

    let server = Server::try_bind(&addr)?.serve(make_svc);
    info!(%addr, "pricing API listening");

    server
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
}
