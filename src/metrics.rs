// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- HTTP --------
pub static HTTP_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_requests_total", "HTTP requests (labels: route, status)"),
        &["route", "status"],
    )
    .unwrap()
});

// -------- Pricing --------
pub static RECOMMENDATIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("recommendations_total", "price recommendations served").unwrap()
});

pub static RECOMMENDATIONS_UPLIFT: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "recommendations_uplift_total",
        "recommendations where the price changed",
    )
    .unwrap()
});

pub static CANDIDATES_EVALUATED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("candidates_evaluated_total", "candidate prices evaluated").unwrap()
});

pub static MODEL_FALLBACKS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "model_fallback_total",
        "model predict failures recovered by the linear formula",
    )
    .unwrap()
});

// Latency request -> recommendation (milliseconds)
pub static LAT_PREDICT: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(HistogramOpts::new(
        "predict_latency_ms",
        "Latency of the /predict price search (ms)",
    ))
    .unwrap()
});

// ---- Config visibility ----
pub static CONFIG_PREDICTOR: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("config_predictor", "active demand predictor (label: kind)"),
        &["kind"],
    )
    .unwrap()
});

pub fn init() {
    // Register all metrics to the custom registry
    for m in [
        REGISTRY.register(Box::new(HTTP_REQUESTS.clone())),
        REGISTRY.register(Box::new(RECOMMENDATIONS.clone())),
        REGISTRY.register(Box::new(RECOMMENDATIONS_UPLIFT.clone())),
        REGISTRY.register(Box::new(CANDIDATES_EVALUATED.clone())),
        REGISTRY.register(Box::new(MODEL_FALLBACKS.clone())),
        REGISTRY.register(Box::new(LAT_PREDICT.clone())),
        REGISTRY.register(Box::new(CONFIG_PREDICTOR.clone())),
    ] {
        let _ = m;
    }
}

// Encode all metrics in Prometheus text format
pub fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent_and_encodes() {
        init();
        init();
        RECOMMENDATIONS.inc();
        let text = String::from_utf8(encode_metrics()).unwrap();
        assert!(text.contains("recommendations_total"));
    }
}
