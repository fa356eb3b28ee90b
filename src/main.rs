// ===============================
// src/main.rs
// ===============================
/*
 cd /home/kukuhtw/rust/price_optima

 # backtest (seed wajib kalau dataset tidak punya kolom qty dan hasil harus reproducible)
 cargo run --release -- backtest --input dataSet/retail_price.csv --seed 42

 # API
 cargo run --release -- serve --port 8000
 curl -s localhost:8000/predict -H 'content-type: application/json' \
   -d '{"Unit_Price":25.5,"sales_lag_1d":3,"sales_rolling_avg_7d":3.5,"is_weekend":1}'
 curl -s localhost:8000/metrics | grep '^recommendations'
*/
/*
=============================================================================
Project : price_optima — dynamic pricing backtest & recommendation API
Module  : main.rs
Version : 0.1.0
Author  : Kukuh Tripamungkas Wicaksono (Kukuh TW)
Email   : kukuhtw@gmail.com
WhatsApp: https://wa.me/628129893706
LinkedIn: https://id.linkedin.com/in/kukuhtw
License : MIT (see LICENSE)

Summary : Backtests a rule-based repricing heuristic against historical
          sales (static vs dynamic revenue per day) and serves a price
          recommendation endpoint that searches fixed price multipliers
          through a demand model or a formula fallback.

(c) 2025 Kukuh TW. All rights reserved where applicable.
=============================================================================
*/
mod api;
mod backtest;
mod config;
mod domain;
mod metrics;
mod predictor;
mod pricing;
mod recorder;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, Command};
use crate::domain::Event;

#[tokio::main]
async fn main() {
    // ---- Logging ----
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Backtest(flags) => {
            let cfg = config::load_backtest(flags);
            info!(
                input = %cfg.input.display(),
                output = %cfg.output.display(),
                seed = ?cfg.seed,
                report_rows = cfg.report_rows,
                price_columns = ?cfg.columns.price,
                qty_columns = ?cfg.columns.qty,
                "backtest config"
            );
            if let Err(e) = backtest::run(&cfg) {
                error!(error = %e, "backtest aborted");
                std::process::exit(1);
            }
        }
        Command::Serve(flags) => {
            let cfg = config::load_serve(flags);
            if let Err(e) = serve(cfg).await {
                error!(error = %e, "server stopped");
                std::process::exit(1);
            }
        }
    }
}

async fn serve(cfg: config::ServeConfig) -> Result<(), Box<dyn std::error::Error>> {
    // ---- Metrics ----
    metrics::init();

    // ---- Predictor: dipilih sekali saat startup ----
    let predictor = predictor::DemandPredictor::load(&cfg.model_path);
    metrics::CONFIG_PREDICTOR
        .with_label_values(&[predictor.kind()])
        .set(1);

    let addr: SocketAddr = format!("{}:{}", cfg.bind_addr, cfg.port).parse()?;

    // ---- Recorder (optional) ----
    let (recorder, recorder_task) = match cfg.record_file.clone() {
        Some(path) => {
            let (tx, task) = recorder::spawn(path);
            let _ = tx.try_send(Event::Note(format!("startup predictor={}", predictor.kind())));
            (Some(tx), Some(task))
        }
        None => (None, None),
    };

    info!(
        bind = %cfg.bind_addr,
        port = cfg.port,
        model = %cfg.model_path.display(),
        predictor = predictor.kind(),
        record_file = ?cfg.record_file,
        "startup config"
    );

    let ctx = Arc::new(api::AppContext { predictor, recorder });
    // ctx di-drop saat serve selesai -> channel recorder tertutup -> flush terakhir
    let served = api::serve(addr, ctx).await;
    if let Some(task) = recorder_task {
        let _ = task.await;
    }
    served?;
    Ok(())
}
