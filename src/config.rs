// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : price_optima — dynamic pricing backtest & recommendation API
Module  : config.rs
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
use std::env;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;

#[derive(Parser, Debug)]
#[command(name = "price_optima", version, about = "Dynamic pricing backtest & recommendation API")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Jalankan HTTP API rekomendasi harga
    Serve(ServeFlags),
    /// Backtest heuristik harga terhadap data penjualan historis
    Backtest(BacktestFlags),
}

#[derive(Args, Debug, Default)]
pub struct ServeFlags {
    #[arg(long)]
    pub bind: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(long)]
    pub model: Option<PathBuf>,
    #[arg(long)]
    pub record_file: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub struct BacktestFlags {
    #[arg(long)]
    pub input: Option<PathBuf>,
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Seed RNG untuk qty sintetis (tanpa seed hasil tidak deterministik)
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long)]
    pub report_rows: Option<usize>,
}

// ===== Column mapping =====
//
// Urutan fallback: alias pertama di list yang sama persis dengan header
// (setelah normalisasi) yang menang. Jika beberapa header menghasilkan alias
// yang sama, header paling kiri yang dipakai.
pub const DEFAULT_PRICE_COLUMNS: &[&str] =
    &["unit_price", "price", "sale_price", "selling_price", "current_price"];
pub const DEFAULT_QTY_COLUMNS: &[&str] = &[
    "qty",
    "quantity",
    "inventory",
    "stock",
    "qty_sold",
    "quantity_sold",
    "stock_level",
    "inventory_level",
];
pub const DEFAULT_DAY_COLUMNS: &[&str] = &["day"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnMapping {
    pub price: Vec<String>,
    pub qty: Vec<String>,
    pub day: Vec<String>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        let own = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect();
        Self {
            price: own(DEFAULT_PRICE_COLUMNS),
            qty: own(DEFAULT_QTY_COLUMNS),
            day: own(DEFAULT_DAY_COLUMNS),
        }
    }
}

impl ColumnMapping {
    /// Baca alias dari `PRICE_COLUMNS`, `QTY_COLUMNS`, `DAY_COLUMNS` (comma separated).
    pub fn from_env() -> Self {
        let mut mapping = Self::default();
        if let Some(v) = alias_list("PRICE_COLUMNS") {
            mapping.price = v;
        }
        if let Some(v) = alias_list("QTY_COLUMNS") {
            mapping.qty = v;
        }
        if let Some(v) = alias_list("DAY_COLUMNS") {
            mapping.day = v;
        }
        mapping
    }
}

fn alias_list(key: &str) -> Option<Vec<String>> {
    env::var(key)
        .ok()
        .map(|s| parse_alias_list(&s))
        .filter(|v| !v.is_empty())
}

/// "Unit Price, qty" -> ["unit_price", "qty"]
pub fn parse_alias_list(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for alias in raw.split(',').map(crate::backtest::normalize_header) {
        // duplikat dibuang, kemunculan pertama yang menentukan urutan
        if !alias.is_empty() && !out.contains(&alias) {
            out.push(alias);
        }
    }
    out
}

// ===== Settings =====
#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind_addr: String,
    pub port: u16,
    pub model_path: PathBuf,
    pub record_file: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct BacktestConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub seed: Option<u64>,
    pub report_rows: usize,
    pub preview_rows: usize,
    pub columns: ColumnMapping,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

pub fn load_serve(flags: ServeFlags) -> ServeConfig {
    // Pastikan .env dibaca (MODEL_PATH, PORT, RECORD_FILE, dll)
    let _ = dotenv();

    let bind_addr = flags
        .bind
        .or_else(|| env::var("BIND_ADDR").ok())
        .unwrap_or_else(|| "0.0.0.0".to_string());
    let port = flags.port.or_else(|| env_parse("PORT")).unwrap_or(8000);
    let model_path = flags
        .model
        .or_else(|| env::var("MODEL_PATH").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("price_optimization_model.json"));
    let record_file = flags
        .record_file
        .or_else(|| env::var("RECORD_FILE").ok().map(PathBuf::from));

    ServeConfig { bind_addr, port, model_path, record_file }
}

pub fn load_backtest(flags: BacktestFlags) -> BacktestConfig {
    let _ = dotenv();

    let input = flags
        .input
        .or_else(|| env::var("BACKTEST_INPUT").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("dataSet/retail_price.csv"));
    let output = flags
        .output
        .or_else(|| env::var("BACKTEST_OUTPUT").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("dataSet/revenue_comparison.csv"));
    let seed = flags.seed.or_else(|| env_parse("BACKTEST_SEED"));
    let report_rows = flags.report_rows.or_else(|| env_parse("REPORT_ROWS")).unwrap_or(10);
    let preview_rows = env_parse("PREVIEW_ROWS").unwrap_or(5);

    BacktestConfig {
        input,
        output,
        seed,
        report_rows,
        preview_rows,
        columns: ColumnMapping::from_env(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_list_is_normalized_and_deduped() {
        let v = parse_alias_list(" Unit Price , unit_price,,QTY ");
        assert_eq!(v, vec!["unit_price".to_string(), "qty".to_string()]);
    }

    #[test]
    fn alias_list_drops_non_adjacent_duplicates() {
        let v = parse_alias_list("qty,stock,qty");
        assert_eq!(v, vec!["qty".to_string(), "stock".to_string()]);
    }

    #[test]
    fn default_mapping_does_not_know_units_sold() {
        let m = ColumnMapping::default();
        assert_eq!(m.price[0], "unit_price");
        assert!(!m.qty.iter().any(|a| a == "units_sold"));
        assert_eq!(m.day, vec!["day".to_string()]);
    }

    #[test]
    fn cli_flags_override_defaults() {
        let cli = Cli::parse_from([
            "price_optima",
            "backtest",
            "--input",
            "in.csv",
            "--seed",
            "7",
            "--report-rows",
            "3",
        ]);
        match cli.command {
            Command::Backtest(flags) => {
                let cfg = load_backtest(flags);
                assert_eq!(cfg.input, PathBuf::from("in.csv"));
                assert_eq!(cfg.seed, Some(7));
                assert_eq!(cfg.report_rows, 3);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn serve_flags_parse() {
        let cli = Cli::parse_from(["price_optima", "serve", "--port", "9001"]);
        match cli.command {
            Command::Serve(flags) => assert_eq!(load_serve(flags).port, 9001),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
