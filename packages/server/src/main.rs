#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Entry point for the penalty report server.

use penalty_report_server::{ServerConfig, run_server};

#[actix_web::main]
async fn main() {
    pretty_env_logger::init_custom_env("RUST_LOG");

    if let Err(e) = run_server(ServerConfig::from_env()).await {
        log::error!("{e}");
        std::process::exit(1);
    }
}
