//! Diabetes Dashboard Server
//!
//! Usage:
//!   diabetes-dashboard [--config dashboard.toml] [--listen 0.0.0.0:8501] [--model model.json]

use clap::Parser;
use diabetes_core::model::shared;
use diabetes_core::{DashboardConfig, GenderPolicy};
use diabetes_dashboard::{app, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "diabetes-dashboard")]
#[command(version = "0.1.0")]
#[command(about = "Web dashboard for diabetes risk prediction", long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overrides the configured one
    #[arg(short, long)]
    listen: Option<String>,

    /// Model artifact, overrides the configured path
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Encode unrecognized gender text as Female instead of rejecting it
    #[arg(long)]
    permissive_gender: bool,

    /// Save every scored upload as the report source
    #[arg(long)]
    export_results: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = DashboardConfig::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if let Some(model) = args.model {
        config.model_path = model;
    }
    if args.permissive_gender {
        config.gender_policy = GenderPolicy::Permissive;
    }
    if args.export_results {
        config.export_results = true;
    }
    config.validate()?;

    // Without a model no page can score anything; refuse to start.
    let model = shared(&config.model_path)?;
    info!(summary = ?model.summary(), "model ready");

    let listen_addr = config.listen_addr.clone();
    let state = Arc::new(AppState::new(model, config));

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    info!(addr = %listen_addr, "dashboard listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;

    Ok(())
}
