pub mod config;
pub mod error;
pub mod logging;
pub mod menu;
pub mod model;
pub mod providers;
pub mod rate_limiter;
pub mod sanitize;

use anyhow::{Context, Result};
use reqwest::Client;
use std::env;
use std::io;
use std::time::Duration;
use tracing::info;

use config::Config;
use error::PplxError;
use model::{SupportedModel, build_request};
use rate_limiter::RateLimiter;

pub const DEFAULT_PROMPT: &str = "What are the three laws of robotics?";

pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();

    let cfg = Config::from_env()?;
    info!(
        api_url = %cfg.api_url,
        model = ?cfg.model,
        timeout_secs = ?cfg.timeout_secs,
        system_prompt = cfg.system_prompt.is_some(),
        "loaded runtime configuration"
    );

    let model = resolve_model(&cfg)?;
    info!(model = %model, "selected model");

    let args: Vec<String> = env::args().skip(1).collect();
    let prompt = if args.is_empty() {
        DEFAULT_PROMPT.to_string()
    } else {
        args.join(" ")
    };
    let request = build_request(
        model,
        cfg.system_prompt.as_deref(),
        &prompt,
        cfg.sampling.clone(),
    )?;

    let client = build_client(&cfg)?;
    let limiter = RateLimiter::new();
    let completion = providers::perplexity::send(&client, &cfg, &limiter, &request).await?;
    println!("{completion}");
    Ok(())
}

/// Renders a fatal error for stderr, marking failures detected before any request.
pub fn diagnostic(err: &anyhow::Error) -> String {
    let is_config = err
        .downcast_ref::<PplxError>()
        .is_some_and(PplxError::is_config);
    if is_config {
        format!("Configuration error: {err:#}")
    } else {
        format!("Error: {err:#}")
    }
}

fn resolve_model(cfg: &Config) -> Result<SupportedModel> {
    let model = match cfg.model.as_deref() {
        Some(raw) => SupportedModel::from_menu_choice(raw)?,
        None => menu::select_model(&mut io::stdin().lock(), &mut io::stdout())?,
    };
    Ok(model)
}

fn build_client(cfg: &Config) -> Result<Client> {
    let mut builder = Client::builder();
    if let Some(secs) = cfg.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder.build().context("Failed to initialize HTTP client")
}
