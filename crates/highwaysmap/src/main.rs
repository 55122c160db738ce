//! `highwaysmap` - CLI for the road closures map
//!
//! This binary serves the closures map, and can also fetch the raw payload
//! or render the page to a file for offline use.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;

use highwaysmap::cli::{Cli, Command, ConfigCommand, FetchCommand, RenderCommand, ServeCommand};
use highwaysmap::{
    init_logging, payload, server, ClosureSource, Config, Error, FileSource, HighwaysClient,
    MapRenderer,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Validation reports its own errors instead of failing on load
    if let Command::Config(ConfigCommand::Validate { file }) = &cli.command {
        handle_validate(file.clone().or_else(|| cli.config.clone()));
        return Ok(());
    }

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Serve(serve_cmd) => handle_serve(config, &serve_cmd)
            .await
            .context("server failed")?,
        Command::Fetch(fetch_cmd) => handle_fetch(&config, &fetch_cmd)
            .await
            .context("failed to fetch closures")?,
        Command::Render(render_cmd) => handle_render(&config, &render_cmd)
            .await
            .context("failed to render map")?,
        Command::Config(config_cmd) => handle_config(&config, &config_cmd)?,
    }
    Ok(())
}

async fn handle_serve(mut config: Config, cmd: &ServeCommand) -> highwaysmap::Result<()> {
    if let Some(host) = &cmd.host {
        config.server.host.clone_from(host);
    }
    if let Some(port) = cmd.port {
        config.server.port = port;
    }
    config.validate()?;

    let client = HighwaysClient::new(&config.upstream)?;
    server::run_server(&config, Arc::new(client)).await
}

async fn handle_fetch(config: &Config, cmd: &FetchCommand) -> highwaysmap::Result<()> {
    let client = HighwaysClient::new(&config.upstream)?;
    let body = client.fetch_raw().await?;

    tokio::fs::write(&cmd.output, &body)
        .await
        .map_err(|source| Error::File {
            path: cmd.output.clone(),
            source,
        })?;
    println!("Saved {} bytes to {}", body.len(), cmd.output.display());

    if cmd.summary {
        let closures = payload::parse_closures(&body, Utc::now())?;
        let mut by_cause: BTreeMap<String, usize> = BTreeMap::new();
        for closure in &closures {
            *by_cause.entry(closure.cause.label().to_string()).or_default() += 1;
        }

        println!();
        println!("Active closures: {}", closures.len());
        for (cause, count) in by_cause {
            println!("  {cause:<24} {count}");
        }
    }
    Ok(())
}

async fn handle_render(config: &Config, cmd: &RenderCommand) -> highwaysmap::Result<()> {
    let source: Box<dyn ClosureSource> = match &cmd.input {
        Some(path) => Box::new(FileSource::new(path)),
        None => Box::new(HighwaysClient::new(&config.upstream)?),
    };
    let closures = source.fetch().await?;

    let renderer = MapRenderer::new(config.map.clone(), Arc::new(config.style_table()?));
    let html = renderer.render(&closures)?;

    tokio::fs::write(&cmd.output, html)
        .await
        .map_err(|source| Error::File {
            path: cmd.output.clone(),
            source,
        })?;
    println!(
        "Rendered {} closures from {} to {}",
        closures.len(),
        source.name(),
        cmd.output.display()
    );
    Ok(())
}

fn handle_config(config: &Config, cmd: &ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = config.redacted();
            if *json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Server]");
                println!("  Address:            {}", config.bind_address());
                println!("  Cache max age (s):  {}", config.server.cache_max_age_secs);
                println!("  Compression:        {}", config.server.compression);
                println!();
                println!("[Upstream]");
                println!("  API URL:            {}", config.upstream.api_url);
                println!(
                    "  Subscription key:   {}",
                    config
                        .upstream
                        .subscription_key
                        .as_deref()
                        .unwrap_or("(not set)")
                );
                println!("  Timeout (s):        {}", config.upstream.timeout_secs);
                println!();
                println!("[Map]");
                println!(
                    "  Center:             {}, {}",
                    config.map.center_lat, config.map.center_lon
                );
                println!("  Zoom:               {}", config.map.zoom);
                println!("  Time format:        {}", config.map.time_format);
                println!();
                println!("[Style]");
                println!("  Custom rules:       {}", config.style.rules.len());
                println!(
                    "  Default:            {} ({})",
                    config.style.default.color, config.style.default.label
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => handle_validate(file.clone()),
    }
    Ok(())
}

fn handle_validate(file: Option<std::path::PathBuf>) {
    let path = file.unwrap_or_else(Config::default_config_path);
    println!("Validating configuration: {}", path.display());
    match Config::load_from(Some(path)) {
        Ok(config) => {
            println!("Configuration is valid.");
            if !config.upstream.has_key() {
                println!("Note: no subscription key set; map requests will fail.");
            }
        }
        Err(e) => println!("Configuration error: {e}"),
    }
}
