//! mdpress - A static site generator for Markdown microblogs.

mod admin;
mod build;
mod cli;
mod config;
mod content;
mod generator;
mod logger;
mod media;
mod output;
mod reload;
mod serve;
mod template;
mod utils;
mod watch;

use anyhow::{Result, bail};
use build::{Site, build_site};
use clap::Parser;
use cli::{Cli, Commands};
use config::{MediaConfig, SiteConfig, cfg, init_config};
use media::thumbs;
use serve::serve_site;
use std::sync::Arc;

fn main() -> Result<()> {
    let cli: &'static Cli = Box::leak(Box::new(Cli::parse()));
    init_config(load_config(cli)?);
    let config = cfg();

    match &cli.command {
        Commands::Build { clean } => {
            let site = Site::new(&config);
            build_site(&site, &config, *clean).map(|_| ())
        }
        Commands::Stats => {
            let stats = Site::new(&config).stats(&config)?;
            log!("build"; "{stats}");
            Ok(())
        }
        Commands::Serve { .. } => {
            let site = Arc::new(Site::new(&config));
            build_site(&site, &config, false)?;
            serve_site(site)
        }
        Commands::Resize { dry_run } => resize(&config, *dry_run),
    }
}

/// Load and validate configuration from CLI arguments
fn load_config(cli: &'static Cli) -> Result<SiteConfig> {
    let config = SiteConfig::load(cli)?;
    config.validate()?;
    Ok(config)
}

/// Downscale oversized originals regardless of `resize_originals`.
fn resize(config: &SiteConfig, dry_run: bool) -> Result<()> {
    if config.build.media.max_image_size == 0 {
        bail!("[build.media] max_image_size must be set to resize originals");
    }

    let media = MediaConfig {
        resize_originals: true,
        ..config.build.media.clone()
    };
    let count = thumbs::resize_originals(&config.paths().media_root(), &media, dry_run)?;
    let verb = if dry_run { "would resize" } else { "resized" };
    log!("thumbs"; "{verb} {count} originals");
    Ok(())
}
