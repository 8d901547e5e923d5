//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// mdpress static site generator CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Project root directory (default: current directory)
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Config file name (default: mdpress.toml)
    #[arg(short = 'C', long, default_value = "mdpress.toml")]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Parse all content and generate the deploy tree
    Build {
        /// Remove generated listing directories before building
        #[arg(long)]
        clean: bool,
    },

    /// Parse and process all content without writing, then print statistics
    Stats,

    /// Serve the site. Rebuild and reload on change automatically
    Serve {
        /// Interface to bind on
        #[arg(short, long)]
        interface: Option<String>,

        /// The port you should provide
        #[arg(short, long)]
        port: Option<u16>,

        /// enable watch
        #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        watch: Option<bool>,

        /// Enable the authoring endpoints
        #[arg(long)]
        admin: bool,
    },

    /// Downscale original images larger than `[build.media] max_image_size`
    Resize {
        /// Report what would be resized without writing
        #[arg(long)]
        dry_run: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_build_clean() {
        let cli = Cli::try_parse_from(["mdpress", "build", "--clean"]).unwrap();
        assert!(matches!(cli.command, Commands::Build { clean: true }));
        assert_eq!(cli.config, PathBuf::from("mdpress.toml"));
    }

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::try_parse_from([
            "mdpress", "--root", "site", "serve", "--port", "3000", "--watch", "false",
        ])
        .unwrap();

        assert_eq!(cli.root, Some(PathBuf::from("site")));
        match cli.command {
            Commands::Serve { interface, port, watch, admin } => {
                assert_eq!(interface, None);
                assert_eq!(port, Some(3000));
                assert_eq!(watch, Some(false));
                assert!(!admin);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_serve_admin() {
        let cli = Cli::try_parse_from(["mdpress", "serve", "--admin"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { admin: true, .. }));
    }

    #[test]
    fn test_parse_resize_dry_run() {
        let cli = Cli::try_parse_from(["mdpress", "-C", "alt.toml", "resize", "--dry-run"]).unwrap();
        assert!(matches!(cli.command, Commands::Resize { dry_run: true }));
        assert_eq!(cli.config, PathBuf::from("alt.toml"));
    }
}
