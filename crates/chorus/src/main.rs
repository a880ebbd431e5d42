//! # chorus
//!
//! Chorus relay binary. Resolves settings, starts the HTTP/WebSocket server,
//! and shuts down gracefully on Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use chorus_hub::EchoPolicy;
use chorus_server::{ChorusServer, ServerConfig};
use chorus_settings::ChorusSettings;
use clap::Parser;
use tracing::info;

/// Chorus broadcast relay.
#[derive(Parser, Debug)]
#[command(name = "chorus", about = "Relay every message to every connected client")]
struct Cli {
    /// Settings file (defaults to `~/.chorus/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Whether senders receive their own messages: `include-sender` or
    /// `exclude-sender` (overrides settings).
    #[arg(long)]
    echo: Option<EchoPolicy>,

    /// Log filter such as `info` or `chorus_hub=debug` (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Defaults, then the settings file, then `CHORUS_*` env vars, then flags.
    fn resolve_settings(&self) -> Result<ChorusSettings> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(chorus_settings::settings_path);
        let mut settings = chorus_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;

        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(echo) = self.echo {
            settings.broadcast.echo = echo;
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }

        settings.validate().context("Invalid settings")?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.resolve_settings()?;

    chorus_server::logging::init_subscriber(&settings.logging.level, settings.logging.format);
    let metrics_handle = chorus_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let server = ChorusServer::new(ServerConfig::from(&settings), metrics_handle);
    let (addr, serve_task) = server.listen().await.context("Failed to start server")?;
    info!(%addr, echo = %settings.broadcast.echo, "chorus started");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("shutdown signal received");

    server
        .shutdown()
        .graceful_shutdown(vec![serve_task], None)
        .await;
    info!("chorus stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn missing_config() -> PathBuf {
        PathBuf::from("/nonexistent/chorus/settings.json")
    }

    #[test]
    fn cli_defaults_are_unset() {
        let cli = Cli::parse_from(["chorus"]);
        assert!(cli.config.is_none());
        assert!(cli.host.is_none());
        assert!(cli.port.is_none());
        assert!(cli.echo.is_none());
        assert!(cli.log_level.is_none());
    }

    #[test]
    fn cli_custom_port() {
        let cli = Cli::parse_from(["chorus", "--port", "8080"]);
        assert_eq!(cli.port, Some(8080));
    }

    #[test]
    fn cli_echo_policy() {
        let cli = Cli::parse_from(["chorus", "--echo", "exclude-sender"]);
        assert_eq!(cli.echo, Some(EchoPolicy::ExcludeSender));
        let cli = Cli::parse_from(["chorus", "--echo", "include-sender"]);
        assert_eq!(cli.echo, Some(EchoPolicy::IncludeSender));
    }

    #[test]
    fn cli_rejects_unknown_echo_policy() {
        assert!(Cli::try_parse_from(["chorus", "--echo", "loud"]).is_err());
    }

    #[test]
    fn cli_rejects_out_of_range_port() {
        assert!(Cli::try_parse_from(["chorus", "--port", "70000"]).is_err());
    }

    #[test]
    fn flags_override_settings() {
        let mut cli = Cli::parse_from([
            "chorus",
            "--host",
            "0.0.0.0",
            "--port",
            "4000",
            "--echo",
            "exclude-sender",
            "--log-level",
            "debug",
        ]);
        cli.config = Some(missing_config());

        let settings = cli.resolve_settings().unwrap();
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 4000);
        assert_eq!(settings.broadcast.echo, EchoPolicy::ExcludeSender);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn config_file_is_layered_under_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"server": {{"port": 5000, "wsPath": "/relay"}}, "broadcast": {{"echo": "exclude_sender"}}}}"#
        )
        .unwrap();

        let mut cli = Cli::parse_from(["chorus", "--port", "6000"]);
        cli.config = Some(file.path().to_path_buf());

        let settings = cli.resolve_settings().unwrap();
        assert_eq!(settings.server.port, 6000);
        assert_eq!(settings.server.ws_path, "/relay");
        assert_eq!(settings.broadcast.echo, EchoPolicy::ExcludeSender);
    }

    #[test]
    fn invalid_config_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let mut cli = Cli::parse_from(["chorus"]);
        cli.config = Some(file.path().to_path_buf());
        assert!(cli.resolve_settings().is_err());
    }

    #[test]
    fn server_config_follows_resolved_settings() {
        let mut cli = Cli::parse_from(["chorus", "--port", "0"]);
        cli.config = Some(missing_config());
        let settings = cli.resolve_settings().unwrap();

        let config = ServerConfig::from(&settings);
        assert_eq!(config.port, 0);
        assert_eq!(config.ws_path, "/sock");
        assert_eq!(config.echo, EchoPolicy::IncludeSender);
    }
}
