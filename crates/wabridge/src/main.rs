//! `wabridge` command-line entry point.
//!
//! ```bash
//! wabridge --config deploy/wabridge.toml --port 3000 \
//!     --webhook-url https://n8n.example.com/webhook/whatsapp
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use wabridge::BridgeRuntime;

/// WhatsApp session to webhook bridge.
#[derive(Debug, Parser)]
#[command(name = "wabridge", version, about)]
struct Cli {
    /// Configuration file (default: search ./wabridge.toml and the user config dir).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Configuration profile, also read from WABRIDGE_PROFILE.
    #[arg(long, value_name = "NAME")]
    profile: Option<String>,

    /// HTTP port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Webhook receiving inbound messages.
    #[arg(long, value_name = "URL")]
    webhook_url: Option<String>,

    /// WebSocket endpoint of the session sidecar.
    #[arg(long, value_name = "URL")]
    session_url: Option<String>,

    #[arg(long, value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: Option<String>,
}

impl Cli {
    fn into_builder(self) -> wabridge::RuntimeBuilder {
        let mut builder = BridgeRuntime::builder();
        if let Some(path) = self.config {
            builder = builder.config_file(path);
        }
        if let Some(profile) = self.profile {
            builder = builder.profile(profile);
        }
        if let Some(port) = self.port {
            builder = builder.set("server.port", port);
        }
        if let Some(url) = self.webhook_url {
            builder = builder.set("webhook.url", url);
        }
        if let Some(url) = self.session_url {
            builder = builder.set("session.url", url);
        }
        if let Some(level) = self.log_level {
            builder = builder.set("logging.level", level);
        }
        builder
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let runtime = Cli::parse()
        .into_builder()
        .build()
        .context("failed to load configuration")?;

    runtime.run().await?;

    Ok(())
}
