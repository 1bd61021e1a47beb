use anyhow::{Context, Result};
use humansize::{format_size, BINARY};
use tracing::info;

use crate::core::config::{Role, Settings};

pub mod client;
pub mod serve;

pub use client::{deliver, ensure_admissible};
pub use serve::{run_serve_loop, TerminationSignal};

pub struct App {
    settings: Settings,
}

impl App {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub async fn run(&self) -> Result<()> {
        match &self.settings.role {
            Role::Client { file } => {
                let sent = client::send(&self.settings, file)
                    .await
                    .with_context(|| format!("failed to send {}", file.display()))?;
                info!("Sent {} of {}", format_size(sent, BINARY), file.display());
                println!("mission accomplished!");
            }
            Role::Server { directory } => {
                serve::serve(&self.settings, directory)
                    .await
                    .context("server mode failed")?;
                info!("Shutdown complete");
            }
        }
        Ok(())
    }
}
