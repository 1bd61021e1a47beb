use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use crate::core::app::App;
use crate::core::config::{AppConfig, Role, Settings};

pub mod select;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// File to send to a peer chosen from the ones found on the network
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Run as a server: receive files and advertise on the local network
    #[arg(short, long)]
    serve: bool,

    /// Directory to store received files in (server mode, defaults to the home directory)
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// Transfer user name
    #[arg(short, long)]
    user: Option<String>,

    /// Transfer password
    #[arg(short, long)]
    password: Option<String>,

    /// Seconds to spend looking for peers
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    pub async fn run(&self) -> Result<()> {
        let mut config = AppConfig::load().unwrap_or_else(|e| {
            info!("Using default configuration ({:#})", e);
            AppConfig::default()
        });
        self.apply(&mut config);

        if self.print_config {
            print!("{}", config.to_toml()?);
            return Ok(());
        }

        let role = self.role(&config)?;
        let app = App::new(Settings::new(role, &config));
        app.run().await
    }

    /// Command-line values win over the environment.
    fn apply(&self, config: &mut AppConfig) {
        if let Some(ref user) = self.user {
            config.transfer.user = user.clone();
        }
        if let Some(ref password) = self.password {
            config.transfer.password = password.clone();
        }
        if let Some(timeout) = self.timeout {
            config.discovery.timeout_secs = timeout;
        }
        if let Some(ref directory) = self.directory {
            config.server.directory = Some(directory.clone());
        }
    }

    fn role(&self, config: &AppConfig) -> Result<Role> {
        if self.serve {
            let directory = match config.server.directory.clone().or_else(dirs::home_dir) {
                Some(directory) => directory,
                None => bail!("no directory to serve: pass one with -d"),
            };
            return Ok(Role::Server { directory });
        }

        match self.file {
            Some(ref file) => Ok(Role::Client { file: file.clone() }),
            None => bail!("you should specify a file with -f (try --help)"),
        }
    }
}
