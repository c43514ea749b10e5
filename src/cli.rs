use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ClonerConfig;

#[derive(Parser, Debug)]
#[command(
    name = "website-cloner",
    about = "Clone a rendered web page together with the assets it references",
    version,
    long_about = "Captures the final HTML of a page, downloads its stylesheets, scripts, images, fonts and media, and rewrites every reference to point at the local copies."
)]
pub struct ClonerCommand {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Root directory for cloned sites
    #[arg(short, long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Maximum concurrent asset downloads per clone
    #[arg(short = 'c', long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_concurrent: Option<u64>,

    /// Timeout for each asset download in seconds
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP API and serve finished clones
    Serve {
        /// Address to listen on, e.g. 0.0.0.0:3000
        #[arg(long)]
        listen: Option<String>,

        /// Port to listen on, keeping the configured host
        #[arg(long, env = "PORT")]
        port: Option<u16>,
    },
    /// Clone a single page and exit
    Clone {
        /// The URL of the page to clone
        url: String,
    },
}

impl ClonerCommand {
    /// Overlay command-line values onto a loaded configuration.
    pub fn apply_to(&self, config: &mut ClonerConfig) {
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = output_dir.clone();
        }
        if let Some(max_concurrent) = self.max_concurrent {
            config.max_concurrent = max_concurrent as usize;
        }
        if let Some(timeout) = self.timeout {
            config.asset_timeout_secs = timeout;
        }
        if let Command::Serve { listen, port } = &self.command {
            if let Some(listen) = listen {
                config.listen_addr = listen.clone();
            }
            if let Some(port) = port {
                config.listen_addr = with_port(&config.listen_addr, *port);
            }
        }
    }
}

fn with_port(addr: &str, port: u16) -> String {
    let host = addr.rsplit_once(':').map_or(addr, |(host, _)| host);
    format!("{}:{}", host, port)
}
