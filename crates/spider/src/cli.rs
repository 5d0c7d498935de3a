use std::path::PathBuf;

use clap::Parser;
use trawler_core::Config;

/// Command-line arguments shared by both spider binaries.
#[derive(Debug, Clone, Parser)]
#[command(version, about = "Crawl announced torrents into a deduplicated catalog")]
pub struct Cli {
    /// Configuration file.
    #[arg(long, env = "TRAWLER_CONFIG", default_value = "config.toml")]
    pub config: PathBuf,

    /// Port to listen on for announcements. Overrides `[spider].port`.
    #[arg(long)]
    pub port: Option<u16>,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.spider.port = Some(port);
        }
    }
}
