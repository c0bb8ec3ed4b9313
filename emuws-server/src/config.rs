//! Server configuration
//!
//! Command-line flags and environment variables are parsed together by
//! clap; whatever neither supplies falls through to the TOML file and then
//! to compiled defaults.

use clap::Parser;
use emuws_common::config::{
    default_database_path, require, TomlConfig, DEFAULT_BIND_ADDRESS, DEFAULT_EMU_DB_NAME,
    DEFAULT_LOG_LEVEL, DEFAULT_PORT,
};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Command-line arguments for emuws-server
#[derive(Parser, Debug, Default)]
#[command(name = "emuws-server")]
#[command(about = "WebSocket back end for the EMU-webApp annotation editor")]
#[command(version)]
pub struct Args {
    /// Directory holding one git repository per project
    #[arg(long, env = "REPOSITORIES_PATH")]
    pub repositories_path: Option<PathBuf>,

    /// Public base URL of this server's file endpoint
    #[arg(long, env = "MEDIA_FILE_BASE_URL")]
    pub media_file_base_url: Option<String>,

    /// Session registry database file
    #[arg(long, env = "EMUWS_DATABASE_PATH")]
    pub database_path: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "WS_SERVER_PORT")]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "EMUWS_BIND_ADDRESS")]
    pub bind_address: Option<String>,

    /// emuDB name inside each project (`<name>_emuDB`)
    #[arg(long, env = "EMU_DB_NAME")]
    pub emu_db_name: Option<String>,

    /// Add saved files to the project repository's git index
    #[arg(long, env = "EMUWS_STAGE_IN_GIT")]
    pub stage_in_git: Option<bool>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// TOML config file (default: ~/.config/emuws/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub repositories_path: PathBuf,
    pub media_file_base_url: String,
    pub database_path: PathBuf,
    pub port: u16,
    pub bind_address: String,
    pub emu_db_name: String,
    pub stage_in_git: bool,
    pub log_level: String,
}

impl ServerConfig {
    /// Merge arguments over the config file over defaults
    pub fn resolve(args: Args, file: TomlConfig) -> emuws_common::Result<Self> {
        let repositories_path = require(
            args.repositories_path.or(file.repositories_path),
            "REPOSITORIES_PATH",
        )?;
        let media_file_base_url = require(
            args.media_file_base_url.or(file.media_file_base_url),
            "MEDIA_FILE_BASE_URL",
        )?;

        Ok(Self {
            repositories_path,
            media_file_base_url,
            database_path: args
                .database_path
                .or(file.database_path)
                .unwrap_or_else(default_database_path),
            port: args.port.or(file.port).unwrap_or(DEFAULT_PORT),
            bind_address: args
                .bind_address
                .or(file.bind_address)
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            emu_db_name: args
                .emu_db_name
                .or(file.emu_db_name)
                .unwrap_or_else(|| DEFAULT_EMU_DB_NAME.to_string()),
            stage_in_git: args.stage_in_git.or(file.stage_in_git).unwrap_or(true),
            log_level: args
                .log_level
                .or(file.log_level)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        })
    }

    /// Parse the process arguments and environment, then load the file
    pub fn load() -> emuws_common::Result<Self> {
        let args = Args::parse();
        let file = TomlConfig::load(args.config.as_deref())?;
        Self::resolve(args, file)
    }

    pub fn socket_addr(&self) -> emuws_common::Result<SocketAddr> {
        let ip: IpAddr = self.bind_address.parse().map_err(|_| {
            emuws_common::Error::Config(format!("Invalid bind address: {}", self.bind_address))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}
