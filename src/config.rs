// Config Module - Configuration management and command-line argument parsing
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::schema::AddonGroup;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Edit GP2040-CE add-on options from a browser or the command line",
    long_about = "Loads the add-on options from a GP2040-CE controller's web configurator,\n\
                  checks pin assignments and value ranges before anything is written,\n\
                  and saves the complete option set back to the device.\n\
                  Without a subcommand a local web form is served."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Device address (e.g. 192.168.7.1 or http://gp2040.local)
    #[arg(short = 'D', long)]
    pub device: Option<String>,

    /// Address for the local web form
    #[arg(long)]
    pub ip: Option<String>,

    /// Port for the local web form
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Config file path or name (e.g., --cfg /full/path or --cfg pad2 for ~/.config/addonconf/pad2.conf)
    #[arg(long)]
    pub cfg: Option<String>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Serve the add-on form on the local web server (default)
    Serve,

    /// Print every add-on section with its current values and errors
    Show,

    /// Load and validate; exits non-zero if any field fails
    Check,

    /// Change options and save them to the device
    Set {
        /// Assignments like turboPin=14
        assignments: Vec<String>,

        /// Flip an add-on on or off (group name or enable flag)
        #[arg(short, long)]
        toggle: Vec<AddonGroup>,

        /// Validate only, do not write to the device
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(skip)]
    pub config_path: Option<PathBuf>,  // Stores the config file path (not serialized)

    pub device_url: String,
    pub httpd_ip: String,
    pub httpd_port: u16,
    pub httpd_auth_enabled: bool,
    pub httpd_auth_user: String,
    pub httpd_auth_pass: String,
    pub log_filter: String,  // tracing-subscriber filter, RUST_LOG wins when set
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            config_path: None,
            device_url: "http://192.168.7.1".to_string(),  // GP2040-CE web config address over RNDIS
            httpd_ip: "127.0.0.1".to_string(),
            httpd_port: 8080,
            httpd_auth_enabled: false,
            httpd_auth_user: "".to_string(),
            httpd_auth_pass: "".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Apply command-line overrides. Returns true if any were given.
    pub fn merge_with_args(&mut self, args: &Args) -> bool {
        let mut args_provided = false;

        if let Some(ref device) = args.device {
            self.device_url = device.clone();
            args_provided = true;
        }

        if let Some(ref ip) = args.ip {
            self.httpd_ip = ip.clone();
            args_provided = true;
        }

        if let Some(port) = args.port {
            self.httpd_port = port;
            args_provided = true;
        }

        args_provided
    }

    pub fn config_path(cfg_arg: Option<&str>) -> Result<PathBuf> {
        if let Some(cfg) = cfg_arg {
            let path = PathBuf::from(cfg);
            if path.is_absolute() || cfg.contains('/') || cfg.contains('\\') {
                return Ok(path);
            }

            // Bare name -> file in the config directory
            let filename = if cfg.ends_with(".conf") {
                cfg.to_string()
            } else {
                format!("{}.conf", cfg)
            };
            Ok(Self::config_dir()?.join(filename))
        } else {
            Ok(Self::config_dir()?.join("config.conf"))
        }
    }

    fn config_dir() -> Result<PathBuf> {
        let home = std::env::var("HOME").context("HOME is not set")?;
        let config_dir = PathBuf::from(home).join(".config").join("addonconf");
        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create {}", config_dir.display()))?;
        Ok(config_dir)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut parsed: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        parsed.config_path = Some(path.to_path_buf());
        parsed.sanitize();
        Ok(parsed)
    }

    /// Load the config file, writing one with defaults on first run.
    pub fn load_or_create(cfg_arg: Option<&str>) -> Result<(Self, bool)> {
        let path = Self::config_path(cfg_arg)?;
        if path.exists() {
            return Ok((Self::load_from(&path)?, false));
        }
        let config = AppConfig { config_path: Some(path), ..AppConfig::default() };
        Ok((config, true))
    }

    pub fn sanitize(&mut self) {
        self.device_url = self.device_url.trim().trim_end_matches('/').to_string();
        self.httpd_ip = self.httpd_ip.trim().to_string();
        self.httpd_auth_user = self.httpd_auth_user.trim().to_string();
        self.log_filter = self.log_filter.trim().to_string();

        if self.device_url.is_empty() {
            self.device_url = AppConfig::default().device_url;
        }
        if self.httpd_ip.is_empty() {
            self.httpd_ip = AppConfig::default().httpd_ip;
        }
        if self.log_filter.is_empty() {
            self.log_filter = "info".to_string();
        }
        self.httpd_port = self.httpd_port.max(1);
    }

    pub fn auth_active(&self) -> bool {
        self.httpd_auth_enabled && !self.httpd_auth_user.is_empty() && !self.httpd_auth_pass.is_empty()
    }

    pub fn save(&self) -> Result<()> {
        let path = match self.config_path.clone() {
            Some(p) => p,
            None => Self::config_path(None)?,
        };

        let mut sanitized = self.clone();
        sanitized.sanitize();

        let contents = format!(
            r#"# addonconf Configuration File

# Address of the controller's web configurator
# Example: "http://192.168.7.1" or "gp2040.local"
device_url = {}

# Local web form address and port
httpd_ip = {}
httpd_port = {}

# HTTP basic auth for the local web form
# Options: true, false (ignored while user or password is empty)
httpd_auth_enabled = {}
httpd_auth_user = {}
httpd_auth_pass = {}

# Log filter (tracing-subscriber syntax, RUST_LOG overrides it)
# Example: "info", "addonconf=debug,tower_http=debug"
log_filter = {}
"#,
            quoted(&sanitized.device_url),
            quoted(&sanitized.httpd_ip),
            sanitized.httpd_port,
            sanitized.httpd_auth_enabled,
            quoted(&sanitized.httpd_auth_user),
            quoted(&sanitized.httpd_auth_pass),
            quoted(&sanitized.log_filter),
        );

        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

fn quoted(s: &str) -> String {
    toml::Value::String(s.to_string()).to_string()
}
