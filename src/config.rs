use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::{env, path::PathBuf, str::FromStr};

use crate::view::upload_form::DEFAULT_MAX_UPLOAD_BYTES;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub public_url: String,
    pub functions_url: String,
    pub max_upload_bytes: u64,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "RetroShare file sharing client")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Directory where object payloads are stored (overrides RETROSHARE_STORAGE_DIR)
    #[arg(long, global = true)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides RETROSHARE_DATABASE_URL)
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Base URL that download links point at (overrides RETROSHARE_PUBLIC_URL)
    #[arg(long, global = true)]
    pub public_url: Option<String>,

    /// Base URL of the callable functions (overrides RETROSHARE_FUNCTIONS_URL)
    #[arg(long, global = true)]
    pub functions_url: Option<String>,

    /// Largest file accepted for direct upload (overrides RETROSHARE_MAX_UPLOAD_BYTES)
    #[arg(long, global = true)]
    pub max_upload_bytes: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an account and sign in
    Signup { email: String, password: String },
    /// Sign in to an existing account
    Login { email: String, password: String },
    /// Sign out
    Logout,
    /// Show the signed-in account
    Whoami,
    /// List your files
    List,
    /// Upload a local file
    Upload { path: PathBuf },
    /// Ask the server to fetch a file from a direct download URL
    Remote { url: String },
    /// Delete one of your files by id or storage path
    Delete { id: String },
    /// Serve download links and health endpoints
    Serve {
        /// Host to bind to (overrides RETROSHARE_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides RETROSHARE_PORT)
        #[arg(long)]
        port: Option<u16>,
    },
}

impl AppConfig {
    /// Merge CLI arguments over `RETROSHARE_*` variables over defaults.
    pub fn resolve(global: &GlobalArgs, host: Option<String>, port: Option<u16>) -> Result<Self> {
        let env_host = env::var("RETROSHARE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_number("RETROSHARE_PORT", 3000u16)?;
        let env_storage =
            env::var("RETROSHARE_STORAGE_DIR").unwrap_or_else(|_| "./data/objects".into());
        let env_db = env::var("RETROSHARE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/retroshare.db".into());
        let env_public =
            env::var("RETROSHARE_PUBLIC_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".into());
        let env_functions = env::var("RETROSHARE_FUNCTIONS_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:5001".into());
        let env_max = env_number("RETROSHARE_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;

        Ok(Self {
            host: host.unwrap_or(env_host),
            port: port.unwrap_or(env_port),
            storage_dir: global.storage_dir.clone().unwrap_or(env_storage),
            database_url: global.database_url.clone().unwrap_or(env_db),
            public_url: global.public_url.clone().unwrap_or(env_public),
            functions_url: global.functions_url.clone().unwrap_or(env_functions),
            max_upload_bytes: global.max_upload_bytes.unwrap_or(env_max),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_number<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}
