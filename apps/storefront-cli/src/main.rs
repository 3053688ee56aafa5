mod config;
mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use storefront_auth::{
    AuthError, AuthenticatedClient, ErrorClass, FileCredentialStore, LogoutHandler, Method,
    RequestDescriptor, SessionStatus,
};
use url::Url;

use crate::config::CliConfig;

/// Storefront back-office client
#[derive(Parser)]
#[command(name = "storefront")]
#[command(about = "Storefront back-office API client")]
#[command(version)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// API base URL (overrides config)
    #[arg(long)]
    base_url: Option<Url>,

    /// Credential file (overrides config)
    #[arg(long)]
    credentials: Option<PathBuf>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl From<HttpMethod> for Method {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => Method::Get,
            HttpMethod::Post => Method::Post,
            HttpMethod::Put => Method::Put,
            HttpMethod::Patch => Method::Patch,
            HttpMethod::Delete => Method::Delete,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session
    Login {
        #[arg(long)]
        email: String,
        /// Password (falls back to STOREFRONT_PASSWORD)
        #[arg(long, env = "STOREFRONT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Call an API path and print the response body
    Call {
        #[arg(value_enum)]
        method: HttpMethod,
        /// Path relative to the base URL, e.g. /orders?status=open
        path: String,
        /// JSON request body
        #[arg(long)]
        data: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show whether a session is stored
    Status,
    /// Validate configuration and the credential file, then exit
    Check,
}

/// Tells the operator to sign in again when the session ends involuntarily.
struct PromptLogin;

#[async_trait]
impl LogoutHandler for PromptLogin {
    async fn on_logout(&self) {
        tracing::warn!("session expired; run `storefront login` to sign in again");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = cli.config.as_deref() {
        if !path.is_file() {
            bail!("config file does not exist: {}", path.display());
        }
    }

    // 1) defaults -> 2) YAML -> 3) env (STOREFRONT__*) -> 4) CLI overrides
    let mut config = CliConfig::load(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url.clone() {
        config.auth.base_url = Some(base_url);
    }
    if let Some(path) = cli.credentials.clone() {
        config.credentials_path = Some(path);
    }

    logging::init(&config.logging, cli.verbose);

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    run(cli.command.unwrap_or(Commands::Status), config).await
}

async fn run(command: Commands, config: CliConfig) -> Result<()> {
    let store = Arc::new(FileCredentialStore::new(config.credentials_path()?));
    let client = AuthenticatedClient::new(config.auth, store, Arc::new(PromptLogin))
        .context("failed to build API client")?;
    let status = client.restore().await?;
    tracing::debug!(?status, "session loaded");

    match command {
        Commands::Login { email, password } => {
            client
                .login(&serde_json::json!({ "email": email, "password": password }))
                .await
                .map_err(explain)?;
            println!("Signed in as {email}");
        }
        Commands::Call { method, path, data } => {
            let mut request = RequestDescriptor::new(method.into(), path);
            if let Some(data) = data {
                let payload: serde_json::Value =
                    serde_json::from_str(&data).context("--data is not valid JSON")?;
                request = request.with_payload(payload);
            }
            let response = client.send(request).await.map_err(explain)?;
            match response.json::<serde_json::Value>() {
                Ok(body) => println!("{}", serde_json::to_string_pretty(&body)?),
                Err(_) => println!("{}", response.text()),
            }
        }
        Commands::Logout => {
            client.logout().await?;
            println!("Signed out");
        }
        Commands::Status => match status {
            SessionStatus::Authenticated => println!("Signed in"),
            SessionStatus::LoggedOut => println!("Not signed in"),
        },
        // Building the client validated the config and read the credential file.
        Commands::Check => println!("Configuration is valid"),
    }
    Ok(())
}

/// Attach an operator-facing hint matching the error class.
fn explain(err: AuthError) -> anyhow::Error {
    let hint = match err.class() {
        ErrorClass::TerminalAuth => "session expired; sign in again with `storefront login`",
        ErrorClass::Transport => "could not reach the storefront API",
        ErrorClass::Business => "the API rejected the request",
        ErrorClass::Internal => "request failed",
    };
    anyhow::Error::new(err).context(hint)
}
