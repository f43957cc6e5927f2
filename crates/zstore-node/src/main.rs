//! # ZStore Node
//!
//! Entry point for the ZStore ticket gateway.
//!
//! ## Startup Sequence
//!
//! 1. Parse flags (each with an environment fallback)
//! 2. Initialize logging
//! 3. Load the optional TOML config file and apply overrides
//! 4. Build the chat platform and policy store adapters
//! 5. Serve until Ctrl+C, then cancel pending channel teardowns
//!
//! With `--offline` both collaborators are replaced by in-memory
//! implementations, which is useful for exercising the HTTP surface
//! without credentials.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::task::JoinError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use zstore_gateway::{
    ChatPlatform, DiscordClient, FirestoreClient, GatewayConfig, GatewayError, InMemoryChatPlatform,
    InMemoryPolicyStore, PlatformId, PolicyStore, TicketGatewayService,
};

#[derive(Parser, Debug)]
#[command(name = "zstore-node")]
#[command(about = "ZStore ticket gateway: access gate and Discord transaction channels")]
#[command(version)]
struct Args {
    /// TOML configuration file; flags and environment override its values
    #[arg(short, long, env = "ZSTORE_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP listen port
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Guild that ticket channels are created in
    #[arg(long, env = "GUILD_ID")]
    guild_id: Option<String>,

    /// Category the ticket channels are placed under
    #[arg(long, env = "CATEGORY_ID")]
    category_id: Option<String>,

    /// Store owner; their tickets get the owner accent color
    #[arg(long, env = "OWNER_ID")]
    owner_id: Option<String>,

    /// Bot token for the chat platform
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    discord_token: Option<String>,

    /// Firestore project holding the ban list and store settings
    #[arg(long, env = "FIREBASE_PROJECT_ID")]
    firebase_project_id: Option<String>,

    /// Service account key JSON for Firestore reads
    #[arg(long, env = "FIREBASE_KEY", hide_env_values = true)]
    firebase_key: Option<String>,

    /// Service account key file, used when no inline key is given
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    firebase_key_file: Option<PathBuf>,

    /// Fixed OAuth access token; overrides the service account
    #[arg(long, env = "FIREBASE_ACCESS_TOKEN", hide_env_values = true)]
    firebase_access_token: Option<String>,

    /// Path segment exempt from maintenance mode
    #[arg(long, env = "ADMIN_PATH")]
    admin_path: Option<String>,

    /// Seconds between the closing notice and channel deletion
    #[arg(long, env = "TEARDOWN_DELAY")]
    teardown_delay: Option<u64>,

    /// Let requests through when the policy store cannot be read
    #[arg(long, env = "GATE_FAIL_OPEN")]
    gate_fail_open: Option<bool>,

    /// Proxies allowed to set X-Forwarded-For (comma separated)
    #[arg(long, env = "TRUSTED_PROXIES", value_delimiter = ',')]
    trusted_proxies: Option<Vec<IpAddr>>,

    /// Use in-memory collaborators instead of Discord and Firestore
    #[arg(long)]
    offline: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

/// Initialize the global tracing subscriber.
fn init_logging(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

/// Load configuration from the optional file, then apply flag overrides.
fn load_config(args: &Args) -> Result<GatewayConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            let config: GatewayConfig = toml::from_str(&raw)
                .with_context(|| format!("parsing config file {}", path.display()))?;
            info!(path = %path.display(), "Loaded configuration file");
            config
        }
        None => GatewayConfig::default(),
    };

    if let Some(port) = args.port {
        config.http.port = port;
    }
    if let Some(id) = &args.guild_id {
        config.discord.guild_id = id.clone();
    }
    if let Some(id) = &args.category_id {
        config.discord.category_id = id.clone();
    }
    if let Some(id) = &args.owner_id {
        config.discord.owner_id = id.clone();
    }
    if let Some(token) = &args.discord_token {
        config.discord.token = token.clone();
    }
    if let Some(project) = &args.firebase_project_id {
        config.store.project_id = project.clone();
    }
    if let Some(key) = &args.firebase_key {
        config.store.service_account_key = Some(key.clone());
    }
    if let Some(path) = &args.firebase_key_file {
        config.store.service_account_file = Some(path.clone());
    }
    if let Some(token) = &args.firebase_access_token {
        config.store.access_token = Some(token.clone());
    }
    if let Some(path) = &args.admin_path {
        config.gate.admin_path = path.clone();
    }
    if let Some(secs) = args.teardown_delay {
        config.teardown.delay = Duration::from_secs(secs);
    }
    if let Some(fail_open) = args.gate_fail_open {
        config.gate.fail_open = fail_open;
    }
    if let Some(proxies) = &args.trusted_proxies {
        config.security.trusted_proxies = proxies.clone();
    }

    if args.offline {
        // Credentials are never used offline
        if config.discord.token.is_empty() {
            config.discord.token = "offline".to_string();
        }
        if config.store.project_id.is_empty() {
            config.store.project_id = "offline".to_string();
        }
    }

    let store = &config.store;
    if !args.offline
        && store.access_token.is_none()
        && store.service_account_key.is_none()
        && store.service_account_file.is_none()
    {
        warn!("No policy store credentials configured; document reads are unauthenticated");
    }
    if store.access_token.is_some() {
        warn!("Fixed policy store access token in use; it is never refreshed");
    }

    if !config.gate.fail_open {
        warn!("Access gate is fail-closed: policy store outages will reject all requests");
    }

    Ok(config)
}

/// Build the remote collaborators, or in-memory ones when offline.
fn build_collaborators(
    config: &GatewayConfig,
    offline: bool,
) -> Result<(Arc<dyn ChatPlatform>, Arc<dyn PolicyStore>)> {
    if offline {
        let guild = PlatformId::parse(&config.discord.guild_id).context("invalid guild id")?;
        info!("Running offline with in-memory chat platform and policy store");
        return Ok((
            Arc::new(InMemoryChatPlatform::new(guild)),
            Arc::new(InMemoryPolicyStore::new()),
        ));
    }

    let platform = DiscordClient::new(&config.discord).context("building Discord client")?;
    let store = FirestoreClient::new(&config.store).context("building Firestore client")?;
    Ok((Arc::new(platform), Arc::new(store)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(args.log_json)?;

    // Load configuration
    let config = load_config(&args)?;
    let (platform, store) = build_collaborators(&config, args.offline)?;

    let service = Arc::new(
        TicketGatewayService::new(config, platform, store).context("invalid gateway configuration")?,
    );

    let runner = Arc::clone(&service);
    let mut server = tokio::spawn(async move { runner.start().await });

    info!(version = zstore_gateway::VERSION, "ZStore gateway running. Press Ctrl+C to stop.");
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for Ctrl+C")?;
            info!("Shutdown signal received");
            service.shutdown();
        }
        // Server stopped on its own (bind or session failure)
        result = &mut server => return finish(result),
    }

    finish(server.await)
}

/// Flatten the server task result.
fn finish(result: Result<Result<(), GatewayError>, JoinError>) -> Result<()> {
    result
        .context("gateway task panicked")?
        .context("gateway stopped with an error")
}
