use herald::chain::rpc::{connect_http, connect_http_with_signer, OracleRpc, RegistryRpc};
use herald::config::Config;
use herald::links::{BitlyClient, Shortener};
use herald::oracle::{OracleBot, OracleSource};
use herald::payload::GatewayFetcher;
use herald::registry::{RegistryBot, RegistrySource};
use herald::social::StatusApi;
use herald::store::ValkeyStore;
use herald::supervisor::{RestartPolicy, Supervisor};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("herald.toml"));
    let config = if config_path.exists() {
        Config::load(&config_path)?
    } else {
        Config::from_env()
    };

    // Initialize logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .init();
    }

    info!("herald v{} starting", env!("CARGO_PKG_VERSION"));

    if config.registry.is_empty() && config.oracle.is_empty() {
        warn!("no sources configured, nothing to watch");
        return Ok(());
    }

    let store = ValkeyStore::connect(&config.store.url, &config.store.prefix).await?;
    let http = reqwest::Client::new();

    let publisher = StatusApi::new(
        http.clone(),
        config.social.api_base.clone(),
        config.social.upload_base.clone(),
        config.social.bearer_token.clone(),
    );
    let shortener = if config.links.token.is_empty() {
        info!("no shortener token configured, posting full links");
        Shortener::Passthrough
    } else {
        Shortener::Bitly(BitlyClient::new(
            http.clone(),
            config.links.api_base.clone(),
            config.links.token.clone(),
        ))
    };
    let payloads = GatewayFetcher::new(http.clone(), config.payload.gateway.clone());

    let provider = connect_http(&config.chain.rpc_url)?;
    let poll_interval = Duration::from_secs(config.poll.interval_secs);
    let restart = RestartPolicy {
        base: Duration::from_secs(config.poll.restart_base_secs),
        max: Duration::from_secs(config.poll.restart_max_secs),
    };

    let mut bots = Vec::new();

    for source in &config.registry {
        let chain = RegistryRpc::new(provider.clone(), source.registry, source.arbitrator);
        let bot = RegistryBot::new(
            chain,
            store.clone(),
            publisher.clone(),
            shortener.clone(),
            payloads.clone(),
            RegistrySource {
                key: source.key.clone(),
                registry: source.registry,
                item_base_url: source.item_base_url.clone(),
                explorer_base_url: source.explorer_base_url.clone(),
                backfill: source.backfill,
            },
        );
        info!(
            source = %source.key,
            registry = %source.registry,
            backfill = source.backfill,
            "starting registry bot"
        );
        let supervisor = Supervisor::new(bot, store.clone(), poll_interval);
        bots.push(tokio::spawn(supervisor.supervise(restart)));
    }

    for source in &config.oracle {
        // Each oracle bot sends transactions, so its provider carries
        // the reporter's signer.
        let signing = connect_http_with_signer(&config.chain.rpc_url, &config.chain.private_key)?;
        let chain = OracleRpc::new(signing, source.oracle, source.proxy);
        let bot = OracleBot::new(
            chain,
            OracleSource {
                key: source.key.clone(),
                backfill: source.backfill,
            },
        );
        info!(
            source = %source.key,
            proxy = %source.proxy,
            backfill = source.backfill,
            "starting oracle bot"
        );
        let supervisor = Supervisor::new(bot, store.clone(), poll_interval);
        bots.push(tokio::spawn(supervisor.supervise(restart)));
    }

    info!(bots = bots.len(), "all bots running - press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutting down...");
    for bot in &bots {
        bot.abort();
    }
    Ok(())
}
