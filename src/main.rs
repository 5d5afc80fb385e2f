use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use tracing::{info, warn};

use walletrecap::chain::alchemy::AlchemyEndpoints;
use walletrecap::chain::rpc::http_provider;
use walletrecap::chain::{
    AlchemyClient, EnsNameService, Network, NameService, PerNetwork, RpcBlockClock,
};
use walletrecap::config::Config;
use walletrecap::recap::{Capabilities, RecapPipeline, WalletRecap};

const CONFIG_PATH: &str = "walletrecap.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut json_output = false;
    let mut input = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--json" => json_output = true,
            _ if input.is_none() => input = Some(arg),
            _ => anyhow::bail!("unexpected argument '{}'", arg),
        }
    }
    let Some(input) = input else {
        eprintln!("Usage: walletrecap <address-or-name> [--json]");
        eprintln!("Example: walletrecap vitalik.eth");
        eprintln!("         walletrecap 0xd8da6bf26964af9d7eed9e03e53415d37aa96045 --json");
        std::process::exit(1);
    };

    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = if Path::new(CONFIG_PATH).exists() {
        Config::load(Path::new(CONFIG_PATH))?
    } else {
        Config::from_env()
    };

    // Logs go to stderr so --json output stays clean.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));
    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }

    config.validate()?;
    info!("walletrecap v{} starting", env!("CARGO_PKG_VERSION"));

    let caps = build_capabilities(&config)?;
    let pipeline = RecapPipeline::new(caps, config.recap.clone());

    let recap = pipeline.run(&input).await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&recap)?);
    } else {
        print_report(&config, &recap);
    }
    Ok(())
}

fn build_capabilities(config: &Config) -> anyhow::Result<Capabilities> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.recap.request_timeout_secs.max(1) * 2))
        .build()?;

    let endpoints = PerNetwork::new(
        AlchemyEndpoints {
            rpc_url: config.networks.primary.alchemy_url.clone(),
            nft_api_url: config.networks.primary.nft_api_url.clone(),
        },
        AlchemyEndpoints {
            rpc_url: config.networks.secondary.alchemy_url.clone(),
            nft_api_url: config.networks.secondary.nft_api_url.clone(),
        },
    );
    let alchemy = Arc::new(AlchemyClient::new(
        http,
        endpoints,
        config.recap.request_timeout(),
    ));

    let providers = PerNetwork::new(
        http_provider(&config.networks.primary.rpc_url)?,
        http_provider(&config.networks.secondary.rpc_url)?,
    );

    let mut names: Vec<Arc<dyn NameService>> = Vec::new();
    for network in Network::ALL {
        let network_config = config.networks.get(network);
        let Some(registry) = network_config.name_registry.as_deref() else {
            continue;
        };
        match Address::from_str(registry) {
            Ok(registry) => names.push(Arc::new(EnsNameService::new(
                providers.get(network).clone(),
                registry,
                network_config.reverse_namespace.clone(),
                network,
            ))),
            Err(e) => warn!(network = %network, error = %e, "invalid name registry, skipping"),
        }
    }
    info!(name_services = names.len(), "capabilities ready");

    Ok(Capabilities {
        names,
        transfers: alchemy.clone(),
        clock: Arc::new(RpcBlockClock::new(providers)),
        assets: alchemy,
    })
}

fn print_report(config: &Config, recap: &WalletRecap) {
    let overview = &recap.overview;
    let primary = &config.networks.primary;
    let secondary = &config.networks.secondary;

    println!("\n{}", "=".repeat(70));
    println!("  WALLET RECAP: {}", recap.identity.label());
    println!("{}", "=".repeat(70));

    println!("\n## Overview");
    println!("  Address:        {}", recap.identity.canonical_address);
    if let Some(name) = &recap.identity.display_name {
        println!("  Name:           {}", name);
    }
    println!("  Age:            {} days", overview.age_in_days);
    println!("  Transactions:   {}", overview.total_transactions);
    println!(
        "  {:15} {}",
        format!("{}:", secondary.label),
        overview.secondary_network_transactions
    );
    println!(
        "  Est. cost:      {} {}",
        overview.estimated_cost_in_native_units, primary.native_symbol
    );
    println!(
        "  Launch user:    {}",
        if overview.secondary_network_launch_participant { "yes" } else { "no" }
    );
    println!("  Notable asset:  {}", overview.notable_asset);

    println!("\n## Activity ({} months)", recap.history.len());
    let peak = recap.history.iter().map(|b| b.count).max().unwrap_or(0).max(1);
    for bucket in &recap.history {
        let width = (bucket.count * 40 / peak) as usize;
        println!("  {}  {:>5}  {}", bucket.bucket_label, bucket.count, "#".repeat(width));
    }

    println!("\n## Top counterparties");
    if recap.top_counterparties.is_empty() {
        println!("  none");
    }
    for (rank, c) in recap.top_counterparties.iter().enumerate() {
        println!("  {}. {:16} {}", rank + 1, c.counterparty_label, c.interaction_count);
    }
    println!();
}
