//! Podforge CLI - Operator tools for the print-on-demand API.
//!
//! # Usage
//!
//! ```bash
//! # Check the API is up
//! pod-cli health
//!
//! # Upload designs, then create a draft from them
//! pod-cli upload sunset.png dawn.png
//! pod-cli create --template 1 --title "Sunset Tee" --price 24.00 --asset 3 --asset 4
//!
//! # Push a draft and wait for it to settle
//! pod-cli push 5 --watch
//!
//! # Manage integrations
//! pod-cli integrations
//! pod-cli gelato connect --api-key "$GELATO_API_KEY"
//! pod-cli shopify connect acme
//! pod-cli shopify return
//! pod-cli shopify disconnect
//! ```
//!
//! # Environment Variables
//!
//! - `PODFORGE_API_BASE_URL`, `PODFORGE_POLL_INTERVAL_MS`,
//!   `PODFORGE_POLL_MAX_ATTEMPTS`, `PODFORGE_REQUEST_TIMEOUT_SECS` - client
//!   configuration (see `podforge_client::config`)
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT` - optional error tracking
//! - `RUST_LOG` - log filter (default: `podforge_client=info,podforge_cli=info`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use podforge_client::{ClientConfig, PodClient};
use podforge_core::{AssetId, DraftId, Price, TemplateId};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::CommandError;

#[derive(Parser)]
#[command(name = "pod-cli")]
#[command(author, version, about = "Podforge print-on-demand CLI")]
struct Cli {
    /// REST API base URL (overrides `PODFORGE_API_BASE_URL`)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Sentry DSN for error reporting
    #[arg(long, env = "SENTRY_DSN", hide_env_values = true)]
    sentry_dsn: Option<String>,

    /// Sentry environment name
    #[arg(long, env = "SENTRY_ENVIRONMENT")]
    sentry_environment: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the API is reachable
    Health,
    /// List product templates
    Templates,
    /// List product drafts
    Drafts,
    /// Show one draft
    Draft {
        /// Draft ID
        id: DraftId,
    },
    /// Upload design files
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Create a product draft
    Create {
        /// Template ID
        #[arg(short, long)]
        template: TemplateId,

        /// Product title
        #[arg(long)]
        title: String,

        /// Product description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Retail price (e.g. 24.00)
        #[arg(short, long)]
        price: Price,

        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Design asset ID (repeatable)
        #[arg(short, long = "asset", required = true)]
        assets: Vec<AssetId>,
    },
    /// Push a draft to the storefront
    Push {
        /// Draft ID
        id: DraftId,

        /// Poll until the push settles
        #[arg(short, long)]
        watch: bool,
    },
    /// Show integration status
    Integrations,
    /// Manage the Gelato integration
    Gelato {
        #[command(subcommand)]
        action: GelatoAction,
    },
    /// Manage the Shopify integration
    Shopify {
        #[command(subcommand)]
        action: ShopifyAction,
    },
}

#[derive(Subcommand)]
enum GelatoAction {
    /// Store a Gelato API key
    Connect {
        /// Gelato API key
        #[arg(long, env = "GELATO_API_KEY", hide_env_values = true)]
        api_key: String,
    },
    /// Remove the Gelato API key
    Disconnect {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ShopifyAction {
    /// Start OAuth and print the authorization URL
    Connect {
        /// Shop name or domain (e.g. acme or acme.myshopify.com)
        shop: String,
    },
    /// Re-read the connection after authorizing in the browser
    Return,
    /// Verify the stored credential
    Test,
    /// Remove the Shopify connection
    Disconnect {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(cli: &Cli) -> Option<sentry::ClientInitGuard> {
    let dsn = cli.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: cli
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&cli);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "podforge_client=info,podforge_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CommandError> {
    let config = match cli.api_url.as_deref() {
        Some(url) => ClientConfig {
            api_base_url: ClientConfig::with_base_url(url)?.api_base_url,
            ..ClientConfig::from_env()?
        },
        None => ClientConfig::from_env()?,
    };
    let client = PodClient::from_config(&config)?;

    match cli.command {
        Commands::Health => commands::drafts::health(&client).await?,
        Commands::Templates => commands::drafts::templates(&client).await?,
        Commands::Drafts => commands::drafts::list(&client).await?,
        Commands::Draft { id } => commands::drafts::show(&client, id).await?,
        Commands::Upload { files } => commands::drafts::upload(&client, &files).await?,
        Commands::Create {
            template,
            title,
            description,
            price,
            tags,
            assets,
        } => {
            let spec = podforge_core::DraftSpec {
                template_id: template,
                title,
                description,
                price,
                tags,
                asset_ids: assets,
            };
            commands::drafts::create(&client, spec).await?;
        }
        Commands::Push { id, watch } => commands::drafts::push(&client, id, watch).await?,
        Commands::Integrations => commands::integrations::status(client).await?,
        Commands::Gelato { action } => match action {
            GelatoAction::Connect { api_key } => {
                commands::integrations::connect_gelato(client, &api_key).await?;
            }
            GelatoAction::Disconnect { yes } => {
                commands::integrations::disconnect(client, podforge_core::Provider::Gelato, yes)
                    .await?;
            }
        },
        Commands::Shopify { action } => match action {
            ShopifyAction::Connect { shop } => {
                commands::integrations::connect_shopify(client, &shop).await?;
            }
            ShopifyAction::Return => commands::integrations::shopify_return(client).await?,
            ShopifyAction::Test => commands::integrations::test_shopify(client).await?,
            ShopifyAction::Disconnect { yes } => {
                commands::integrations::disconnect(client, podforge_core::Provider::Shopify, yes)
                    .await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_create() {
        let cli = Cli::try_parse_from([
            "pod-cli", "create", "--template", "1", "--title", "Sunset Tee", "--price", "24.00",
            "--asset", "3", "--asset", "4",
        ])
        .unwrap();
        match cli.command {
            Commands::Create { assets, price, .. } => {
                assert_eq!(assets, vec![AssetId::new(3), AssetId::new(4)]);
                assert_eq!(price.to_string(), "24.00");
            }
            _ => panic!("expected create"),
        }
    }

    #[test]
    fn test_rejects_negative_price() {
        assert!(
            Cli::try_parse_from([
                "pod-cli", "create", "--template", "1", "--title", "T", "--price", "-1",
                "--asset", "3",
            ])
            .is_err()
        );
    }

    #[test]
    fn test_parses_disconnect_flags() {
        let cli = Cli::try_parse_from(["pod-cli", "shopify", "disconnect", "--yes"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Shopify {
                action: ShopifyAction::Disconnect { yes: true }
            }
        ));
    }
}
