use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use multiship::api::{CheckoutGateway, StorefrontGateway};
use multiship::cache::{ConsignmentCache, FileConsignmentCache};
use multiship::config::Config;
use multiship::env_vars;
use multiship::logging;
use multiship::model::{EntryKey, ItemConfigurationModel};
use multiship::reconcile::{ReconcileReport, ReconcileScope, Reconciler};
use multiship::types::{Address, LineItemId};
use multiship::wizard::{ShippingWizard, WizardSettings};

#[derive(Parser)]
#[command(name = "multiship")]
#[command(about = "Ship each cart item to its own recipient")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Checkout id (defaults to MULTISHIP_CHECKOUT_ID)
    #[arg(long)]
    checkout: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show each item's shipping configuration without changing anything
    Status,

    /// Run a reconciliation pass against the checkout
    Reconcile,

    /// Assign an address (and optionally an option) to a line item
    Assign {
        /// Line item id
        item: String,

        /// JSON file with the shipping address
        #[arg(short, long)]
        address: PathBuf,

        /// Shipping option id to select
        #[arg(short, long)]
        option: Option<String>,

        /// Split the item into single-quantity entries first
        #[arg(long)]
        split: bool,

        /// Delivery date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Gift message for the item
        #[arg(long)]
        gift_message: Option<String>,
    },

    /// Leave the shipping step once every item is configured
    Complete {
        /// Billing address differs from shipping
        #[arg(long)]
        separate_billing: bool,
    },

    /// Inspect or clear the local consignment cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// List recognized environment variables
    Env,

    /// Write the effective configuration to .multiship/config.toml
    Init,
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached records
    List,
    /// Remove every cached record
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let logging_handle = logging::init_logging(&config, cli.debug)?;

    let result = run(&cli, &config).await;

    if let Some(log_path) = logging_handle.log_file_path {
        if log_path.exists() {
            eprintln!("Session log: {}", log_path.display());
        }
    }

    result
}

async fn run(cli: &Cli, config: &Config) -> Result<()> {
    match &cli.command {
        Commands::Status => cmd_status(config, &checkout_id(cli)?).await,
        Commands::Reconcile => cmd_reconcile(config, &checkout_id(cli)?).await,
        Commands::Assign {
            item,
            address,
            option,
            split,
            date,
            gift_message,
        } => {
            let request = AssignRequest {
                item: LineItemId::from(item.as_str()),
                address: read_address(address)?,
                option: option.clone(),
                split: *split,
                date: *date,
                gift_message: gift_message.clone(),
            };
            cmd_assign(config, &checkout_id(cli)?, request).await
        }
        Commands::Complete { separate_billing } => {
            cmd_complete(config, &checkout_id(cli)?, !separate_billing).await
        }
        Commands::Cache { action } => cmd_cache(config, &checkout_id(cli)?, action),
        Commands::Env => {
            cmd_env();
            Ok(())
        }
        Commands::Init => {
            config.save()?;
            println!("Wrote {}", Config::project_config_path().display());
            Ok(())
        }
    }
}

fn checkout_id(cli: &Cli) -> Result<String> {
    match &cli.checkout {
        Some(id) => Ok(id.clone()),
        None => std::env::var("MULTISHIP_CHECKOUT_ID")
            .context("No checkout given: pass --checkout or set MULTISHIP_CHECKOUT_ID"),
    }
}

fn read_address(path: &Path) -> Result<Address> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read address file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid address JSON in {}", path.display()))
}

fn connect(
    config: &Config,
    checkout_id: &str,
) -> Result<(Arc<dyn CheckoutGateway>, Arc<dyn ConsignmentCache>)> {
    let gateway = StorefrontGateway::from_config(&config.gateway, checkout_id)?;
    let cache = FileConsignmentCache::open(config.cache_path(checkout_id))?;
    Ok((Arc::new(gateway), Arc::new(cache)))
}

async fn start_wizard(config: &Config, checkout_id: &str) -> Result<ShippingWizard> {
    let (gateway, cache) = connect(config, checkout_id)?;
    let mut wizard = ShippingWizard::new(gateway, cache, WizardSettings::from_config(config));
    let report = wizard.start().await?;
    print_report(&report);
    Ok(wizard)
}

async fn cmd_status(config: &Config, checkout_id: &str) -> Result<()> {
    let (gateway, cache) = connect(config, checkout_id)?;
    let cart = gateway.get_cart().await?;
    let consignments = gateway.list_consignments().await?;

    let settings = WizardSettings::from_config(config);
    let reconciler = Reconciler::new(gateway, cache, settings.rules());
    let mut model = ItemConfigurationModel::from_cart(&cart);
    reconciler.merge_snapshot(&cart, &consignments, &mut model, &ReconcileScope::default());

    println!("Checkout {} ({} consignments)", checkout_id, consignments.len());
    println!("{}", "─".repeat(60));
    for entry in model.entries() {
        let name = cart
            .line_item(entry.line_item_id())
            .map_or("?", |item| item.name.as_str());
        let mark = if entry.configured { "✓" } else { "·" };
        println!("{} {} {} x{}", mark, entry.key, name, entry.quantity);
        if let Some(address) = &entry.shipping_address {
            println!("    To:     {}", address.summary());
        }
        if let Some(option) = &entry.selected_shipping_option {
            println!("    Option: {} ({})", option.description, option.id);
        }
        if let Some(date) = &entry.delivery_date {
            println!("    Date:   {}", date);
        }
    }

    let incomplete = consignments.iter().filter(|c| !c.is_complete()).count();
    if incomplete > 0 {
        println!();
        println!("{} incomplete consignment(s); run 'multiship reconcile'", incomplete);
    }
    Ok(())
}

async fn cmd_reconcile(config: &Config, checkout_id: &str) -> Result<()> {
    let wizard = start_wizard(config, checkout_id).await?;
    if wizard.all_configured() {
        println!("All items configured");
    } else if let Some(key) = wizard.current() {
        println!("Next item to configure: {}", key);
    }
    Ok(())
}

struct AssignRequest {
    item: LineItemId,
    address: Address,
    option: Option<String>,
    split: bool,
    date: Option<NaiveDate>,
    gift_message: Option<String>,
}

async fn cmd_assign(config: &Config, checkout_id: &str, request: AssignRequest) -> Result<()> {
    let mut wizard = start_wizard(config, checkout_id).await?;

    let Some(item) = wizard.cart().line_item(&request.item).cloned() else {
        bail!("Line item {} is not in the cart", request.item);
    };

    if request.split {
        let siblings = wizard.split_item(&EntryKey::whole(item.id.clone()), item.quantity)?;
        println!("Split {} into {} entries", item.id, siblings.len());
    }

    // Target the first entry of the item still needing configuration
    let entries = wizard.model().entries_for(&item.id);
    let target = entries
        .iter()
        .find(|e| !e.configured)
        .or_else(|| entries.first())
        .map(|e| e.key.clone());
    let Some(key) = target else {
        bail!("No configuration entry for {}", item.id);
    };

    if wizard.model().get(&key).is_some_and(|e| e.configured) {
        let index = wizard
            .model()
            .order()
            .position(&key)
            .context("Entry missing from order")?;
        wizard.edit_existing(index)?;
    }

    wizard.select_address(&key, request.address).await?;

    match &request.option {
        // Auto-recommend may already have finished the item
        Some(option_id) if wizard.current() == Some(&key) => {
            wizard.select_shipping_option(&key, option_id).await?;
        }
        Some(_) => {}
        None => {
            if let Some(entry) = wizard.model().get(&key) {
                println!("Available shipping options for {}:", key);
                for option in &entry.available_shipping_options {
                    let marker = if option.is_recommended { " (recommended)" } else { "" };
                    println!("  {}  {}  {:.2}{}", option.id, option.description, option.cost, marker);
                }
            }
        }
    }

    if let Some(date) = request.date {
        if wizard.current() == Some(&key) {
            wizard.select_delivery_date(&key, date).await?;
        }
    }
    if let Some(message) = &request.gift_message {
        if wizard.current() == Some(&key) {
            wizard.set_gift_message(&key, message).await?;
        }
    }
    if wizard.current() == Some(&key) && request.option.is_some() {
        // Finishes the item when nothing auto-advanced past it
        if let Err(e) = wizard.continue_to_next() {
            println!("{} is not complete yet: {}", key, e);
        }
    }

    if wizard.all_configured() {
        println!("All items configured");
    } else if let Some(next) = wizard.current() {
        println!("Next item to configure: {}", next);
    }
    Ok(())
}

async fn cmd_complete(config: &Config, checkout_id: &str, billing_same: bool) -> Result<()> {
    let mut wizard = start_wizard(config, checkout_id).await?;
    wizard.complete(billing_same)?;

    // The session is over; cached records are no longer needed
    let cache = FileConsignmentCache::open(config.cache_path(checkout_id))?;
    cache.clear()?;
    println!("Shipping step complete");
    Ok(())
}

fn cmd_cache(config: &Config, checkout_id: &str, action: &CacheAction) -> Result<()> {
    let cache = FileConsignmentCache::open(config.cache_path(checkout_id))?;
    match action {
        CacheAction::List => {
            let records = cache.records();
            if records.is_empty() {
                println!("Cache is empty ({})", cache.path().display());
                return Ok(());
            }
            println!("Cached consignments ({})", records.len());
            println!("{}", "─".repeat(60));
            for record in records {
                println!(
                    "{} {} x{} -> {} [{}]",
                    record.consignment_id,
                    record.line_item_id,
                    record.quantity,
                    record.shipping_address.summary(),
                    record.selected_shipping_option_id
                );
                if let Some(date) = &record.selected_delivery_date {
                    println!("    Date: {}", date);
                }
            }
        }
        CacheAction::Clear => {
            cache.clear()?;
            println!("Cache cleared");
        }
    }
    Ok(())
}

fn cmd_env() {
    for var in env_vars::ENV_VARS {
        match var.default {
            Some(default) => println!("{:<45} {} (default: {})", var.name, var.description, default),
            None => println!("{:<45} {}", var.name, var.description),
        }
    }
}

fn print_report(report: &ReconcileReport) {
    if report.remote_unavailable {
        println!("Consignments could not be read; showing local state");
    }
    if report.incomplete_handled() + report.split_resets + report.resurrected > 0 {
        println!(
            "Reconciled: {} restored, {} deleted, {} split resets, {} recreated",
            report.restored, report.deleted, report.split_resets, report.resurrected
        );
    }
    if report.failures > 0 {
        println!("{} reconciliation step(s) failed; see the log", report.failures);
    }
}
