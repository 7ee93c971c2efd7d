//! Voyage FX command-line tool
//!
//! Inspect the exchange-rate table, convert amounts and aggregate booking
//! revenue the same way the booking portal does.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voyage_common::{Currency, CURRENCY_OPTIONS};
use voyage_fx::{RateStore, RateStoreConfig, RevenueAggregator};

mod commands;

/// Voyage exchange-rate CLI
#[derive(Parser, Debug)]
#[command(name = "voyage-fx")]
#[command(about = "Exchange rates and currency conversion for the Voyage booking portal")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Use the built-in fallback rates without contacting the rate API
    #[arg(long, global = true)]
    offline: bool,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current rate table
    Rates {
        /// Refresh even if the cached rates are recent; fail if the API is down
        #[arg(long)]
        force: bool,
    },
    /// Convert an amount between two currencies
    Convert {
        #[arg(allow_negative_numbers = true)]
        amount: f64,
        from: String,
        to: String,
    },
    /// Sum approved bookings from a JSON file into one currency
    Revenue {
        /// JSON array of bookings as returned by the portal backend
        bookings: PathBuf,

        /// Reporting currency
        #[arg(long, default_value = "TND")]
        currency: String,

        /// Currency assumed for bookings that carry none
        #[arg(long, default_value = "TND")]
        default_currency: String,
    },
    /// List the display currencies offered to users
    Currencies,
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );

    if std::env::var_os("VOYAGE_LOG_JSON").is_some() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let args = Args::parse();

    let store = RateStore::from_config(RateStoreConfig::from_env()).map_err(|e| {
        error!(error = %e, "Failed to set up rate store");
        e
    })?;
    let refresh = !args.offline;

    let output = match args.command {
        Command::Rates { force } => {
            if refresh {
                if force {
                    store.refresh().await?;
                } else {
                    store.ensure_fresh(false).await;
                }
            }
            commands::rates(&store, args.json)?
        }
        Command::Convert { amount, from, to } => {
            if refresh {
                store.ensure_fresh(false).await;
            }
            let conversion = store.convert_detailed(
                amount,
                Currency::normalized(&from).code(),
                Currency::normalized(&to).code(),
            );
            commands::conversion(&conversion, args.json)?
        }
        Command::Revenue {
            bookings,
            currency,
            default_currency,
        } => {
            let bookings = commands::load_bookings(&bookings)?;
            info!(count = bookings.len(), "Loaded bookings");

            let aggregator = RevenueAggregator::new(Currency::normalized(&currency))
                .with_default_currency(Currency::normalized(&default_currency));
            let report = if refresh {
                aggregator.aggregate_fresh(&store, &bookings).await
            } else {
                aggregator.aggregate(&store.converter(), &bookings)
            };
            commands::revenue(&report, args.json)?
        }
        Command::Currencies => commands::currencies(CURRENCY_OPTIONS, &store.snapshot(), args.json)?,
    };

    println!("{}", output);
    Ok(())
}
