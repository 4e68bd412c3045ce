//! hlvault - strategy vault command line.
//!
//! Runs one action against the HyperEVM strategy contract and prints the
//! resulting `ActionResponse` as JSON.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use hlvault_bridge::BridgeRequest;
use hlvault_client::{ClientConfig, LimitOrder, StrategyClient, DEFAULT_SLIPPAGE, DISPATCHED_FUNCTIONS};
use hlvault_core::{ActionResponse, Cloid, OrderSide, TimeInForce};
use hlvault_telemetry::SessionStatsReporter;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::info;

/// Trade, transfer and bridge through the Hyperliquid strategy vault
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via HLVAULT_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Side {
    Buy,
    Sell,
}

impl From<Side> for OrderSide {
    fn from(side: Side) -> Self {
        match side {
            Side::Buy => OrderSide::Buy,
            Side::Sell => OrderSide::Sell,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the mid price of an asset
    Price { asset: String },
    /// Place a limit order
    LimitOrder {
        #[arg(long)]
        asset: String,
        #[arg(long, value_enum)]
        side: Side,
        #[arg(long)]
        price: Decimal,
        #[arg(long)]
        size: Decimal,
        #[arg(long)]
        reduce_only: bool,
        /// ALO, GTC or IOC
        #[arg(long, default_value = "GTC")]
        tif: TimeInForce,
        #[arg(long)]
        cloid: Option<Cloid>,
    },
    /// Place an IOC order priced through the mid
    MarketOrder {
        #[arg(long)]
        asset: String,
        #[arg(long, value_enum)]
        side: Side,
        #[arg(long)]
        size: Decimal,
        #[arg(long, default_value_t = DEFAULT_SLIPPAGE)]
        slippage: Decimal,
        #[arg(long)]
        cloid: Option<Cloid>,
    },
    /// Close the subvault's position in an asset
    ClosePosition {
        #[arg(long)]
        asset: String,
        /// Defaults to the whole position
        #[arg(long)]
        size: Option<Decimal>,
        #[arg(long, default_value_t = DEFAULT_SLIPPAGE)]
        slippage: Decimal,
        #[arg(long)]
        cloid: Option<Cloid>,
    },
    /// Cancel an order by exchange order id
    CancelOid {
        #[arg(long)]
        asset: String,
        #[arg(long)]
        oid: u64,
    },
    /// Cancel an order by client order id
    CancelCloid {
        #[arg(long)]
        asset: String,
        #[arg(long)]
        cloid: Cloid,
    },
    /// Move USDC from spot to perp
    TransferToPerp {
        #[arg(long)]
        amount: Decimal,
    },
    /// Move USDC from perp to spot
    TransferToSpot {
        #[arg(long)]
        amount: Decimal,
    },
    /// Withdraw a spot token to the strategy's EVM account
    SpotSend {
        #[arg(long)]
        recipient: String,
        #[arg(long)]
        token: String,
        #[arg(long)]
        amount: Decimal,
    },
    /// Bridge USDC from Ethereum to HyperEVM over CCTP
    BridgeToHyper(BridgeArgs),
    /// Bridge USDC from HyperEVM to Ethereum over CCTP
    BridgeToMainnet(BridgeArgs),
}

#[derive(clap::Args, Debug)]
struct BridgeArgs {
    #[arg(long)]
    amount: Decimal,
    /// Fee in USDC units; skips the Iris quote
    #[arg(long)]
    max_fee: Option<i64>,
    #[arg(long)]
    finality_threshold: Option<i64>,
}

impl From<BridgeArgs> for BridgeRequest {
    fn from(args: BridgeArgs) -> Self {
        Self {
            amount: args.amount,
            max_fee: args.max_fee,
            min_finality_threshold: args.finality_threshold,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    hlvault_telemetry::init_logging(args.verbose)?;

    info!("Starting hlvault v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > HLVAULT_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("HLVAULT_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = ClientConfig::from_file(&config_path)?;

    let client = StrategyClient::from_config(&config).await?;
    client.connect().await?;

    let stats = SessionStatsReporter::new(DISPATCHED_FUNCTIONS);
    let response = run(&client, args.command).await?;
    client.disconnect();
    stats.log_summary();

    println!("{}", serde_json::to_string_pretty(&response)?);
    if !response.success {
        bail!(response.error.unwrap_or_else(|| "action failed".to_string()));
    }
    Ok(())
}

async fn run(client: &StrategyClient, command: Command) -> Result<ActionResponse> {
    let response = match command {
        Command::Price { asset } => {
            let mid = client.get_market_price(&asset).await?;
            ActionResponse {
                success: true,
                raw_response: Some(json!({ "asset": asset, "mid": mid.to_string() })),
                ..ActionResponse::default()
            }
        }
        Command::LimitOrder {
            asset,
            side,
            price,
            size,
            reduce_only,
            tif,
            cloid,
        } => {
            let order = LimitOrder {
                reduce_only,
                tif,
                cloid,
                ..LimitOrder::new(asset, side.into(), price, size)
            };
            client.limit_order(&order).await
        }
        Command::MarketOrder {
            asset,
            side,
            size,
            slippage,
            cloid,
        } => {
            client
                .market_order(&asset, side.into(), size, slippage, cloid)
                .await
        }
        Command::ClosePosition {
            asset,
            size,
            slippage,
            cloid,
        } => {
            client
                .market_close_position(&asset, size, slippage, cloid)
                .await
        }
        Command::CancelOid { asset, oid } => client.cancel_order_by_oid(&asset, oid).await,
        Command::CancelCloid { asset, cloid } => client.cancel_order_by_cloid(&asset, cloid).await,
        Command::TransferToPerp { amount } => client.usd_class_transfer_to_perp(amount).await,
        Command::TransferToSpot { amount } => client.usd_class_transfer_to_spot(amount).await,
        Command::SpotSend {
            recipient,
            token,
            amount,
        } => client.spot_send(&recipient, &token, amount).await,
        Command::BridgeToHyper(args) => {
            client
                .bridge_mainnet_to_hyperliquid(&BridgeRequest::from(args))
                .await
        }
        Command::BridgeToMainnet(args) => {
            client
                .bridge_hyperliquid_to_mainnet(&BridgeRequest::from(args))
                .await
        }
    };
    Ok(response)
}
