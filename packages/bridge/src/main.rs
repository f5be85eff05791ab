//! AII Bridge CLI
//!
//! Bridges AII between Sonic and Base with a local key:
//! - `aii-bridge routes`  - show both routes and their contracts
//! - `aii-bridge status`  - balance, allowance and gating for an amount
//! - `aii-bridge quote`   - LayerZero fee for a transfer
//! - `aii-bridge approve` - approve the source OApp for the amount
//! - `aii-bridge send`    - quote (if needed) and submit the transfer

use std::sync::{Arc, MutexGuard};

use alloy::primitives::TxHash;
use bridge::{
    amounts::format_amount, session::lock_session, BridgeClient, BridgeConfig, BridgeDirection,
    BridgeError, BridgeSession, LocalWallet, RouteTable,
};
use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "aii-bridge")]
#[command(about = "Bridge AII between Sonic and Base over LayerZero", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Transfer direction: sonic-to-base or base-to-sonic
    #[arg(short, long, global = true, default_value = "sonic-to-base")]
    direction: BridgeDirection,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args, Clone)]
struct TransferArgs {
    /// Amount in whole tokens, e.g. 12.5
    #[arg(short, long)]
    amount: String,

    /// Destination address (defaults to the signer)
    #[arg(short, long)]
    recipient: Option<String>,

    /// Slippage tolerance in percent (0-99)
    #[arg(short, long, default_value_t = 5.0)]
    slippage: f64,
}

#[derive(Subcommand)]
enum Commands {
    /// Show both routes and their contracts
    Routes,

    /// Show balance, allowance and what the amount would need
    Status {
        /// Amount to evaluate
        #[arg(short, long, default_value = "0")]
        amount: String,
    },

    /// Request a LayerZero fee quote
    Quote(TransferArgs),

    /// Approve the source OApp to spend the amount
    Approve(TransferArgs),

    /// Submit the bridge transaction
    Send {
        #[command(flatten)]
        transfer: TransferArgs,

        /// Approve first when the allowance is too low
        #[arg(long)]
        approve: bool,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = BridgeConfig::load()?;

    match cli.command {
        Commands::Routes => print_routes(&config.route_table()),
        Commands::Status { amount } => {
            let client = connect_client(&config, cli.direction).await?;
            session(&client).set_amount(amount);
            client.load_token_data().await?;
            print_status(&client);
        }
        Commands::Quote(args) => {
            let client = connect_client(&config, cli.direction).await?;
            prepare(&client, &args).await?;
            let fee = client.quote().await?;
            println!("Native fee:      {} wei", fee.nativeFee);
            println!("LZ token fee:    {}", fee.lzTokenFee);
        }
        Commands::Approve(args) => {
            let client = connect_client(&config, cli.direction).await?;
            prepare(&client, &args).await?;
            if !session(&client).needs_approval() {
                println!("Allowance already covers the amount");
                return Ok(());
            }
            let tx_hash = client.approve().await?;
            report_approval(&client, &tx_hash);
        }
        Commands::Send { transfer, approve } => {
            let client = connect_client(&config, cli.direction).await?;
            prepare(&client, &transfer).await?;
            if approve && session(&client).needs_approval() {
                let tx_hash = client.approve().await?;
                report_approval(&client, &tx_hash);
            }
            let receipt = client.bridge().await?;
            println!("Bridge transaction: {}", receipt.tx_hash);
            if let Some(url) = &receipt.explorer_url {
                println!("Explorer:           {}", url);
            }
            println!("Track delivery:     {}", receipt.layerzero_scan_url);
            info!(tx_hash = %receipt.tx_hash, "Bridge complete");
        }
    }

    Ok(())
}

fn session(client: &BridgeClient) -> MutexGuard<'_, BridgeSession> {
    lock_session(client.session())
}

/// The approval stands even if re-reading the allowance failed afterwards
fn report_approval(client: &BridgeClient, tx_hash: &TxHash) {
    println!("Approval confirmed: {}", tx_hash);
    if let Some(error) = session(client).error() {
        warn!("{}", error);
    }
}

/// Build the local wallet, connect it and move it to the source chain
async fn connect_client(config: &BridgeConfig, direction: BridgeDirection) -> Result<BridgeClient> {
    let private_key = config
        .private_key
        .as_deref()
        .ok_or_else(|| eyre!("{}", BridgeError::WalletUnavailable))?;
    let routes = config.route_table();
    let source_chain = routes.route(direction).source.chain_id;
    let wallet = Arc::new(LocalWallet::new(private_key, routes.chains(), source_chain)?);

    let mut session_state = BridgeSession::new(routes);
    session_state.set_direction(direction);
    let client = BridgeClient::new(wallet, session_state.into_shared());

    client.connect().await?;
    if !session(&client).is_on_source_chain() {
        client.switch_to_source_network().await?;
    }
    Ok(client)
}

/// Apply the transfer inputs and load the token state they are checked against
async fn prepare(client: &BridgeClient, args: &TransferArgs) -> Result<()> {
    {
        let mut s = session(client);
        s.set_amount(args.amount.clone());
        if let Some(recipient) = &args.recipient {
            s.set_recipient(recipient.clone());
        }
        s.set_slippage(args.slippage);
    }
    client.load_token_data().await?;
    Ok(())
}

fn print_routes(routes: &RouteTable) {
    for direction in [BridgeDirection::SonicToBase, BridgeDirection::BaseToSonic] {
        let route = routes.route(direction);
        println!("{} ({} -> {})", direction, route.source.label, route.destination.label);
        println!("  source chain:   {} ({})", route.source.chain_id, route.source.chain_id_hex());
        println!("  source OApp:    {}", route.source.oapp_address);
        match route.source.token_address {
            Some(token) => println!("  source token:   {}", token),
            None => println!("  source token:   not configured"),
        }
        println!("  destination:    eid {}", route.dst_eid());
        println!("  rpc:            {}", route.source.rpc_url());
        println!("  layerzero scan: {}", route.layerzero_scan_url());
    }
}

fn print_status(client: &BridgeClient) {
    let s = session(client);
    let route = s.route();
    let decimals = s.token_decimals();
    println!("Direction:        {}", s.direction());
    if let Some(account) = s.account() {
        println!("Account:          {}", account);
    }
    println!(
        "Network:          {} (source {})",
        s.chain_id().map(|c| c.to_string()).unwrap_or_else(|| "unknown".to_string()),
        route.source.chain_id
    );
    println!(
        "Balance:          {} {}",
        format_amount(s.token_balance(), decimals),
        bridge::routes::TOKEN_SYMBOL
    );
    println!("Allowance:        {}", format_amount(s.allowance(), decimals));
    println!("Amount (LD):      {}", s.amount_ld());
    println!("Min received:     {}", s.min_amount_ld());
    println!("Needs approval:   {}", s.needs_approval());
    println!("Balance ok:       {}", s.has_sufficient_balance());
    println!("Can quote:        {}", s.can_quote());
    println!("Can bridge:       {}", s.can_bridge());
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default = if verbose { "info,bridge=debug" } else { "warn,bridge=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}
