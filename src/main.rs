// ============================================================================
// Bounty Prediction Market - Main Entry Point
// Binary YES/NO markets with a timing bounty for whoever causes the outcome

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use bounty_market::app_state::{AppState, SharedState};
use bounty_market::config::Config;
use bounty_market::routes::build_router;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("\n═══════════════════════════════════════════════");
    println!("     🎯 Bounty Prediction Market");
    println!("═══════════════════════════════════════════════\n");

    let config = Config::from_env()?;
    let addr = config.bind_addr;

    let state: SharedState = Arc::new(AppState::new(config)?);
    let shutdown_state = state.clone();
    let app = build_router(state);

    println!("\n╔════════════════════════════════════════════╗");
    println!("║   🚀 SERVER RUNNING                        ║");
    println!("║   📡 http://{:<31}║", addr);
    println!("╚════════════════════════════════════════════╝\n");

    println!("📋 Available Endpoints:");
    println!("   GET  /markets                 - List all markets");
    println!("   POST /markets                 - Create new market");
    println!("   GET  /markets/:id             - Get market details");
    println!("   GET  /markets/:id/stakes      - List stakes on a market");
    println!("   POST /markets/:id/stakes      - Place a stake");
    println!("   GET  /markets/:id/odds        - Current YES/NO odds");
    println!("   GET  /markets/:id/payout      - Preview a payout");
    println!("   POST /markets/:id/bounty      - Verify bounty claim (admin)");
    println!("   POST /markets/:id/resolve     - Resolve market (admin)");
    println!("   GET  /stakes/:staker          - Stakes placed by an address");
    println!("   GET  /admin                   - Current admin");
    println!("   POST /admin                   - Transfer admin role");
    println!("   GET  /events                  - Recent market events");
    println!("   GET  /balance/:address        - Token balance");
    println!("   POST /faucet                  - Mint test tokens (admin)");
    println!("\n🔑 Caller identity: x-wallet-address header\n");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    println!("\n\n🛑 Shutdown signal received...");
    println!("💾 Flushing state to disk...");
    match shutdown_state.flush() {
        Ok(()) => println!("✅ State saved successfully"),
        Err(e) => eprintln!("❌ Failed to save state: {}", e),
    }
    println!("👋 Goodbye!\n");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install CTRL+C handler");
    }
}
