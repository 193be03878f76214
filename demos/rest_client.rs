use bitflyer_lightning::core::config::ExchangeConfig;
use bitflyer_lightning::exchanges::bitflyer::{BitflyerBuilder, ENV_PREFIX};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Falls back to public endpoints only when no credentials are exported
    let config = ExchangeConfig::from_env(ENV_PREFIX).unwrap_or_else(|_| ExchangeConfig::read_only());
    let client = BitflyerBuilder::new().with_config(config).build_rest()?;

    println!("Fetching markets...");
    let markets = client.get_markets().await?;
    println!("Found {} markets", markets.len());
    for market in markets.iter().take(5) {
        println!("Market: {} ({})", market.product_code, market.market_type);
    }

    let ticker = client.get_ticker("BTC_JPY").await?;
    println!("BTC_JPY last traded at {}", ticker.ltp);

    let state = client.get_board_state("BTC_JPY").await?;
    println!("BTC_JPY board is {} ({})", state.state, state.health);

    if client.can_authenticate() {
        for balance in client.get_balance().await? {
            println!("{}: {} available of {}", balance.currency_code, balance.available, balance.amount);
        }
    } else {
        println!("Set BITFLYER_API_KEY and BITFLYER_API_SECRET to query balances");
    }

    Ok(())
}
