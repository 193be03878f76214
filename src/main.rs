use bitflyer_lightning::exchanges::bitflyer::{BitflyerBuilder, Channel};
use tokio::time::{sleep, Duration};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let product_code = std::env::args().nth(1).unwrap_or_else(|| "BTC_JPY".to_string());

    let ws = BitflyerBuilder::new().connect_ws().await?;
    ws.on_ticker(|ticker| {
        info!(
            product_code = %ticker.product_code,
            best_bid = %ticker.best_bid,
            best_ask = %ticker.best_ask,
            ltp = %ticker.ltp,
            "ticker"
        );
    });
    ws.subscribe(&Channel::ticker(&product_code)).await?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        () = sleep(Duration::from_secs(60)) => {}
    }

    ws.close().await;
    Ok(())
}
