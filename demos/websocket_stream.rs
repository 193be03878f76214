use bitflyer_lightning::exchanges::bitflyer::{BitflyerBuilder, Channel, MessageRouter};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("🚀 Streaming bitFlyer Lightning public channels");

    // Register handlers before connecting so the first frames are not missed
    let router = Arc::new(MessageRouter::new());
    router.on_ticker(|ticker| {
        println!(
            "📊 Ticker {}: bid {} / ask {} (ltp {})",
            ticker.product_code, ticker.best_bid, ticker.best_ask, ticker.ltp
        );
    });
    router.on_executions(|batch| {
        for execution in &batch.executions {
            println!(
                "💰 Trade {}: {} {} @ {}",
                batch.product_code, execution.side, execution.size, execution.price
            );
        }
    });
    router.on_board_snapshot(|snapshot| {
        println!(
            "📖 Snapshot {}: mid {} with {} bids / {} asks",
            snapshot.product_code,
            snapshot.data.mid_price,
            snapshot.data.bids.len(),
            snapshot.data.asks.len()
        );
    });

    let ws = BitflyerBuilder::new().connect_ws_with_router(router).await?;

    for channel in [
        Channel::ticker("BTC_JPY"),
        Channel::executions("BTC_JPY"),
        Channel::board_snapshot("BTC_JPY"),
    ] {
        ws.subscribe(&channel).await?;
        println!("✅ Subscribed to {}", channel);
    }

    sleep(Duration::from_secs(30)).await;

    ws.unsubscribe(&Channel::executions("BTC_JPY")).await?;
    println!("🔍 Still subscribed to: {:?}", ws.subscriptions().await);

    ws.close().await;
    println!("🏁 Session {:?}", ws.state());
    Ok(())
}
