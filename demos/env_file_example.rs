use bitflyer_lightning::core::config::{ConfigError, ExchangeConfig};
use bitflyer_lightning::exchanges::bitflyer::{BitflyerBuilder, Channel, ENV_PREFIX};
use tokio::time::{sleep, Duration};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("🔧 bitFlyer .env File Configuration");
    println!("===================================\n");

    // Looks for .env in the working directory, then falls back to the process environment
    let config = match ExchangeConfig::from_env_auto(ENV_PREFIX) {
        Ok(config) => config,
        Err(ConfigError::MissingEnvironmentVariable(var)) => {
            println!("   ⚠️  Missing variable: {}", var);
            println!("   💡 Add '{}=your_value' to your .env file", var);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("   ✅ Configuration loaded");
    println!("   🔍 Has credentials: {}", config.has_credentials());

    let builder = BitflyerBuilder::new().with_config(config);
    let ws = builder.connect_ws_authenticated().await?;

    ws.on_order_events(|event| {
        println!(
            "   📬 {} {} {:?}",
            event.event_type, event.product_code, event.child_order_acceptance_id
        );
    });
    ws.subscribe(&Channel::child_order_events()).await?;
    ws.subscribe(&Channel::parent_order_events()).await?;

    println!("   👂 Listening for order events for 60 seconds");
    sleep(Duration::from_secs(60)).await;

    ws.close().await;
    Ok(())
}
