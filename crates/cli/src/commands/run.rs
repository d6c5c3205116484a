//! `parley run`: connect to Satori and run the decision loop.

use parley_agent::{
    ActionRegistry, BotContext, BotRuntime, Dispatcher, Ingestor, Planner, Scheduler,
};
use parley_providers::OpenAiCompatProvider;
use parley_satori::SatoriClient;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub async fn run(
    config: Option<PathBuf>,
    memory_store: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config)?;
    let credentials = config.llm.require()?;

    let provider = Arc::new(OpenAiCompatProvider::from_credentials(&credentials));
    let planner = Planner::new(provider, &config.llm, &config.bot)?;

    let store = super::open_store(&config, memory_store).await?;
    let satori = Arc::new(SatoriClient::new(config.satori.clone()));

    let registry = ActionRegistry::standard(store.clone(), satori.clone(), config.bot.name.clone());
    info!(
        model = %planner.model(),
        store = %store.name(),
        actions = ?registry.names(),
        "Starting Parley"
    );

    let ctx = Arc::new(BotContext::new(config.limits.clone()));
    let scheduler = Arc::new(Scheduler::new(
        ctx,
        Arc::new(planner),
        Dispatcher::new(Arc::new(registry)),
        store.clone(),
    ));
    let ingestor = Arc::new(Ingestor::new(scheduler, store));
    let runtime = BotRuntime::new(satori, ingestor);

    runtime.start().await?;
    println!("🤖 {} is listening on {}", config.bot.name, config.satori.ws_url);
    println!("   Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    runtime.shutdown().await;
    Ok(())
}
