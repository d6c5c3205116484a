//! `parley channels`: list channels the bot has recorded.

use std::path::PathBuf;

pub async fn run(config: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config)?;
    let store = super::open_store(&config, false).await?;

    let channels = store.list_channels().await?;
    if channels.is_empty() {
        println!("No channels recorded yet.");
        return Ok(());
    }

    println!("{:<24} {:<24} {:<12} SELF", "ID", "NAME", "PLATFORM");
    for channel in channels {
        println!(
            "{:<24} {:<24} {:<12} {}",
            channel.id, channel.name, channel.platform, channel.self_id
        );
    }
    Ok(())
}
