//! `ferrodesk serve`: start the HTTP gateway.

use std::path::Path;

pub async fn run(config_path: Option<&Path>, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path)?;
    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }

    println!("ferrodesk gateway");
    println!("   Listening: http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Provider:  {} ({})", config.provider.name, config.provider.model);
    println!("   Memory:    {}", config.memory.backend);
    println!("   Knowledge: {}", config.knowledge.backend);

    ferrodesk_gateway::start(config).await?;
    Ok(())
}
