//! `folio gateway`: start the HTTP API server.

use folio_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("📄 Folio Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Storage:   {} ({})", config.storage.backend, config.storage.url);
    println!("   API tokens: {}", config.gateway.api_tokens.len());

    folio_gateway::start(config).await?;

    Ok(())
}
