//! `concord serve`: Start the HTTP gateway.

use concord_config::AppConfig;

pub async fn run(
    port_override: Option<u16>,
    host_override: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }
    if let Some(host) = host_override {
        config.gateway.host = host;
    }

    println!("Concord Gateway");
    println!("   Listening: {}", config.bind_addr());
    println!("   Routes:    POST {}/{{Concept}}/{{operation}}", config.gateway.base_url);
    println!("   Passthrough: {} route(s)", config.passthrough.inclusions.len());

    concord_gateway::start(config).await?;

    Ok(())
}
