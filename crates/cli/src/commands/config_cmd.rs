//! `concord config`: Configuration management commands.

use concord_config::AppConfig;
use std::path::Path;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let warnings = warnings(&config);
            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Gateway:     {}{}", config.bind_addr(), config.gateway.base_url);
            println!(
                "   Engine:      {} rounds, {} records, {} ms",
                config.engine.max_rounds, config.engine.max_log_len, config.engine.request_timeout_ms
            );
            println!("   Included:    {}", config.passthrough.inclusions.len());
            println!("   Excluded:    {}", config.passthrough.exclusions.len());
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

/// Checks that pass validation but are probably mistakes.
fn warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.gateway.host == "0.0.0.0" && config.gateway.cors_origins.is_empty() {
        warnings.push("Gateway bound to 0.0.0.0 with CORS open to any origin".to_string());
    }

    for (route, reason) in &config.passthrough.inclusions {
        if reason.trim().is_empty() {
            warnings.push(format!("Passthrough route {route} has no justification"));
        }
    }

    let concepts = concord_concepts::default_concepts();
    for (route, _) in &config.passthrough.inclusions {
        if !known_route(&concepts, route) {
            warnings.push(format!("Passthrough route {route} names no concept operation"));
        }
    }
    for route in &config.passthrough.exclusions {
        if !known_route(&concepts, route) {
            warnings.push(format!("Excluded route {route} names no concept operation"));
        }
    }

    warnings
}

fn known_route(concepts: &concord_core::ConceptRegistry, route: &str) -> bool {
    let mut parts = route.trim_start_matches('/').splitn(2, '/');
    match (parts.next(), parts.next()) {
        (Some(concept), Some(operation)) => concepts.has_operation(concept, operation),
        _ => false,
    }
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::config_path().display());
    Ok(())
}

pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_path();
    if write_default(&config_path)? {
        println!("✅ Created {}", config_path.display());
    } else {
        println!("  Config file exists: {}", config_path.display());
    }
    Ok(())
}

/// Write the default config to `path` unless something is already there.
fn write_default(path: &Path) -> Result<bool, std::io::Error> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(true)
}
