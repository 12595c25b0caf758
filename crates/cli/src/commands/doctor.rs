//! `concord doctor`: Diagnose configuration and registry health.

use concord_config::AppConfig;
use concord_gateway::{GatewayState, unverified_routes};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("Concord Doctor: System Diagnostics");
    println!("===================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_path();
    let config = if config_path.exists() {
        match AppConfig::load() {
            Ok(config) => {
                println!("  ✅ Config file valid");
                config
            }
            Err(e) => {
                println!("  ❌ Config file invalid: {e}");
                issues += 1;
                AppConfig::default()
            }
        }
    } else {
        println!("  ⚠️  No config file, using defaults. Run `concord config init`");
        AppConfig::default()
    };

    match GatewayState::from_config(config) {
        Ok(state) => {
            println!(
                "  ✅ Sync registry loaded: {} syncs over {} concepts",
                state.engine.syncs().len(),
                state.engine.concepts().len()
            );
            let unverified = unverified_routes(state.engine.concepts(), state.passthrough());
            if unverified.is_empty() {
                println!("  ✅ Every route is included or excluded");
            } else {
                for route in &unverified {
                    println!("  ⚠️  Unverified route: {route}");
                }
                issues += unverified.len();
            }
        }
        Err(e) => {
            println!("  ❌ Sync registry invalid: {e}");
            issues += 1;
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
