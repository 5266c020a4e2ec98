//! `folio doctor`: diagnose configuration and storage.

use folio_config::AppConfig;
use folio_core::store::PageStore;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Folio Doctor: System Diagnostics");
    println!("===================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file, using defaults (run `folio onboard`)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  1 issue blocks the remaining checks.");
            return Ok(());
        }
    };

    let generation = &config.generation;
    if generation.prefers_secondary() {
        println!("  ℹ️  Preference is {}, primary backend skipped", generation.secondary.name);
    }
    for backend in [&generation.primary, &generation.secondary] {
        if backend.is_configured() {
            println!("  ✅ {} key configured ({})", backend.name, backend.models.join(", "));
        } else {
            println!("  ⚠️  No {} key configured", backend.name);
            issues += 1;
        }
    }

    match folio_store::open(&config.storage).await {
        Ok(store) => println!("  ✅ Storage ready ({})", store.name()),
        Err(e) => {
            println!("  ❌ Storage unavailable: {e}");
            issues += 1;
        }
    }

    if config.speech.enabled {
        if config.speech.api_key.is_some() {
            println!("  ✅ Speech enabled ({} / {})", config.speech.transcription_model, config.speech.speech_model);
        } else {
            println!("  ⚠️  Speech enabled but no key configured");
            issues += 1;
        }
    } else {
        println!("  ℹ️  Speech disabled");
    }

    if config.gateway.api_tokens.is_empty() {
        println!("  ⚠️  No gateway API tokens, every request runs as the local user");
        issues += 1;
    } else {
        println!("  ✅ {} gateway API token(s)", config.gateway.api_tokens.len());
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
