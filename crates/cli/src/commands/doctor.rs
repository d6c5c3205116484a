//! `parley doctor`: diagnose configuration.

use parley_config::AppConfig;
use std::path::PathBuf;

/// Print one checklist line; returns 1 on failure.
fn check(ok: bool, pass: &str, fail: &str) -> usize {
    if ok {
        println!("  ✓ {pass}");
        0
    } else {
        println!("  ✗ {fail}");
        1
    }
}

fn summary(issues: usize) {
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }
}

pub async fn run(config: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Parley Doctor — System Diagnostics");
    println!("====================================\n");

    let mut issues = 0;

    let config_path = config
        .clone()
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));
    issues += check(
        config_path.exists(),
        "Config file present",
        &format!(
            "No config file at {}, run `parley config` for a template",
            config_path.display()
        ),
    );

    let config = match super::load_config(config) {
        Ok(config) => {
            println!("  ✓ Config valid");
            config
        }
        Err(e) => {
            issues += check(false, "", &e.to_string());
            summary(issues);
            return Ok(());
        }
    };

    issues += match config.llm.require() {
        Ok(credentials) => check(
            true,
            &format!("LLM configured ({} at {})", credentials.model, credentials.base_url),
            "",
        ),
        Err(e) => check(false, "", &e.to_string()),
    };

    let ws = &config.satori.ws_url;
    issues += check(
        ws.starts_with("ws://") || ws.starts_with("wss://"),
        &format!("Satori events at {ws}"),
        &format!("satori.ws_url must be ws:// or wss://, got {ws}"),
    );
    let api = &config.satori.api_url;
    issues += check(
        api.starts_with("http://") || api.starts_with("https://"),
        &format!("Satori API at {api}"),
        &format!("satori.api_url must be http:// or https://, got {api}"),
    );

    if config.store.backend == "memory" {
        issues += check(true, "Store: in-memory", "");
    } else {
        let path = config.store.resolved_path();
        let dir = path.parent().map(PathBuf::from).unwrap_or_default();
        let writable = std::fs::create_dir_all(&dir).is_ok()
            && std::fs::metadata(&dir).is_ok_and(|m| !m.permissions().readonly());
        issues += check(
            writable,
            &format!("Store: {}", path.display()),
            &format!("Store directory {} is not writable", dir.display()),
        );
    }

    summary(issues);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_counts_failures() {
        assert_eq!(check(true, "ok", "bad"), 0);
        assert_eq!(check(false, "ok", "bad"), 1);
    }
}
