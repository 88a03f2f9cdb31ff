use std::path::Path;

use {
    anyhow::{Context, Result},
    secrecy::ExposeSecret,
    therra_config::TherraConfig,
    therra_vault::Vault,
};

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Load the config the gateway would start with and check it.
pub fn check_config(explicit: Option<&Path>) -> Result<()> {
    let config = therra_config::discover_and_load(explicit).context("loading config")?;
    let warnings = check(&config)?;

    for warning in &warnings {
        eprintln!("  {BOLD}{YELLOW}warning{RESET} {warning}");
    }
    eprintln!(
        "Config OK: listening on {}:{}, public url {}, {} warning(s)",
        config.server.bind,
        config.server.port,
        config.public_base_url(),
        warnings.len()
    );
    Ok(())
}

/// Hard failures are errors; degraded-but-startable settings come back as warnings.
fn check(config: &TherraConfig) -> Result<Vec<String>> {
    if let Err(e) = config.validate() {
        eprintln!("  {BOLD}{RED}error{RESET} {e}");
        return Err(e.into());
    }

    let root_key = config
        .vault
        .root_key
        .as_ref()
        .map(|k| k.expose_secret().as_str())
        .unwrap_or_default();
    if let Err(e) = Vault::from_root_key(root_key) {
        eprintln!("  {BOLD}{RED}error{RESET} vault.root_key: {e}");
        return Err(e.into());
    }

    let mut warnings: Vec<String> = Vec::new();
    if config.provider.api_key.is_none() {
        warnings.push("provider.api_key is not set; every reply will be the fallback message".into());
    }
    if config.auth.admin_token.is_none() {
        warnings.push("auth.admin_token is not set; the provisioning API rejects all requests".into());
    }
    if config.server.public_url.is_none() {
        warnings.push(format!(
            "server.public_url is not set; Telegram webhooks would point at {}",
            config.public_base_url()
        ));
    }
    Ok(warnings)
}
