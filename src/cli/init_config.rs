use super::config::{default_config_path, default_state_path, GhostwireConfig};
use std::path::PathBuf;

/// Write a default configuration file
///
/// Refuses to overwrite an existing file unless `force` is set.
pub fn execute(
    config_path: Option<String>,
    homeserver_domain: String,
    force: bool,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let config_path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);

    if config_path.exists() && !force {
        return Err(format!(
            "Config file '{}' already exists (use --force to overwrite)",
            config_path.display()
        )
        .into());
    }

    // Keep the state file next to a custom config
    let state_path = config_path
        .parent()
        .map(|dir| dir.join("state.json"))
        .unwrap_or_else(default_state_path);

    GhostwireConfig::create_default(&config_path, &homeserver_domain, &state_path)?;

    println!("📝 Created: {}", config_path.display());
    println!("   Domain: {}", homeserver_domain);
    println!("   State: {}", state_path.display());

    Ok(config_path)
}
