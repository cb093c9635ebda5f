// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Greenroom coordination layer.
//!
//! Provides TOML configuration parsing with strict validation
//! (`deny_unknown_fields`), XDG file hierarchy lookup, environment variable
//! overrides, and Elm-style diagnostic error rendering with typo suggestions.
//!
//! # Usage
//!
//! ```no_run
//! use greenroom_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("role: {}", config.process.role);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::GreenroomConfig;

/// Load configuration from the XDG hierarchy and validate it.
///
/// This is the high-level entry point that:
/// 1. Loads config from TOML files + env vars via Figment
/// 2. On success: runs post-deserialization validation
/// 3. On Figment error: converts to rich miette diagnostics with typo
///    suggestions
///
/// Returns either a valid `GreenroomConfig` or a list of diagnostic errors.
pub fn load_and_validate() -> Result<GreenroomConfig, Vec<ConfigError>> {
    match loader::load_config() {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            // Read TOML source files for error source span information.
            let toml_sources = collect_toml_sources();
            Err(diagnostic::figment_to_config_errors(err, &toml_sources))
        }
    }
}

/// Load configuration from a specific TOML string and validate it.
///
/// Useful for testing and explicit configuration.
pub fn load_and_validate_str(toml_content: &str) -> Result<GreenroomConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = vec![("<inline>".to_string(), toml_content.to_string())];
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// Collect TOML source file contents for error span resolution.
fn collect_toml_sources() -> Vec<(String, String)> {
    let mut sources = Vec::new();

    // Local config
    if let Ok(content) = std::fs::read_to_string("greenroom.toml") {
        let path = std::env::current_dir()
            .map(|d| d.join("greenroom.toml").display().to_string())
            .unwrap_or_else(|_| "greenroom.toml".to_string());
        sources.push((path, content));
    }

    // XDG user config
    if let Some(config_dir) = dirs::config_dir() {
        let path = config_dir.join("greenroom/greenroom.toml");
        if let Ok(content) = std::fs::read_to_string(&path) {
            sources.push((path.display().to_string(), content));
        }
    }

    // System config
    let system_path = std::path::Path::new("/etc/greenroom/greenroom.toml");
    if let Ok(content) = std::fs::read_to_string(system_path) {
        sources.push((system_path.display().to_string(), content));
    }

    sources
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_and_validate_str_rejects_semantic_errors() {
        let toml = r#"
[preview]
enabled = true
timeout_secs = 2
scan_interval_secs = 30
"#;
        let errors = load_and_validate_str(toml).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ConfigError::Validation { .. })));
    }

    #[test]
    fn load_and_validate_str_accepts_full_config() {
        let toml = r#"
[process]
role = "primary"
instance_id = "worker-a"
log_level = "debug"

[storage]
database_path = "/tmp/gr/greenroom.db"

[coordination]
database_path = "/tmp/gr/coordination.db"
busy_timeout_ms = 2000

[conversation]
ttl_secs = 900
sweep_interval_secs = 30
history_limit = 20

[preview]
enabled = true
timeout_secs = 60
scan_interval_secs = 5
review_base_url = "https://review.example.com/previews"

[dedup]
window_margin_secs = 120
"#;
        let config = load_and_validate_str(toml).expect("should load");
        assert_eq!(config.process.instance_id.as_deref(), Some("worker-a"));
        assert_eq!(config.dedup_window().as_secs(), 180);
        assert_eq!(config.preview_record_ttl().as_secs(), 180);
    }
}
