// Configuration module for typesmith
// Reads from environment variables with sensible defaults

use std::env;
use std::sync::OnceLock;

use tracing::warn;

use crate::annotate::AnnotateConfig;

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Run-wide limit on annotated functions (MAXFIXES); unbounded when unset
    pub max_edits: Option<usize>,

    /// Write inline annotations instead of type comments (TYPESMITH_INLINE)
    pub inline_style: bool,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default();

        if let Some(val) = lookup("MAXFIXES") {
            let trimmed = val.trim();
            if !trimmed.is_empty() {
                match trimmed.parse() {
                    Ok(parsed) => config.max_edits = Some(parsed),
                    Err(_) => warn!("Invalid MAXFIXES value: {val}, leaving edit budget unbounded"),
                }
            }
        }

        if let Some(val) = lookup("TYPESMITH_INLINE") {
            match val.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => config.inline_style = true,
                "" | "0" | "false" | "no" => config.inline_style = false,
                _ => warn!("Invalid TYPESMITH_INLINE value: {val}, using type comments"),
            }
        }

        config
    }

    /// Get the global configuration instance
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(Config::from_env)
    }

    /// Annotation settings with command-line overrides applied on top.
    pub fn annotate_config(
        &self,
        inline: bool,
        max_edits: Option<usize>,
        annotate_unrecorded: bool,
    ) -> AnnotateConfig {
        AnnotateConfig {
            inline_style: inline || self.inline_style,
            max_edits: max_edits.or(self.max_edits),
            annotate_unrecorded,
        }
    }
}
