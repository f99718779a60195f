//! Server settings taken from `initializationOptions` and the command line.

use std::time::Duration;

use serde::Deserialize;

use vyper_lsp::debounce::DEFAULT_WAIT;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Quiet window in milliseconds before an edited document is rebuilt.
    pub debounce_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_WAIT.as_millis() as u64,
        }
    }
}

impl ServerConfig {
    /// Read the client's options; anything unreadable falls back to defaults.
    pub fn from_initialization_options(options: Option<serde_json::Value>) -> Self {
        let Some(options) = options else {
            return Self::default();
        };
        match serde_json::from_value(options) {
            Ok(config) => config,
            Err(error) => {
                tracing::warn!(%error, "Ignoring malformed initializationOptions");
                Self::default()
            }
        }
    }

    /// Apply command-line overrides.
    pub fn with_debounce_ms(mut self, debounce_ms: Option<u64>) -> Self {
        if let Some(debounce_ms) = debounce_ms {
            self.debounce_ms = debounce_ms;
        }
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
