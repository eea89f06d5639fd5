use std::path::PathBuf;

use serde::Deserialize;

use crate::config::{CalcConfig, CalcConfigPatch};
use crate::model::Gradebook;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub gradebook: Option<Gradebook>,
    pub gradebook_path: Option<PathBuf>,
    /// Defaults plus the startup config file.
    pub base_config: CalcConfig,
    pub config_override: Option<CalcConfigPatch>,
}

impl AppState {
    pub fn new(base_config: CalcConfig) -> Self {
        Self {
            gradebook: None,
            gradebook_path: None,
            base_config,
            config_override: None,
        }
    }

    pub fn session_config(&self) -> CalcConfig {
        match &self.config_override {
            Some(patch) => self.base_config.apply(patch),
            None => self.base_config.clone(),
        }
    }
}
