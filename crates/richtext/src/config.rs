//! Editor configuration.
//!
//! Built once per editor instance and handed explicitly to the parts that
//! need it (allow list, link format, reference engine).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::formats::{build_allow_list, AllowList, ToolbarEntry};
use crate::registry::LinkFormat;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid editor config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    /// Toolbar declaration; drives the paste allow list.
    #[serde(default)]
    pub toolbar: Vec<ToolbarEntry>,
    /// Front-end base URL. Links under it open in the same tab.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl EditorConfig {
    pub fn new(toolbar: Vec<ToolbarEntry>) -> Self {
        Self {
            toolbar,
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn allow_list(&self) -> AllowList {
        build_allow_list(&self.toolbar)
    }

    pub fn link_format(&self) -> LinkFormat {
        LinkFormat::new(self.base_url.clone())
    }
}
