use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::api::types::{GraphQuery, GraphScope, WorkspaceId};
use crate::view::boundary::RenderMode;
use crate::view::lod::LodConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerSettings {
    // Catalogue backend (REST)
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub workspace_id: WorkspaceId,
    // Graph fetch scope
    pub graph_scope: GraphScope,
    pub graph_limit: u32,
    pub include_format_nodes: bool,
    // Classification / bootstrap context
    pub stage: String,
    pub subject: String,
    pub search_top_k: u32,
    // Background job polling
    pub poll_interval_ms: u64,
    pub notify_on_job_completion: bool,
    // Persist UI/LOD settings between runs
    pub render_mode: RenderMode,
    pub size_scale: f32,
    pub lod: LodConfig,
}

impl Default for ExplorerSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000/".to_string(),
            api_token: None,
            workspace_id: 1,
            graph_scope: GraphScope::Public,
            graph_limit: 200,
            include_format_nodes: true,
            stage: "senior".to_string(),
            subject: "物理".to_string(),
            search_top_k: 10,
            poll_interval_ms: 2000,
            notify_on_job_completion: true,
            render_mode: RenderMode::Scene3d,
            size_scale: 1.0,
            lod: LodConfig::default(),
        }
    }
}

impl ExplorerSettings {
    const MIN_POLL_INTERVAL_MS: u64 = 200;

    fn config_dir() -> PathBuf {
        // Cross-platform user config dir
        #[cfg(target_os = "macos")]
        {
            // ~/Library/Application Support/kg-explorer
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"));
            return home.join("Library").join("Application Support").join("kg-explorer");
        }
        #[cfg(target_os = "windows")]
        {
            // %APPDATA%\kg-explorer
            if let Ok(appdata) = std::env::var("APPDATA") {
                return PathBuf::from(appdata).join("kg-explorer");
            }
            return PathBuf::from("kg-explorer");
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            // $XDG_CONFIG_HOME/kg-explorer or ~/.config/kg-explorer
            if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
                return PathBuf::from(xdg).join("kg-explorer");
            }
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"));
            return home.join(".config").join("kg-explorer");
        }
    }

    /// Return the directory where the settings file (settings.json) is stored.
    pub fn settings_dir() -> PathBuf {
        Self::config_dir()
    }

    pub fn settings_path() -> PathBuf {
        Self::config_dir().join("settings.json")
    }

    pub fn load() -> anyhow::Result<Self> {
        let path = Self::settings_path();
        if path.exists() {
            return Self::load_from(&path);
        }
        Ok(Self::default())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let mut f = fs::File::open(path).with_context(|| format!("open settings {}", path.display()))?;
        let mut s = String::new();
        f.read_to_string(&mut s)?;
        let v: Self = serde_json::from_str(&s).with_context(|| format!("parse settings {}", path.display()))?;
        Ok(v)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::settings_path())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let s = serde_json::to_string_pretty(self)?;
        let mut f = fs::File::create(path).with_context(|| format!("create settings {}", path.display()))?;
        f.write_all(s.as_bytes())?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(Self::MIN_POLL_INTERVAL_MS))
    }

    pub fn graph_query(&self) -> GraphQuery {
        GraphQuery {
            workspace_id: self.workspace_id,
            scope: self.graph_scope,
            limit: self.graph_limit,
            include_format_nodes: self.include_format_nodes,
            q: None,
        }
    }
}
