//! Per-layer visibility/opacity preferences.
//!
//! The animator reads these when a layer is added (so a fresh session starts
//! with what the user last chose) and writes them back when the user toggles
//! a layer.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::{debug, error};
use std::path::{Path, PathBuf};

use crate::entities::{LayerPref, PreferenceStore};

/// Non-persistent store
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferenceStore {
    prefs: IndexMap<String, LayerPref>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn layer_pref(&self, layer_id: &str) -> Option<LayerPref> {
        self.prefs.get(layer_id).copied()
    }

    fn set_layer_pref(&mut self, layer_id: &str, pref: LayerPref) {
        self.prefs.insert(layer_id.to_string(), pref);
    }
}

/// JSON file store, rewritten on every change
#[derive(Debug, Clone)]
pub struct JsonPreferenceStore {
    path: PathBuf,
    prefs: IndexMap<String, LayerPref>,
}

impl JsonPreferenceStore {
    /// Open `path`, starting empty if the file does not exist yet
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let prefs = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read preferences: {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse preferences: {}", path.display()))?
        } else {
            IndexMap::new()
        };
        debug!("Preferences loaded from {} ({} layers)", path.display(), prefs.len());
        Ok(Self { path, prefs })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.prefs)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write preferences: {}", self.path.display()))
    }
}

impl PreferenceStore for JsonPreferenceStore {
    fn layer_pref(&self, layer_id: &str) -> Option<LayerPref> {
        self.prefs.get(layer_id).copied()
    }

    fn set_layer_pref(&mut self, layer_id: &str, pref: LayerPref) {
        self.prefs.insert(layer_id.to_string(), pref);
        if let Err(e) = self.save() {
            error!("{:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let mut s = MemoryPreferenceStore::new();
        assert_eq!(s.layer_pref("radar"), None);
        let p = LayerPref { visible: false, opacity: 0.4 };
        s.set_layer_pref("radar", p);
        assert_eq!(s.layer_pref("radar"), Some(p));
    }

    #[test]
    fn test_json_store_roundtrip() {
        let dir = std::env::temp_dir().join(format!("wxloop-prefs-{}", uuid::Uuid::new_v4()));
        let path = dir.join("prefs.json");
        {
            let mut s = JsonPreferenceStore::open(&path).unwrap();
            s.set_layer_pref("sat", LayerPref { visible: true, opacity: 0.7 });
        }
        let s = JsonPreferenceStore::open(&path).unwrap();
        assert_eq!(s.layer_pref("sat"), Some(LayerPref { visible: true, opacity: 0.7 }));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_json_store_bad_file() {
        let dir = std::env::temp_dir().join(format!("wxloop-prefs-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("prefs.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(JsonPreferenceStore::open(&path).is_err());
        let _ = std::fs::remove_dir_all(dir);
    }
}
