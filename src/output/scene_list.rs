//! Scene list files written by `detect --save` and read by `export --scenes`

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::model::*;
use crate::error::{AuraError, AuraResult};

/// A detection result detached from the session that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneList {
    pub source: PathBuf,
    pub threshold: f64,
    pub scenes: Vec<Scene>,
}

impl SceneList {
    pub fn save(&self, path: &Path) -> AuraResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| AuraError::SceneListError {
            message: format!("Failed to write {}: {}", path.display(), e),
        })
    }

    /// Load and validate; every scene goes back through `Scene::new`
    pub fn load(path: &Path) -> AuraResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| AuraError::SceneListError {
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;
        serde_json::from_str(&content).map_err(|e| AuraError::SceneListError {
            message: format!("Invalid scene list {}: {}", path.display(), e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("scenes.json");
        let list = SceneList {
            source: PathBuf::from("/videos/talk.mp4"),
            threshold: 27.0,
            scenes: vec![Scene::new(0.0, 5.0).unwrap(), Scene::new(5.0, 9.0).unwrap()],
        };

        list.save(&path).unwrap();
        assert_eq!(SceneList::load(&path).unwrap(), list);
    }

    #[test]
    fn test_load_rejects_inverted_scene() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenes.json");
        fs::write(
            &path,
            r#"{"source": "a.mp4", "threshold": 27.0, "scenes": [{"start": 4.0, "end": 1.0}]}"#,
        )
        .unwrap();

        assert!(matches!(
            SceneList::load(&path),
            Err(AuraError::SceneListError { .. })
        ));
    }
}
