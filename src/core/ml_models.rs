// ML model cache and resolution
// Resolves a model description to a file on disk, downloading into the cache when needed

use std::fs;
use std::path::{Path, PathBuf};

/// Model source configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSource {
    /// Local file path, used in place
    LocalFile(PathBuf),
    /// Direct URL, downloaded into the cache
    Url(String),
}

/// ML model metadata
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub version: String,
    pub source: ModelSource,
    pub size_bytes: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model file not found: {0}")]
    NotFound(PathBuf),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Cache error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ModelResult<T> = Result<T, ModelError>;

/// Model manager for caching and locating ML models
#[derive(Debug, Clone)]
pub struct ModelManager {
    cache_dir: PathBuf,
}

impl ModelManager {
    /// Create a new model manager with cache directory
    pub fn new(cache_dir: PathBuf) -> ModelResult<Self> {
        fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Check if a downloaded model is cached
    pub fn is_cached(&self, model: &ModelInfo) -> bool {
        self.get_model_path(&model.name).exists()
    }

    /// Get the cache path for a model
    pub fn get_model_path(&self, model_name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.onnx", model_name))
    }

    /// Where the model file is or will be, without touching the disk
    pub fn resolve_path(&self, model: &ModelInfo) -> PathBuf {
        match &model.source {
            ModelSource::LocalFile(path) => path.clone(),
            ModelSource::Url(_) => self.get_model_path(&model.name),
        }
    }

    /// Resolve a model to a readable file, downloading it if not cached
    pub async fn ensure_model(&self, model: &ModelInfo) -> ModelResult<PathBuf> {
        match &model.source {
            ModelSource::LocalFile(path) => {
                if path.exists() {
                    Ok(path.clone())
                } else {
                    Err(ModelError::NotFound(path.clone()))
                }
            }
            ModelSource::Url(url) => {
                let model_path = self.get_model_path(&model.name);
                if self.is_cached(model) {
                    tracing::debug!(model = %model.name, path = %model_path.display(), "model already cached");
                    return Ok(model_path);
                }

                tracing::info!(model = %model.name, %url, "downloading model");
                self.download(url, &model_path).await?;
                Ok(model_path)
            }
        }
    }

    async fn download(&self, url: &str, model_path: &Path) -> ModelResult<()> {
        let response = reqwest::get(url)
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ModelError::DownloadFailed(e.to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ModelError::DownloadFailed(e.to_string()))?;

        if bytes.is_empty() {
            return Err(ModelError::DownloadFailed(format!("{} returned no data", url)));
        }

        // Write beside the target first so a partial download never looks cached
        let partial = model_path.with_extension("part");
        tokio::fs::write(&partial, &bytes).await?;
        tokio::fs::rename(&partial, model_path).await?;

        tracing::info!(path = %model_path.display(), bytes = bytes.len(), "model downloaded");
        Ok(())
    }

    /// Clear the model cache
    pub fn clear_cache(&self) -> ModelResult<()> {
        if self.cache_dir.exists() {
            fs::remove_dir_all(&self.cache_dir)?;
            fs::create_dir_all(&self.cache_dir)?;
        }
        Ok(())
    }

    /// Get cache size in bytes
    pub fn get_cache_size(&self) -> ModelResult<u64> {
        let mut total_size = 0u64;

        if self.cache_dir.exists() {
            for entry in fs::read_dir(&self.cache_dir)? {
                let metadata = entry?.metadata()?;
                if metadata.is_file() {
                    total_size += metadata.len();
                }
            }
        }

        Ok(total_size)
    }
}

// ==============================================================================
// Predefined Model Configurations
// ==============================================================================

/// MoveNet single-person pose models (ONNX export)
pub mod movenet {
    use super::*;

    pub const DEFAULT_FILE: &str = "models/movenet-singlepose-lightning.onnx";

    pub fn singlepose_lightning() -> ModelInfo {
        ModelInfo {
            name: "movenet-singlepose-lightning".to_string(),
            version: "v4".to_string(),
            source: ModelSource::LocalFile(PathBuf::from(DEFAULT_FILE)),
            size_bytes: Some(9_000_000), // ~9 MB
        }
    }

    /// Pick the model the configuration points at: an explicit file wins over a URL
    pub fn from_settings(model_path: Option<&Path>, model_url: Option<&str>) -> ModelInfo {
        let mut info = singlepose_lightning();
        if let Some(path) = model_path {
            info.source = ModelSource::LocalFile(path.to_path_buf());
        } else if let Some(url) = model_url {
            info.source = ModelSource::Url(url.to_string());
        }
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_cache(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("posture_gate_models_{}", name));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_model_manager_creation() {
        let temp_dir = temp_cache("create");
        let manager = ModelManager::new(temp_dir.clone()).unwrap();
        assert_eq!(manager.cache_dir(), temp_dir.as_path());
        assert!(temp_dir.exists());
        let _ = fs::remove_dir_all(&temp_dir);
    }

    #[tokio::test]
    async fn test_local_model_used_in_place() {
        let temp_dir = temp_cache("local");
        let manager = ModelManager::new(temp_dir.clone()).unwrap();
        let file = temp_dir.join("pose.onnx");
        fs::write(&file, b"onnx").unwrap();

        let info = movenet::from_settings(Some(&file), None);
        assert_eq!(manager.ensure_model(&info).await.unwrap(), file);

        let _ = fs::remove_dir_all(&temp_dir);
    }

    #[tokio::test]
    async fn test_missing_local_model() {
        let temp_dir = temp_cache("missing");
        let manager = ModelManager::new(temp_dir.clone()).unwrap();
        let info = movenet::from_settings(Some(&temp_dir.join("nope.onnx")), None);

        assert!(matches!(
            manager.ensure_model(&info).await,
            Err(ModelError::NotFound(_))
        ));

        let _ = fs::remove_dir_all(&temp_dir);
    }

    #[tokio::test]
    async fn test_cached_url_model_skips_download() {
        let temp_dir = temp_cache("cached");
        let manager = ModelManager::new(temp_dir.clone()).unwrap();
        let info = movenet::from_settings(None, Some("http://127.0.0.1:9/never-fetched.onnx"));
        fs::write(manager.get_model_path(&info.name), b"cached").unwrap();

        assert!(manager.is_cached(&info));
        let path = manager.ensure_model(&info).await.unwrap();
        assert_eq!(path, manager.get_model_path(&info.name));

        let _ = fs::remove_dir_all(&temp_dir);
    }

    #[test]
    fn test_resolve_path_does_not_fetch() {
        let temp_dir = temp_cache("resolve");
        let manager = ModelManager::new(temp_dir.clone()).unwrap();

        let local = movenet::from_settings(None, None);
        assert_eq!(manager.resolve_path(&local), PathBuf::from(movenet::DEFAULT_FILE));

        let remote = movenet::from_settings(None, Some("http://127.0.0.1:9/pose.onnx"));
        assert_eq!(manager.resolve_path(&remote), manager.get_model_path(&remote.name));
        assert!(!manager.is_cached(&remote));

        let _ = fs::remove_dir_all(&temp_dir);
    }

    #[test]
    fn test_cache_size_and_clear() {
        let temp_dir = temp_cache("size");
        let manager = ModelManager::new(temp_dir.clone()).unwrap();
        fs::write(temp_dir.join("a.onnx"), [0u8; 10]).unwrap();
        fs::write(temp_dir.join("b.onnx"), [0u8; 5]).unwrap();

        assert_eq!(manager.get_cache_size().unwrap(), 15);
        manager.clear_cache().unwrap();
        assert_eq!(manager.get_cache_size().unwrap(), 0);
        assert!(temp_dir.exists());

        let _ = fs::remove_dir_all(&temp_dir);
    }

    #[test]
    fn test_settings_precedence() {
        let default = movenet::from_settings(None, None);
        assert_eq!(
            default.source,
            ModelSource::LocalFile(PathBuf::from(movenet::DEFAULT_FILE))
        );

        let url = movenet::from_settings(None, Some("https://example.com/m.onnx"));
        assert!(matches!(url.source, ModelSource::Url(_)));

        let both = movenet::from_settings(Some(Path::new("/tmp/m.onnx")), Some("https://example.com/m.onnx"));
        assert!(matches!(both.source, ModelSource::LocalFile(_)));
    }
}
