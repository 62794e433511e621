use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::validation::KeypointCounting;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Index of the webcam to open
    pub camera_index: u32,
    /// How often the validation loop fires (milliseconds)
    pub poll_interval_ms: u64,
    /// Minimum keypoint score to count as detected (0.0-1.0)
    pub min_confidence: f32,
    /// Delay between a successful check and navigation (milliseconds)
    pub redirect_delay_ms: u64,
    /// Where to go once the user is sitting properly
    pub home_destination: String,
    /// Mirror keypoints horizontally when estimating
    pub flip_horizontal: bool,
    /// How repeated keypoint parts are counted: "distinct" or "literal"
    pub keypoint_counting: KeypointCounting,
    /// Schedule navigation at most once per session
    pub navigate_once: bool,
    /// Allow only one estimation call in flight at a time
    pub single_flight: bool,
    /// Show camera/model failures on the status surface
    pub show_failures: bool,
    /// Local ONNX pose model, used in place
    pub model_path: Option<PathBuf>,
    /// Where to download the pose model from when no local file is set
    pub model_url: Option<String>,
    /// Where downloaded models are cached
    pub model_cache_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let mut model_cache_dir = data_root();
        model_cache_dir.push("models");

        Self {
            camera_index: 0,
            poll_interval_ms: 1000, // Validate every second
            min_confidence: 0.5,
            redirect_delay_ms: 2000,
            home_destination: "home.html".to_string(),
            flip_horizontal: false,
            keypoint_counting: KeypointCounting::Distinct,
            navigate_once: true,
            single_flight: true,
            show_failures: false,
            model_path: None,
            model_url: None,
            model_cache_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it with defaults if it doesn't exist
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        Self::load_from(&Self::get_config_path()?)
    }

    /// Load configuration from `path`, creating it with defaults if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.save_to(&Self::get_config_path()?)
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if !(50..=60_000).contains(&self.poll_interval_ms) {
            return Err(format!(
                "Invalid poll interval: {}ms. Must be between 50 and 60000",
                self.poll_interval_ms
            )
            .into());
        }

        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(format!(
                "Invalid minimum confidence: {}. Must be between 0.0 and 1.0",
                self.min_confidence
            )
            .into());
        }

        if self.redirect_delay_ms > 60_000 {
            return Err(format!(
                "Invalid redirect delay: {}ms. Must be at most 60000",
                self.redirect_delay_ms
            )
            .into());
        }

        if self.home_destination.trim().is_empty() {
            return Err("Home destination cannot be empty".into());
        }

        if let Some(url) = &self.model_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!("Invalid model URL: {}. Must be http(s)", url).into());
            }
        }

        Ok(())
    }

    /// Reset the file at `path` to the default configuration
    pub fn reset_at(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let config = Self::default();
        config.save_to(path)?;
        Ok(config)
    }

    /// Get the configuration file path
    pub fn get_config_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| "Could not determine home directory")?;

        let mut path = PathBuf::from(home);
        path.push(".posture_gate");
        path.push("config");
        path.push("settings.json");

        Ok(path)
    }
}

fn data_root() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());

    let mut root = PathBuf::from(home);
    root.push(".posture_gate");
    root
}
