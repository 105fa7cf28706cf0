//! Attention service configuration

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub inference: InferenceConfig,
    pub models: ModelsConfig,
    pub attention: AttentionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InferenceConfig {
    pub device: String,
    pub model_idle_timeout: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    pub detector: PathBuf,
    pub landmarker: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttentionConfig {
    pub min_detection_confidence: f32,
    pub gaze_sensitivity: f32,
    pub head_sensitivity: f32,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn default_path() -> &'static str {
        "config.toml"
    }

    /// Listen port, with the PORT environment variable taking precedence
    /// over the config file
    pub fn resolve_port(&self) -> u16 {
        std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(self.server.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig { port: 7001 },
            inference: InferenceConfig {
                device: "CPU".to_string(),
                model_idle_timeout: 300,
            },
            models: ModelsConfig {
                detector: PathBuf::from("models/scrfd_500m.onnx"),
                landmarker: PathBuf::from("models/face_mesh.onnx"),
            },
            attention: AttentionConfig {
                min_detection_confidence: 0.5,
                gaze_sensitivity: 2.2,
                head_sensitivity: 4.5,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_full_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[server]
port = 8080

[inference]
device = "GPU"
model_idle_timeout = 60

[models]
detector = "models/det.onnx"
landmarker = "models/mesh.onnx"

[attention]
min_detection_confidence = 0.6
gaze_sensitivity = 2.0
head_sensitivity = 4.0
"#
        )
        .unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.inference.device, "GPU");
        assert_eq!(config.inference.model_idle_timeout, 60);
        assert_eq!(config.models.landmarker, PathBuf::from("models/mesh.onnx"));
        assert!((config.attention.gaze_sensitivity - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(Config::load("definitely/not/here.toml").is_err());
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 7001);
        assert_eq!(config.inference.device, "CPU");
        assert_eq!(config.inference.model_idle_timeout, 300);
        assert!((config.attention.min_detection_confidence - 0.5).abs() < f32::EPSILON);
        assert!((config.attention.gaze_sensitivity - 2.2).abs() < f32::EPSILON);
        assert!((config.attention.head_sensitivity - 4.5).abs() < f32::EPSILON);
    }

    // Set, garble and clear PORT in one test so no parallel test observes
    // a half-done sequence
    #[test]
    fn test_resolve_port_prefers_env() {
        let config = Config::default();

        std::env::set_var("PORT", "9090");
        assert_eq!(config.resolve_port(), 9090);

        std::env::set_var("PORT", "not-a-port");
        assert_eq!(config.resolve_port(), 7001);

        std::env::remove_var("PORT");
        assert_eq!(config.resolve_port(), 7001);
    }
}
