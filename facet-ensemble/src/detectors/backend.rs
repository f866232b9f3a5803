//! Detector backends
//!
//! A backend is the opaque model behind an adapter: given an image it returns
//! raw per-face scores in the model's own vocabulary and scale. Adapters own
//! every normalization step; backends only transport.
//!
//! The shipped backend runs an external command and reads JSON from stdout:
//!
//! ```json
//! {"faces": [{"scores": {"happy": 0.81, "neutral": 0.12}, "box": {"x": 10, "y": 12, "width": 96, "height": 96}}]}
//! ```

use crate::types::{DetectionFailure, FaceBox};
use async_trait::async_trait;
use facet_common::config::DetectorCommandConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::process::{Command, Stdio};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Raw detector output for one image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    /// Detected faces, most prominent first
    #[serde(default)]
    pub faces: Vec<RawFace>,
}

/// Raw scores for one face
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFace {
    /// Label (emotion name or AU column) → raw score
    #[serde(default)]
    pub scores: HashMap<String, f64>,
    #[serde(rename = "box", default)]
    pub face_box: Option<FaceBox>,
}

impl RawDetection {
    /// Single-face detection, mostly useful for tests and mocks
    pub fn single(scores: &[(&str, f64)]) -> Self {
        Self {
            faces: vec![RawFace {
                scores: scores.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
                face_box: None,
            }],
        }
    }

    /// First (most prominent) face, if any
    pub fn primary_face(&self) -> Option<&RawFace> {
        self.faces.first()
    }
}

/// Opaque detector model
#[async_trait]
pub trait DetectorBackend: Send + Sync {
    /// Run the model on `image_path`
    async fn invoke(&self, image_path: &Path) -> Result<RawDetection, DetectionFailure>;

    /// Whether the model can currently be invoked
    async fn is_available(&self) -> bool;
}

// ============================================================================
// Command backend
// ============================================================================

/// Runs an external executable per image
///
/// Invocation: `<command> <args...> <image_path>`; stdout must hold a
/// [`RawDetection`] JSON document.
///
/// Availability is checked once as `<command> <args...> --version` and must
/// exit successfully; the answer is cached for the life of the backend.
pub struct CommandBackend {
    command: String,
    args: Vec<String>,
    available: OnceCell<bool>,
}

impl CommandBackend {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            available: OnceCell::new(),
        }
    }

    pub fn from_config(config: &DetectorCommandConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone())
    }
}

#[async_trait]
impl DetectorBackend for CommandBackend {
    async fn invoke(&self, image_path: &Path) -> Result<RawDetection, DetectionFailure> {
        debug!(
            command = %self.command,
            image = %image_path.display(),
            "Running detector command"
        );

        let output = tokio::task::spawn_blocking({
            let command = self.command.clone();
            let args = self.args.clone();
            let image = image_path.to_path_buf();

            move || Command::new(&command).args(&args).arg(&image).output()
        })
        .await
        .map_err(|e| DetectionFailure::BackendFailed(format!("Task join error: {}", e)))?
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DetectionFailure::DetectorUnavailable(format!("{} not found in PATH", self.command))
            } else {
                DetectionFailure::BackendFailed(e.to_string())
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DetectionFailure::BackendFailed(format!(
                "Exit code: {:?}, stderr: {}",
                output.status.code(),
                stderr.trim()
            )));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            DetectionFailure::BackendFailed(format!("Failed to parse detector output: {}", e))
        })
    }

    async fn is_available(&self) -> bool {
        *self
            .available
            .get_or_init(|| async {
                let command = self.command.clone();
                let args = self.args.clone();

                let status = tokio::task::spawn_blocking(move || {
                    Command::new(&command)
                        .args(&args)
                        .arg("--version")
                        .stdout(Stdio::null())
                        .stderr(Stdio::null())
                        .status()
                })
                .await;

                match status {
                    Ok(Ok(status)) if status.success() => true,
                    Ok(Ok(status)) => {
                        warn!(command = %self.command, code = ?status.code(), "Detector version check failed");
                        false
                    }
                    Ok(Err(e)) => {
                        debug!(command = %self.command, error = %e, "Detector command not runnable");
                        false
                    }
                    Err(e) => {
                        warn!(command = %self.command, error = %e, "Detector version check task failed");
                        false
                    }
                }
            })
            .await
    }
}

/// Placeholder for a detector with no command configured
pub struct UnconfiguredBackend {
    detector: &'static str,
}

impl UnconfiguredBackend {
    pub fn new(detector: &'static str) -> Self {
        Self { detector }
    }
}

#[async_trait]
impl DetectorBackend for UnconfiguredBackend {
    async fn invoke(&self, _image_path: &Path) -> Result<RawDetection, DetectionFailure> {
        Err(DetectionFailure::DetectorUnavailable(format!(
            "no command configured for {}",
            self.detector
        )))
    }

    async fn is_available(&self) -> bool {
        false
    }
}

// ============================================================================
// Mock Backend for Testing
// ============================================================================


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_detection_parsing() {
        let json = r#"{
            "faces": [
                {"scores": {"happy": 0.8, "sad": 0.1}, "box": {"x": 1, "y": 2, "width": 30, "height": 40}},
                {"scores": {"neutral": 0.9}}
            ]
        }"#;

        let detection: RawDetection = serde_json::from_str(json).unwrap();
        assert_eq!(detection.faces.len(), 2);

        let face = detection.primary_face().unwrap();
        assert_eq!(face.scores["happy"], 0.8);
        assert_eq!(
            face.face_box,
            Some(FaceBox { x: 1, y: 2, width: 30, height: 40 })
        );
        assert!(detection.faces[1].face_box.is_none());
    }

    #[test]
    fn test_empty_document_means_no_faces() {
        let detection: RawDetection = serde_json::from_str("{}").unwrap();
        assert!(detection.primary_face().is_none());
    }

    #[tokio::test]
    async fn test_missing_executable_is_unavailable() {
        let backend = CommandBackend::new("facet-detector-that-does-not-exist", vec![]);
        assert!(!backend.is_available().await);

        let err = backend.invoke(Path::new("face.jpg")).await.unwrap_err();
        assert!(matches!(err, DetectionFailure::DetectorUnavailable(_)));
    }

    #[tokio::test]
    async fn test_unconfigured_backend() {
        let backend = UnconfiguredBackend::new("deepface");
        assert!(!backend.is_available().await);

        let err = backend.invoke(Path::new("face.jpg")).await.unwrap_err();
        assert_eq!(
            err,
            DetectionFailure::DetectorUnavailable("no command configured for deepface".into())
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_version_check_is_unavailable() {
        // Starts fine but exits non-zero, like `python3 -m missing_module`
        let backend = CommandBackend::new("false", vec![]);
        assert!(!backend.is_available().await);

        let backend = CommandBackend::new("sh", vec!["-c".into(), "exit 3".into()]);
        assert!(!backend.is_available().await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_version_check_passes_configured_args() {
        // `sh -c 'test "$0" = --version'` succeeds only when --version follows the args
        let backend = CommandBackend::new(
            "sh",
            vec!["-c".into(), r#"test "$0" = --version"#.into()],
        );
        assert!(backend.is_available().await);
        // Cached answer
        assert!(backend.is_available().await);
    }
}
