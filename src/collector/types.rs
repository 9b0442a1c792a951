//! Boundary types produced by the external landmark and audio models.
//!
//! These are the only shapes the scoring pipeline accepts. Feature bundles
//! are validated here, where external output enters the crate, so that the
//! scoring math never sees a missing or non-numeric field.

use crate::error::AnalysisError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Per-frame face metrics from the landmark model.
///
/// `head_pose` is (pitch, yaw, roll). A detected frame must carry all three
/// metrics; an undetected frame may omit them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFrame")]
pub struct FaceFrameMetrics {
    pub detected: bool,
    pub eye_aspect_ratio: f64,
    pub mouth_aspect_ratio: f64,
    pub head_pose: [f64; 3],
    /// Capture time of the frame, when the producer supplies one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Landmark-model output as written, before the detected-frame check.
#[derive(Deserialize)]
struct RawFrame {
    #[serde(alias = "face_detected")]
    detected: bool,
    #[serde(alias = "ear")]
    eye_aspect_ratio: Option<f64>,
    #[serde(alias = "mar")]
    mouth_aspect_ratio: Option<f64>,
    #[serde(alias = "headPose")]
    head_pose: Option<[f64; 3]>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

impl TryFrom<RawFrame> for FaceFrameMetrics {
    type Error = String;

    fn try_from(raw: RawFrame) -> Result<Self, Self::Error> {
        if !raw.detected {
            return Ok(Self {
                timestamp: raw.timestamp,
                ..Self::missing()
            });
        }

        let (Some(eye), Some(mouth), Some(pose)) =
            (raw.eye_aspect_ratio, raw.mouth_aspect_ratio, raw.head_pose)
        else {
            return Err("detected frame is missing eye_aspect_ratio, \
                        mouth_aspect_ratio or head_pose"
                .to_string());
        };

        Ok(Self {
            timestamp: raw.timestamp,
            ..Self::detected(eye, mouth, pose)
        })
    }
}

impl FaceFrameMetrics {
    /// A frame in which a face was found.
    pub fn detected(eye_aspect_ratio: f64, mouth_aspect_ratio: f64, head_pose: [f64; 3]) -> Self {
        Self {
            detected: true,
            eye_aspect_ratio,
            mouth_aspect_ratio,
            head_pose,
            timestamp: None,
        }
    }

    /// A frame with no face.
    pub fn missing() -> Self {
        Self {
            detected: false,
            eye_aspect_ratio: 0.0,
            mouth_aspect_ratio: 0.0,
            head_pose: [0.0; 3],
            timestamp: None,
        }
    }
}

/// Voice characteristics from the audio feature extractor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceMetrics {
    pub strength: f64,
    pub clarity: f64,
    pub pitch_stability: f64,
}

/// Background noise characteristics from the audio feature extractor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseMetrics {
    pub background_level: f64,
    /// Signal-to-noise ratio in dB
    pub signal_to_noise_ratio: f64,
    pub disturbance_level: f64,
}

/// Complete feature bundle for one audio recording.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceFeatures {
    pub voice_metrics: VoiceMetrics,
    pub noise_metrics: NoiseMetrics,
}

impl VoiceFeatures {
    /// Validate an extractor bundle.
    ///
    /// Accepts the nested `{voice_metrics, noise_metrics}` layout and the
    /// flat `{strength, clarity, pitchStability, backgroundLevel, snr,
    /// disturbanceLevel}` layout. Rejects null, empty, or partially populated
    /// bundles with [`AnalysisError::InvalidFeatures`] naming the offending
    /// field.
    pub fn from_value(value: &Value) -> Result<Self, AnalysisError> {
        let root = value
            .as_object()
            .filter(|o| !o.is_empty())
            .ok_or_else(|| AnalysisError::InvalidFeatures("feature bundle is empty".to_string()))?;

        if !root.contains_key("voice_metrics") && !root.contains_key("noise_metrics") {
            return Self::from_flat(root);
        }

        let voice = section(root, "voice_metrics")?;
        let noise = section(root, "noise_metrics")?;

        Ok(Self {
            voice_metrics: VoiceMetrics {
                strength: number(voice, "voice_metrics", "strength")?,
                clarity: number(voice, "voice_metrics", "clarity")?,
                pitch_stability: number(voice, "voice_metrics", "pitch_stability")?,
            },
            noise_metrics: NoiseMetrics {
                background_level: number(noise, "noise_metrics", "background_level")?,
                signal_to_noise_ratio: number(noise, "noise_metrics", "signal_to_noise_ratio")?,
                disturbance_level: number(noise, "noise_metrics", "disturbance_level")?,
            },
        })
    }

    fn from_flat(root: &Map<String, Value>) -> Result<Self, AnalysisError> {
        Ok(Self {
            voice_metrics: VoiceMetrics {
                strength: number(root, "", "strength")?,
                clarity: number(root, "", "clarity")?,
                pitch_stability: number(root, "", "pitchStability")?,
            },
            noise_metrics: NoiseMetrics {
                background_level: number(root, "", "backgroundLevel")?,
                signal_to_noise_ratio: number(root, "", "snr")?,
                disturbance_level: number(root, "", "disturbanceLevel")?,
            },
        })
    }

    /// Load and validate a bundle from a JSON file.
    pub fn load(path: &Path) -> Result<Self, AnalysisError> {
        if !path.exists() {
            return Err(AnalysisError::MissingInput(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| AnalysisError::InvalidFeatures(format!("{}: {e}", path.display())))?;
        let value: Value = serde_json::from_str(&content).map_err(|e| {
            AnalysisError::InvalidFeatures(format!("{}: {e}", path.display()))
        })?;
        Self::from_value(&value)
    }
}

fn section<'a>(
    root: &'a Map<String, Value>,
    name: &str,
) -> Result<&'a Map<String, Value>, AnalysisError> {
    root.get(name)
        .and_then(Value::as_object)
        .filter(|o| !o.is_empty())
        .ok_or_else(|| AnalysisError::InvalidFeatures(format!("missing section `{name}`")))
}

fn number(obj: &Map<String, Value>, section: &str, key: &str) -> Result<f64, AnalysisError> {
    obj.get(key)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            let field = if section.is_empty() {
                key.to_string()
            } else {
                format!("{section}.{key}")
            };
            AnalysisError::InvalidFeatures(format!("missing or non-numeric `{field}`"))
        })
}
