//! Frame-to-frame movement tracking.
//!
//! The tracker turns consecutive face metrics into per-frame movement
//! signals. It keeps exactly one baseline frame: the last frame in which a
//! face was detected. Frames without a face are gaps, not measurements, so
//! they never replace the baseline.

use crate::collector::types::FaceFrameMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Change in eye aspect ratio counted as eye movement.
pub const DEFAULT_EYE_DELTA: f64 = 0.05;

/// Change in mouth aspect ratio counted as mouth movement.
pub const DEFAULT_MOUTH_DELTA: f64 = 0.10;

/// Movement signals derived for one frame. Every channel lies in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameMovement {
    pub face: f64,
    pub eye: f64,
    pub mouth: f64,
    pub head: f64,
}

/// Thresholds for the binary eye and mouth channels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackerThresholds {
    pub eye_delta: f64,
    pub mouth_delta: f64,
}

impl Default for TrackerThresholds {
    fn default() -> Self {
        Self {
            eye_delta: DEFAULT_EYE_DELTA,
            mouth_delta: DEFAULT_MOUTH_DELTA,
        }
    }
}

/// Stateful movement tracker for a single session.
///
/// Each session owns its own tracker; frames must be observed in arrival
/// order.
#[derive(Debug, Clone, Default)]
pub struct MovementTracker {
    thresholds: TrackerThresholds,
    previous: Option<FaceFrameMetrics>,
}

impl MovementTracker {
    pub fn new(thresholds: TrackerThresholds) -> Self {
        Self {
            thresholds,
            previous: None,
        }
    }

    /// Observe the next frame and return its movement signals.
    pub fn observe(&mut self, current: &FaceFrameMetrics) -> FrameMovement {
        if !current.detected {
            return FrameMovement::default();
        }

        let Some(prev) = self.previous.replace(*current) else {
            // A face with no baseline counts as change on the face channel only.
            return FrameMovement {
                face: 1.0,
                ..FrameMovement::default()
            };
        };

        let eye = binary_change(
            current.eye_aspect_ratio,
            prev.eye_aspect_ratio,
            self.thresholds.eye_delta,
        );
        let mouth = binary_change(
            current.mouth_aspect_ratio,
            prev.mouth_aspect_ratio,
            self.thresholds.mouth_delta,
        );

        let head_delta: f64 = current
            .head_pose
            .iter()
            .zip(prev.head_pose.iter())
            .map(|(c, p)| (c - p).abs())
            .sum::<f64>()
            / 3.0;

        FrameMovement {
            face: 1.0,
            eye,
            mouth,
            head: head_delta.min(1.0),
        }
    }

    /// The stored baseline frame, if any face has been seen yet.
    pub fn baseline(&self) -> Option<&FaceFrameMetrics> {
        self.previous.as_ref()
    }
}

fn binary_change(current: f64, previous: f64, threshold: f64) -> f64 {
    if (current - previous).abs() > threshold {
        1.0
    } else {
        0.0
    }
}

/// Ordered, append-only movement history owned by one session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionHistory {
    movements: Vec<FrameMovement>,
    timestamps: Vec<DateTime<Utc>>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the movement for the next frame.
    pub fn push(&mut self, movement: FrameMovement, observed_at: DateTime<Utc>) {
        self.movements.push(movement);
        self.timestamps.push(observed_at);
    }

    /// Run a frame through the tracker and append the result.
    ///
    /// The frame's own timestamp is recorded when present, otherwise the
    /// time of observation.
    pub fn record(
        &mut self,
        tracker: &mut MovementTracker,
        frame: &FaceFrameMetrics,
    ) -> FrameMovement {
        let movement = tracker.observe(frame);
        self.push(movement, frame.timestamp.unwrap_or_else(Utc::now));
        movement
    }

    pub fn movements(&self) -> &[FrameMovement] {
        &self.movements
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.movements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movements.is_empty()
    }
}

impl FromIterator<FrameMovement> for SessionHistory {
    fn from_iter<I: IntoIterator<Item = FrameMovement>>(iter: I) -> Self {
        let mut history = SessionHistory::new();
        for movement in iter {
            history.push(movement, Utc::now());
        }
        history
    }
}
