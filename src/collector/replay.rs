//! Replay of precomputed landmark-model output.
//!
//! The landmark model runs outside this crate and writes one
//! [`FaceFrameMetrics`] JSON object per line. `FrameReplay` streams that file
//! through a bounded channel from a single reader thread, so frames arrive in
//! file order.

use crate::collector::types::FaceFrameMetrics;
use crate::collector::{AnomalyFeatures, AnomalyScorer, FrameSource};
use crate::error::AnalysisError;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::thread;

/// Frames buffered ahead of the tracker.
const FRAME_CHANNEL_CAPACITY: usize = 1_024;

type FrameResult = Result<FaceFrameMetrics, AnalysisError>;

/// Streams frames from an NDJSON file of landmark output.
pub struct FrameReplay {
    receiver: Receiver<FrameResult>,
}

impl FrameReplay {
    /// Open a frame file and start the reader thread.
    ///
    /// The reader thread exits on end of file, on the first malformed line,
    /// or once the replay is dropped.
    pub fn open(path: &Path) -> Result<Self, AnalysisError> {
        if !path.exists() {
            return Err(AnalysisError::MissingInput(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let (sender, receiver) = bounded(FRAME_CHANNEL_CAPACITY);

        thread::spawn(move || read_frames(BufReader::new(file), sender));

        Ok(Self { receiver })
    }

}

impl FrameSource for FrameReplay {
    fn next_frame(&mut self) -> Option<FrameResult> {
        self.receiver.recv().ok()
    }
}

fn read_frames<R: BufRead>(reader: R, sender: Sender<FrameResult>) {
    for (index, line) in reader.lines().enumerate() {
        let item = match line {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => serde_json::from_str::<FaceFrameMetrics>(&line).map_err(|e| {
                AnalysisError::ExternalModelFailure(format!("frame line {}: {e}", index + 1))
            }),
            Err(e) => Err(AnalysisError::Io(e)),
        };

        let failed = item.is_err();
        if sender.send(item).is_err() || failed {
            return;
        }
    }
}

/// Anomaly scorer that passes through a score computed by the external model.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnomalyScorer {
    score: f64,
}

impl FixedAnomalyScorer {
    pub fn new(score: f64) -> Self {
        Self { score }
    }
}

impl AnomalyScorer for FixedAnomalyScorer {
    fn score(&self, _features: &AnomalyFeatures) -> Result<f64, AnalysisError> {
        if self.score.is_finite() {
            Ok(self.score)
        } else {
            Err(AnalysisError::ExternalModelFailure(format!(
                "anomaly score is not finite: {}",
                self.score
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn drain(receiver: Receiver<FrameResult>) -> Vec<FrameResult> {
        receiver.iter().collect()
    }

    #[test]
    fn test_reads_frames_in_order() {
        let input = concat!(
            r#"{"detected": true, "ear": 0.30, "mar": 0.2, "headPose": [0.0, 0.0, 0.0]}"#,
            "\n\n",
            r#"{"detected": false}"#,
            "\n",
            r#"{"detected": true, "ear": 0.20, "mar": 0.2, "headPose": [0.3, 0.3, 0.3]}"#,
            "\n",
        );
        let (sender, receiver) = bounded(16);
        read_frames(Cursor::new(input), sender);

        let frames: Vec<FaceFrameMetrics> =
            drain(receiver).into_iter().map(|f| f.unwrap()).collect();
        assert_eq!(frames.len(), 3);
        assert!(frames[0].detected);
        assert!(!frames[1].detected);
        assert_eq!(frames[2].eye_aspect_ratio, 0.20);
    }

    #[test]
    fn test_stops_at_malformed_line() {
        let input = "{\"detected\": false}\nnot json\n{\"detected\": false}\n";
        let (sender, receiver) = bounded(16);
        read_frames(Cursor::new(input), sender);

        let items = drain(receiver);
        assert_eq!(items.len(), 2);
        match &items[1] {
            Err(AnalysisError::ExternalModelFailure(msg)) => assert!(msg.contains("line 2")),
            other => panic!("expected ExternalModelFailure, got {other:?}"),
        }
    }

    #[test]
    fn test_detected_frame_without_metrics_rejected() {
        let input = concat!(
            r#"{"detected": true, "ear": 0.3, "mar": 0.4, "headPose": [10.0, 10.0, 10.0]}"#,
            "\n",
            r#"{"detected": true}"#,
            "\n",
        );
        let (sender, receiver) = bounded(16);
        read_frames(Cursor::new(input), sender);

        let items = drain(receiver);
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        match &items[1] {
            Err(AnalysisError::ExternalModelFailure(msg)) => {
                assert!(msg.contains("line 2"));
                assert!(msg.contains("missing"));
            }
            other => panic!("expected ExternalModelFailure, got {other:?}"),
        }
    }

    #[test]
    fn test_open_missing_file() {
        let path = std::env::temp_dir().join("examguard-replay-test-missing.ndjson");
        assert!(matches!(
            FrameReplay::open(&path),
            Err(AnalysisError::MissingInput(_))
        ));
    }

    #[test]
    fn test_fixed_scorer_rejects_nan() {
        let features = AnomalyFeatures::default();
        assert_eq!(FixedAnomalyScorer::new(-0.42).score(&features).unwrap(), -0.42);
        assert!(FixedAnomalyScorer::new(f64::NAN).score(&features).is_err());
    }
}
