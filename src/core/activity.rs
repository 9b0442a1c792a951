//! Session-level activity aggregation.
//!
//! Folds a complete [`SessionHistory`] into percentages and a weighted
//! overall activity score.

use crate::core::round2;
use crate::core::tracker::{FrameMovement, SessionHistory};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Eye-channel value above which a frame counts toward the blink rate.
const BLINK_THRESHOLD: f64 = 0.8;

const FACE_WEIGHT: f64 = 0.2;
const EYE_WEIGHT: f64 = 0.3;
const MOUTH_WEIGHT: f64 = 0.2;
const BODY_WEIGHT: f64 = 0.3;

/// Aggregated activity for one session. All fields lie in [0, 100].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityMetrics {
    pub face_activity_percentage: f64,
    /// Derived from head-pose movement. There is no separate body or
    /// posture signal; the name is kept for report compatibility.
    pub body_activity_percentage: f64,
    pub eye_activity_percentage: f64,
    pub blink_rate: f64,
    pub overall_activity_score: f64,
}

/// Aggregator for session movement histories.
pub struct SessionActivityAggregator;

impl SessionActivityAggregator {
    /// Summarize a complete session history.
    ///
    /// An empty history yields all-zero metrics.
    pub fn summarize(history: &SessionHistory) -> ActivityMetrics {
        let movements = history.movements();
        if movements.is_empty() {
            return ActivityMetrics::default();
        }

        let face = channel_pct(movements, |m| m.face);
        let eye = channel_pct(movements, |m| m.eye);
        let mouth = channel_pct(movements, |m| m.mouth);
        let body = channel_pct(movements, |m| m.head);

        // The eye channel is binary, so this counts frames flagged as a
        // rapid eye-state change.
        let blinks = movements.iter().filter(|m| m.eye > BLINK_THRESHOLD).count();
        let blink_rate = pct(blinks as f64 / movements.len() as f64 * 100.0);

        let overall =
            face * FACE_WEIGHT + eye * EYE_WEIGHT + mouth * MOUTH_WEIGHT + body * BODY_WEIGHT;

        ActivityMetrics {
            face_activity_percentage: round2(face),
            body_activity_percentage: round2(body),
            eye_activity_percentage: round2(eye),
            blink_rate: round2(blink_rate),
            overall_activity_score: round2(pct(overall)),
        }
    }
}

/// Mean of one channel, as a percentage.
fn channel_pct(movements: &[FrameMovement], channel: impl Fn(&FrameMovement) -> f64) -> f64 {
    pct(movements.iter().map(channel).mean() * 100.0)
}

fn pct(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::FaceFrameMetrics;
    use crate::core::tracker::MovementTracker;

    fn movement(face: f64, eye: f64, mouth: f64, head: f64) -> FrameMovement {
        FrameMovement {
            face,
            eye,
            mouth,
            head,
        }
    }

    fn assert_in_range(metrics: &ActivityMetrics) {
        for value in [
            metrics.face_activity_percentage,
            metrics.body_activity_percentage,
            metrics.eye_activity_percentage,
            metrics.blink_rate,
            metrics.overall_activity_score,
        ] {
            assert!((0.0..=100.0).contains(&value), "out of range: {value}");
        }
    }

    #[test]
    fn test_empty_history_is_all_zero() {
        let metrics = SessionActivityAggregator::summarize(&SessionHistory::new());
        assert_eq!(metrics, ActivityMetrics::default());
        assert_eq!(metrics.overall_activity_score, 0.0);
    }

    #[test]
    fn test_percentages_and_weights() {
        let history: SessionHistory = vec![
            movement(1.0, 0.0, 0.0, 0.0),
            movement(1.0, 1.0, 1.0, 0.5),
            movement(1.0, 0.0, 0.0, 0.1),
            movement(0.0, 0.0, 0.0, 0.0),
        ]
        .into_iter()
        .collect();

        let metrics = SessionActivityAggregator::summarize(&history);
        assert_eq!(metrics.face_activity_percentage, 75.0);
        assert_eq!(metrics.eye_activity_percentage, 25.0);
        assert_eq!(metrics.body_activity_percentage, 15.0);
        assert_eq!(metrics.blink_rate, 25.0);
        // 75*0.2 + 25*0.3 + 25*0.2 + 15*0.3
        assert_eq!(metrics.overall_activity_score, 32.0);
    }

    #[test]
    fn test_rounding_to_two_decimals() {
        let history: SessionHistory = vec![
            movement(1.0, 1.0, 0.0, 0.0),
            movement(1.0, 0.0, 0.0, 0.0),
            movement(0.0, 0.0, 0.0, 0.0),
        ]
        .into_iter()
        .collect();

        let metrics = SessionActivityAggregator::summarize(&history);
        assert_eq!(metrics.face_activity_percentage, 66.67);
        assert_eq!(metrics.eye_activity_percentage, 33.33);
        assert_eq!(metrics.blink_rate, 33.33);
    }

    #[test]
    fn test_tracked_sequences_stay_in_range() {
        let sequences: Vec<Vec<FaceFrameMetrics>> = vec![
            vec![],
            vec![FaceFrameMetrics::missing(); 10],
            (0..50)
                .map(|i| {
                    let x = i as f64;
                    FaceFrameMetrics::detected(
                        (x * 0.37).sin(),
                        (x * 0.11).cos(),
                        [x, -x * 2.0, x * 0.5],
                    )
                })
                .collect(),
            (0..30)
                .map(|i| {
                    if i % 3 == 0 {
                        FaceFrameMetrics::missing()
                    } else {
                        let ear = 0.3 + (i % 2) as f64 * 0.1;
                        FaceFrameMetrics::detected(ear, 0.2, [0.01 * i as f64; 3])
                    }
                })
                .collect(),
        ];

        for frames in sequences {
            let mut tracker = MovementTracker::default();
            let mut history = SessionHistory::new();
            for frame in &frames {
                history.record(&mut tracker, frame);
            }
            assert_in_range(&SessionActivityAggregator::summarize(&history));
        }
    }
}
