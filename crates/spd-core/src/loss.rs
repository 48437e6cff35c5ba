//! # Interconnector loss engine
//!
//! The casefile describes each interconnector's marginal loss factor (MLF)
//! curve as an ordered list of `{Limit, Factor}` segments plus a
//! `LossLowerLimit`. Total loss at a given flow is the signed integral of
//! the MLF curve between 0 and the flow:
//!
//! ```text
//!  factor
//!    │            ┌────
//!    │      ┌─────┘
//!    │ ─────┘
//!    └──────┬───────────── flow (MW)
//!   -LossLowerLimit ... Limit₁ ... Limitₙ
//! ```
//!
//! Two consumers:
//!
//! - the *initial loss estimate* (pre-solve demand accounting) integrates
//!   up to the interconnector's initial MW;
//! - the SOS2 loss approximation samples the integral at every segment
//!   boundary, yielding `(x, y)` breakpoints the MILP interpolates between.
//!
//! Loss at zero flow is zero by construction, so breakpoint y-values are
//! exact at the origin.

use crate::case::LossModel;
use crate::error::{SpdError, SpdResult};
use serde::{Deserialize, Serialize};

/// One MLF segment in start-end-factor form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentSpan {
    pub start: f64,
    pub end: f64,
    pub factor: f64,
}

impl LossModel {
    /// Rewrite `{Limit, Factor}` segments into contiguous
    /// start-end-factor spans beginning at `-LossLowerLimit`.
    pub fn standardised_segments(&self) -> Vec<SegmentSpan> {
        let mut spans = Vec::with_capacity(self.segments.len());
        let mut start = -self.loss_lower_limit;
        for segment in &self.segments {
            spans.push(SegmentSpan {
                start,
                end: segment.limit,
                factor: segment.factor,
            });
            start = segment.limit;
        }
        spans
    }

    /// Total loss (MW) at the given flow: signed integral of the MLF curve
    /// from 0 to `flow`.
    pub fn loss_estimate(&self, flow: f64) -> SpdResult<f64> {
        integrate_segments(&self.standardised_segments(), flow)
    }

    /// SOS2 breakpoints `(x, y)`: one per segment boundary with
    /// `-LossLowerLimit` prepended, `y = loss_estimate(x)`.
    /// Length is always `segments.len() + 1`.
    pub fn breakpoints(&self) -> SpdResult<Vec<(f64, f64)>> {
        let spans = self.standardised_segments();
        let mut points = Vec::with_capacity(spans.len() + 1);

        let x0 = -self.loss_lower_limit;
        points.push((x0, integrate_segments(&spans, x0)?));
        for segment in &self.segments {
            points.push((segment.limit, integrate_segments(&spans, segment.limit)?));
        }
        Ok(points)
    }
}

/// Integrate the MLF curve from 0 to `flow` over standardised segments.
///
/// Each segment contributes `(end - start) * factor * proportion`, where
/// the proportion is the share of the segment lying between 0 and the
/// flow. A segment straddling the origin is split. Negative flows
/// integrate leftwards with the sign flipped so losses remain the area
/// under the curve.
pub fn integrate_segments(segments: &[SegmentSpan], flow: f64) -> SpdResult<f64> {
    let mut total_area = 0.0;

    for s in segments {
        let width = s.end - s.start;

        let proportion = if flow > 0.0 {
            if s.end <= 0.0 {
                0.0
            } else if s.start > flow {
                0.0
            } else if s.start < 0.0 && s.end > 0.0 {
                // Positive part of an origin-straddling segment, bounded
                // by how far the flow reaches into it
                let positive_proportion = s.end / width;
                let flow_proportion = flow / width;
                positive_proportion.min(flow_proportion)
            } else if flow >= s.start && flow <= s.end {
                (flow - s.start) / width
            } else if flow > s.end {
                1.0
            } else {
                return Err(SpdError::UnhandledLossSegmentCase(format!(
                    "flow {flow} against segment [{}, {}]",
                    s.start, s.end
                )));
            }
        } else {
            if s.start >= 0.0 {
                0.0
            } else if s.end < flow {
                0.0
            } else if s.start < 0.0 && s.end > 0.0 {
                let negative_proportion = -s.start / width;
                let flow_proportion = -flow / width;
                negative_proportion.min(flow_proportion)
            } else if flow >= s.start && flow <= s.end {
                -(flow - s.end) / width
            } else if flow <= s.start {
                1.0
            } else {
                return Err(SpdError::UnhandledLossSegmentCase(format!(
                    "flow {flow} against segment [{}, {}]",
                    s.start, s.end
                )));
            }
        };

        let area = width * s.factor * proportion;
        // Reverse flow: area accumulates with flipped sign so a negative
        // MLF region still yields the physical loss
        if flow > 0.0 {
            total_area += area;
        } else {
            total_area -= area;
        }
    }

    Ok(total_area)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::LossSegment;

    fn model(loss_lower_limit: f64, segments: &[(f64, f64)]) -> LossModel {
        LossModel {
            loss_lower_limit,
            loss_share: 0.5,
            segments: segments
                .iter()
                .map(|(limit, factor)| LossSegment {
                    limit: *limit,
                    factor: *factor,
                })
                .collect(),
        }
    }

    #[test]
    fn test_standardised_segments_start_at_lower_limit() {
        let m = model(100.0, &[(-50.0, -0.02), (50.0, 0.01), (120.0, 0.04)]);
        let spans = m.standardised_segments();
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[0].start, -100.0);
        assert_eq!(spans[0].end, -50.0);
        assert_eq!(spans[1].start, -50.0);
        assert_eq!(spans[2].end, 120.0);
    }

    #[test]
    fn test_zero_flow_has_zero_loss() {
        let m = model(100.0, &[(-50.0, -0.02), (50.0, 0.01), (120.0, 0.04)]);
        assert_eq!(m.loss_estimate(0.0).unwrap(), 0.0);
    }

    #[test]
    fn test_positive_flow_within_first_positive_segment() {
        // Single segment [-100, 100] with factor 0.03: loss(20) = 20*0.03
        let m = model(100.0, &[(100.0, 0.03)]);
        let loss = m.loss_estimate(20.0).unwrap();
        assert!((loss - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_positive_flow_spanning_segments() {
        // Factors 0.01 on [-100, 50], 0.04 on [50, 120]
        let m = model(100.0, &[(50.0, 0.01), (120.0, 0.04)]);
        let loss = m.loss_estimate(80.0).unwrap();
        // 50*0.01 + 30*0.04 = 0.5 + 1.2
        assert!((loss - 1.7).abs() < 1e-9);
    }

    #[test]
    fn test_negative_flow_integrates_leftward() {
        // Factor -0.02 on [-100, -50], 0.01 on [-50, 100]. At flow -80:
        // segment [-100,-50] covers [-80,-50], proportion 0.6, signed
        // area +0.6; segment [-50,100] covers [-50,0], proportion 1/3,
        // signed area -0.5. Total 0.1
        let m = model(100.0, &[(-50.0, -0.02), (100.0, 0.01)]);
        let loss = m.loss_estimate(-80.0).unwrap();
        assert!((loss - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_breakpoint_count_and_origin() {
        let m = model(100.0, &[(-50.0, -0.02), (50.0, 0.01), (120.0, 0.04)]);
        let points = m.breakpoints().unwrap();
        assert_eq!(points.len(), 4);
        assert_eq!(points[0].0, -100.0);
        assert_eq!(points[3].0, 120.0);

        // y at each x equals the direct integral there
        for (x, y) in &points {
            assert!((y - m.loss_estimate(*x).unwrap()).abs() < 1e-12);
        }
    }

    #[test]
    fn test_flow_beyond_last_segment_uses_full_segments() {
        let m = model(100.0, &[(50.0, 0.01), (120.0, 0.04)]);
        let at_limit = m.loss_estimate(120.0).unwrap();
        let beyond = m.loss_estimate(500.0).unwrap();
        assert!((at_limit - beyond).abs() < 1e-9);
    }
}
