//! The stroke timeline: committed strokes plus the single open stroke.
//!
//! The timeline is append-only except for an explicit full clear.
//! Insertion order is paint order, so later strokes are drawn on top.

use serde::{Deserialize, Serialize};

use crate::stroke::{Color, CycleMs, Point, Stroke};

/// Identifies the currently open stroke.
///
/// Handles are never reused, so a handle held past commit or clear is
/// simply stale and every operation on it is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StrokeHandle(u64);

/// Errors produced by timeline mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimelineError {
    #[error("a stroke is already open")]
    StrokeAlreadyOpen,
}

/// Result of closing the open stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The stroke was appended at `index`.
    Committed { index: usize },
    /// The stroke had no points and was dropped.
    Discarded,
    /// The handle did not refer to the open stroke.
    Ignored,
}

#[derive(Debug, Clone)]
struct OpenStroke {
    handle: StrokeHandle,
    stroke: Stroke,
}

/// Owner of the committed stroke sequence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimelineStore {
    strokes: Vec<Stroke>,
    #[serde(skip)]
    open: Option<OpenStroke>,
    #[serde(skip)]
    next_handle: u64,
}

impl TimelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new stroke. At most one stroke may be open at a time.
    pub fn begin_stroke(
        &mut self,
        color: Color,
        is_eraser: bool,
    ) -> Result<StrokeHandle, TimelineError> {
        if self.open.is_some() {
            return Err(TimelineError::StrokeAlreadyOpen);
        }
        let handle = StrokeHandle(self.next_handle);
        self.next_handle += 1;
        self.open = Some(OpenStroke {
            handle,
            stroke: Stroke::new(color, is_eraser),
        });
        Ok(handle)
    }

    /// Append a point to the open stroke.
    ///
    /// A timestamp earlier than the previous point is clamped up to it.
    /// Returns false when `handle` is stale.
    pub fn append_point(&mut self, handle: StrokeHandle, x: f64, y: f64, t: CycleMs) -> bool {
        let Some(open) = self.open.as_mut().filter(|open| open.handle == handle) else {
            tracing::debug!(?handle, "Ignoring point for stale stroke handle");
            return false;
        };
        let t = match open.stroke.last_t() {
            Some(last) if t < last => last,
            _ => t,
        };
        open.stroke.points.push(Point::new(x, y, t));
        true
    }

    /// Close the open stroke, committing it if it has any points.
    pub fn commit_stroke(&mut self, handle: StrokeHandle) -> CommitOutcome {
        match self.open.take() {
            Some(open) if open.handle == handle => {
                if open.stroke.is_empty() {
                    CommitOutcome::Discarded
                } else {
                    self.strokes.push(open.stroke);
                    CommitOutcome::Committed {
                        index: self.strokes.len() - 1,
                    }
                }
            }
            other => {
                self.open = other;
                CommitOutcome::Ignored
            }
        }
    }

    /// Empty the timeline. An open stroke is discarded along with it.
    ///
    /// Returns the number of committed strokes removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.strokes.len();
        self.strokes.clear();
        if self.open.take().is_some() {
            tracing::debug!("Discarded open stroke on clear");
        }
        removed
    }

    /// Committed strokes in paint order.
    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    /// Committed stroke at `index`.
    pub fn stroke(&self, index: usize) -> Option<&Stroke> {
        self.strokes.get(index)
    }

    /// The stroke currently being drawn, if any.
    pub fn open_stroke(&self) -> Option<&Stroke> {
        self.open.as_ref().map(|open| &open.stroke)
    }

    /// Handle of the open stroke, if any.
    pub fn open_handle(&self) -> Option<StrokeHandle> {
        self.open.as_ref().map(|open| open.handle)
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    /// Total number of committed points.
    pub fn point_count(&self) -> usize {
        self.strokes.iter().map(|s| s.points.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BLUE: Color = Color::rgb(0x25, 0x63, 0xeb);

    #[test]
    fn test_only_one_open_stroke() {
        let mut timeline = TimelineStore::new();
        let handle = timeline.begin_stroke(BLUE, false).unwrap();
        assert_eq!(
            timeline.begin_stroke(BLUE, false),
            Err(TimelineError::StrokeAlreadyOpen)
        );
        assert_eq!(timeline.open_handle(), Some(handle));
    }

    #[test]
    fn test_commit_appends_in_order() {
        let mut timeline = TimelineStore::new();

        for i in 0..3 {
            let h = timeline.begin_stroke(BLUE, i == 1).unwrap();
            timeline.append_point(h, i as f64, 0.0, 10);
            assert_eq!(
                timeline.commit_stroke(h),
                CommitOutcome::Committed { index: i }
            );
        }

        assert_eq!(timeline.len(), 3);
        assert!(timeline.strokes()[1].is_eraser);
        assert_eq!(timeline.strokes()[2].points[0].x, 2.0);
        assert!(timeline.open_stroke().is_none());
    }

    #[test]
    fn test_empty_stroke_is_discarded() {
        let mut timeline = TimelineStore::new();
        let h = timeline.begin_stroke(BLUE, false).unwrap();
        assert_eq!(timeline.commit_stroke(h), CommitOutcome::Discarded);
        assert!(timeline.is_empty());
        assert!(timeline.open_stroke().is_none());
    }

    #[test]
    fn test_stale_handle_is_ignored() {
        let mut timeline = TimelineStore::new();
        let old = timeline.begin_stroke(BLUE, false).unwrap();
        timeline.append_point(old, 0.0, 0.0, 0);
        timeline.commit_stroke(old);

        let current = timeline.begin_stroke(BLUE, false).unwrap();
        assert!(!timeline.append_point(old, 1.0, 1.0, 5));
        assert_eq!(timeline.commit_stroke(old), CommitOutcome::Ignored);
        assert_eq!(timeline.open_handle(), Some(current));
        assert!(timeline.open_stroke().unwrap().is_empty());
    }

    #[test]
    fn test_non_monotonic_timestamps_are_clamped() {
        let mut timeline = TimelineStore::new();
        let h = timeline.begin_stroke(BLUE, false).unwrap();
        timeline.append_point(h, 0.0, 0.0, 990);
        timeline.append_point(h, 1.0, 0.0, 12);
        timeline.append_point(h, 2.0, 0.0, 995);
        timeline.commit_stroke(h);

        let ts: Vec<_> = timeline.strokes()[0].points.iter().map(|p| p.t).collect();
        assert_eq!(ts, vec![990, 990, 995]);
    }

    #[test]
    fn test_clear_discards_open_stroke() {
        let mut timeline = TimelineStore::new();
        let done = timeline.begin_stroke(BLUE, false).unwrap();
        timeline.append_point(done, 0.0, 0.0, 0);
        timeline.commit_stroke(done);

        let open = timeline.begin_stroke(BLUE, false).unwrap();
        timeline.append_point(open, 1.0, 1.0, 1);

        assert_eq!(timeline.clear(), 1);
        assert!(timeline.is_empty());
        assert!(timeline.open_stroke().is_none());
        assert!(!timeline.append_point(open, 2.0, 2.0, 2));
        assert_eq!(timeline.commit_stroke(open), CommitOutcome::Ignored);
        assert!(timeline.begin_stroke(BLUE, false).is_ok());
    }

    #[test]
    fn test_serialized_timeline_lists_strokes() {
        let mut timeline = TimelineStore::new();
        let h = timeline.begin_stroke(BLUE, false).unwrap();
        timeline.append_point(h, 3.0, 4.0, 7);
        timeline.commit_stroke(h);

        let json = serde_json::to_value(&timeline).unwrap();
        assert_eq!(json["strokes"][0]["points"][0]["t"], 7);
        assert_eq!(timeline.point_count(), 1);
    }

    proptest! {
        #[test]
        fn prop_committed_strokes_are_nonempty_and_ordered(
            strokes in prop::collection::vec(
                prop::collection::vec((0.0f64..800.0, 0.0f64..600.0, 0u64..5_000), 0..20),
                1..8,
            )
        ) {
            let mut timeline = TimelineStore::new();
            for points in &strokes {
                let h = timeline.begin_stroke(BLUE, false).unwrap();
                for (x, y, t) in points {
                    timeline.append_point(h, *x, *y, *t);
                }
                timeline.commit_stroke(h);
            }

            let expected = strokes.iter().filter(|p| !p.is_empty()).count();
            prop_assert_eq!(timeline.len(), expected);
            for stroke in timeline.strokes() {
                prop_assert!(!stroke.points.is_empty());
                prop_assert!(stroke.points.windows(2).all(|w| w[0].t <= w[1].t));
            }
        }
    }
}
