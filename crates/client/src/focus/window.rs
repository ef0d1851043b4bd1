// Replay - time-travel debugging session client
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! The active focus window.

use replay_common::{ExecutionPoint, TimeStampedPointRange};
use tokio::sync::watch;
use tracing::debug;

/// Holds the focus window and notifies watchers when it changes.
///
/// `None` means the whole recording is in focus.
#[derive(Debug)]
pub struct FocusWindowTracker {
    window: watch::Sender<Option<TimeStampedPointRange>>,
}

impl Default for FocusWindowTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl FocusWindowTracker {
    /// Create a tracker with no window set.
    pub fn new() -> Self {
        let (window, _) = watch::channel(None);
        Self { window }
    }

    /// The active window, `None` for the whole recording.
    pub fn current(&self) -> Option<TimeStampedPointRange> {
        self.window.borrow().clone()
    }

    /// Replace the window. Returns `true` if it actually changed.
    pub fn set(&self, window: Option<TimeStampedPointRange>) -> bool {
        self.window.send_if_modified(|current| {
            if *current == window {
                return false;
            }
            debug!("Focus window changed to {:?}", window);
            *current = window;
            true
        })
    }

    /// Returns `true` if `point` is inside the window, or no window is set.
    pub fn contains(&self, point: &ExecutionPoint) -> bool {
        self.window.borrow().as_ref().map_or(true, |window| window.contains_point(point))
    }

    /// Watch for window changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<TimeStampedPointRange>> {
        self.window.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replay_common::TimeStampedPoint;

    fn window(begin: u64, end: u64) -> TimeStampedPointRange {
        TimeStampedPointRange::new(
            TimeStampedPoint::new(begin.into(), begin as f64),
            TimeStampedPoint::new(end.into(), end as f64),
        )
    }

    #[test]
    fn test_default_is_whole_recording() {
        let tracker = FocusWindowTracker::new();
        assert_eq!(tracker.current(), None);
        assert!(tracker.contains(&ExecutionPoint::from(12345)));
    }

    #[tokio::test]
    async fn test_change_detection() {
        let tracker = FocusWindowTracker::new();
        let mut watcher = tracker.subscribe();

        assert!(tracker.set(Some(window(10, 20))));
        assert!(watcher.has_changed().unwrap());
        watcher.borrow_and_update();

        assert!(!tracker.set(Some(window(10, 20))));
        assert!(!watcher.has_changed().unwrap());

        assert!(tracker.contains(&ExecutionPoint::from(15)));
        assert!(!tracker.contains(&ExecutionPoint::from(21)));

        assert!(tracker.set(None));
        assert_eq!(tracker.current(), None);
    }
}
