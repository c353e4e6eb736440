use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Kind of raw filesystem event observed for a path (spec §4.10 "watch
/// mode").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

#[derive(Debug, Clone)]
pub struct RawChange {
    pub path: String,
    pub kind: ChangeKind,
    pub at: Instant,
}

/// Pure debounce/batch-window state machine for the filesystem watcher.
/// Deliberately has no dependency on `notify` or any async runtime so it
/// can be driven directly in tests with synthetic timestamps (spec §4.10).
///
/// A path settles once `quiet_period` has elapsed since its last observed
/// event. The whole pending set is flushed as soon as either every pending
/// path has settled, or `batch_window` has elapsed since the first event
/// of the current batch — whichever comes first, so a file that keeps
/// being touched can't starve the batch indefinitely.
pub struct WatchDebouncer {
    quiet_period: Duration,
    batch_window: Duration,
    pending: HashMap<String, (ChangeKind, Instant)>,
    batch_started_at: Option<Instant>,
}

impl WatchDebouncer {
    pub fn new(quiet_period: Duration, batch_window: Duration) -> Self {
        Self {
            quiet_period,
            batch_window,
            pending: HashMap::new(),
            batch_started_at: None,
        }
    }

    /// Records a raw event. Later events for the same path overwrite the
    /// earlier one — only the last kind/timestamp per path survives into
    /// the flushed batch.
    pub fn observe(&mut self, change: RawChange) {
        if self.batch_started_at.is_none() {
            self.batch_started_at = Some(change.at);
        }
        self.pending.insert(change.path, (change.kind, change.at));
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Returns the settled batch, if `now` has reached a flush point.
    pub fn poll(&mut self, now: Instant) -> Option<Vec<(String, ChangeKind)>> {
        if self.pending.is_empty() {
            return None;
        }

        let all_quiet = self
            .pending
            .values()
            .all(|(_, at)| now.saturating_duration_since(*at) >= self.quiet_period);
        let window_elapsed = self
            .batch_started_at
            .is_some_and(|started| now.saturating_duration_since(started) >= self.batch_window);

        if !all_quiet && !window_elapsed {
            return None;
        }

        let batch = self
            .pending
            .drain()
            .map(|(path, (kind, _))| (path, kind))
            .collect();
        self.batch_started_at = None;
        Some(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(path: &str, kind: ChangeKind, at: Instant) -> RawChange {
        RawChange {
            path: path.to_string(),
            kind,
            at,
        }
    }

    #[test]
    fn does_not_flush_before_quiet_period() {
        let t0 = Instant::now();
        let mut d = WatchDebouncer::new(Duration::from_millis(300), Duration::from_secs(5));
        d.observe(change("a.rs", ChangeKind::Modified, t0));
        assert!(d.poll(t0 + Duration::from_millis(100)).is_none());
    }

    #[test]
    fn flushes_once_all_paths_are_quiet() {
        let t0 = Instant::now();
        let mut d = WatchDebouncer::new(Duration::from_millis(300), Duration::from_secs(5));
        d.observe(change("a.rs", ChangeKind::Modified, t0));
        let batch = d.poll(t0 + Duration::from_millis(400)).unwrap();
        assert_eq!(batch, vec![("a.rs".to_string(), ChangeKind::Modified)]);
        assert!(d.is_empty());
    }

    #[test]
    fn repeated_touches_reset_the_quiet_timer() {
        let t0 = Instant::now();
        let mut d = WatchDebouncer::new(Duration::from_millis(300), Duration::from_secs(5));
        d.observe(change("a.rs", ChangeKind::Modified, t0));
        assert!(d.poll(t0 + Duration::from_millis(250)).is_none());
        d.observe(change("a.rs", ChangeKind::Modified, t0 + Duration::from_millis(250)));
        // still within 300ms of the second touch
        assert!(d.poll(t0 + Duration::from_millis(400)).is_none());
    }

    #[test]
    fn batch_window_forces_a_flush_under_continuous_churn() {
        let t0 = Instant::now();
        let mut d = WatchDebouncer::new(Duration::from_millis(300), Duration::from_secs(2));
        d.observe(change("a.rs", ChangeKind::Modified, t0));
        // keep touching well inside the quiet period, but past the batch window
        d.observe(change("a.rs", ChangeKind::Modified, t0 + Duration::from_millis(1900)));
        let batch = d.poll(t0 + Duration::from_millis(2100));
        assert!(batch.is_some());
    }

    #[test]
    fn last_kind_per_path_wins() {
        let t0 = Instant::now();
        let mut d = WatchDebouncer::new(Duration::from_millis(100), Duration::from_secs(5));
        d.observe(change("a.rs", ChangeKind::Created, t0));
        d.observe(change("a.rs", ChangeKind::Modified, t0 + Duration::from_millis(10)));
        let batch = d.poll(t0 + Duration::from_millis(200)).unwrap();
        assert_eq!(batch, vec![("a.rs".to_string(), ChangeKind::Modified)]);
    }
}
