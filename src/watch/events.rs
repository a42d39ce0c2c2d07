//! Monitor configuration and notify event conversion.

use crate::indexer::commit::DEFAULT_COMMIT_WAIT;
use crate::indexer::ChangeEvent;
use crate::tree::ignore::IgnoreRules;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// How long the source half of a split rename waits for its destination.
pub const DEFAULT_RENAME_WINDOW: Duration = Duration::from_millis(500);

/// Monitor configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Directories watched recursively
    pub directories: Vec<PathBuf>,
    /// Run the repair traversal and a full directory scan before watching
    pub scan: bool,
    /// Debounce window before buffered changes are committed
    pub commit_wait: Duration,
    /// Wake-up interval of the monitor loop
    pub tick: Duration,
    /// Wait for the destination half of a split rename
    pub rename_window: Duration,
    /// Paths never indexed
    pub ignore: IgnoreRules,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            directories: Vec::new(),
            scan: false,
            commit_wait: DEFAULT_COMMIT_WAIT,
            tick: Duration::from_secs(5),
            rename_window: DEFAULT_RENAME_WINDOW,
            ignore: IgnoreRules::default(),
        }
    }
}

/// Translate a notify event into change events for the index, statelessly.
///
/// Half renames carry only one side: the vanished source is a removal and
/// the new destination a creation. [`RenamePairer`] joins the halves first
/// where the backend allows it. Anything the state machine cannot act on
/// (access, metadata-free "other" events) is dropped.
pub fn convert_event(event: Event) -> Vec<ChangeEvent> {
    let mut paths = event.paths.into_iter();
    match event.kind {
        EventKind::Create(_) => paths.map(ChangeEvent::Created).collect(),
        EventKind::Remove(_) => paths.map(ChangeEvent::Removed).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            paths.map(ChangeEvent::Removed).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            paths.map(ChangeEvent::Created).collect()
        }
        EventKind::Modify(ModifyKind::Name(_)) => match (paths.next(), paths.next()) {
            (Some(from), Some(to)) => vec![ChangeEvent::Renamed { from, to }],
            (Some(path), None) => vec![ChangeEvent::Modified(path)],
            _ => Vec::new(),
        },
        EventKind::Modify(_) => paths.map(ChangeEvent::Modified).collect(),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

#[derive(Debug)]
struct PendingSource {
    tracker: Option<usize>,
    path: PathBuf,
    seen: Instant,
}

/// Joins split rename events into one [`ChangeEvent::Renamed`].
///
/// inotify reports a rename as `Name(From)`, `Name(To)` and then
/// `Name(Both)`, all carrying the same tracker. Handled one by one, the
/// source half would delete the node before the move could keep its id. A
/// source half is therefore held until its destination arrives; the trailing
/// `Both` of a pair already joined is dropped. A source left unpaired for
/// `window` (moved out of the watch) becomes a removal, a destination without
/// a source (moved in) a creation.
#[derive(Debug)]
pub struct RenamePairer {
    window: Duration,
    pending: Vec<PendingSource>,
    joined: Vec<(usize, Instant)>,
}

impl RenamePairer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Vec::new(),
            joined: Vec::new(),
        }
    }

    /// Convert `event`, holding or pairing rename halves.
    pub fn convert(&mut self, event: Event, now: Instant) -> Vec<ChangeEvent> {
        let tracker = event.attrs.tracker();
        match event.kind {
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                for path in event.paths {
                    self.pending.push(PendingSource {
                        tracker,
                        path,
                        seen: now,
                    });
                }
                Vec::new()
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
                .paths
                .into_iter()
                .map(|to| match self.take_pending(tracker) {
                    Some(from) => {
                        if let Some(tracker) = tracker {
                            self.joined.push((tracker, now));
                        }
                        ChangeEvent::Renamed { from, to }
                    }
                    None => ChangeEvent::Created(to),
                })
                .collect(),
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                if let Some(tracker) = tracker {
                    if let Some(at) = self.joined.iter().position(|(t, _)| *t == tracker) {
                        self.joined.remove(at);
                        return Vec::new();
                    }
                }
                self.take_pending(tracker);
                convert_event(event)
            }
            _ => convert_event(event),
        }
    }

    /// Removals for source halves that waited longer than the window.
    pub fn expire(&mut self, now: Instant) -> Vec<ChangeEvent> {
        let window = self.window;
        self.joined
            .retain(|(_, at)| now.saturating_duration_since(*at) < window);
        let (expired, waiting): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|p| now.saturating_duration_since(p.seen) >= window);
        self.pending = waiting;
        expired
            .into_iter()
            .map(|p| ChangeEvent::Removed(p.path))
            .collect()
    }

    /// Removals for every held source half.
    pub fn flush(&mut self) -> Vec<ChangeEvent> {
        self.joined.clear();
        self.pending
            .drain(..)
            .map(|p| ChangeEvent::Removed(p.path))
            .collect()
    }

    /// When the oldest held source half expires.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|p| p.seen + self.window).min()
    }

    fn take_pending(&mut self, tracker: Option<usize>) -> Option<PathBuf> {
        let at = self.pending.iter().rposition(|p| p.tracker == tracker)?;
        Some(self.pending.remove(at).path)
    }
}

/// Strip ignored paths from an event.
///
/// A rename that crosses the ignore boundary degrades to the side that is
/// still visible: moving out of an ignored area creates, moving into one
/// removes.
pub fn filter_ignored(event: ChangeEvent, ignore: &IgnoreRules) -> Option<ChangeEvent> {
    match event {
        ChangeEvent::Created(ref p) | ChangeEvent::Modified(ref p) | ChangeEvent::Removed(ref p) => {
            (!ignore.is_ignored(p)).then_some(event)
        }
        ChangeEvent::Renamed { from, to } => {
            match (ignore.is_ignored(&from), ignore.is_ignored(&to)) {
                (false, false) => Some(ChangeEvent::Renamed { from, to }),
                (true, false) => Some(ChangeEvent::Created(to)),
                (false, true) => Some(ChangeEvent::Removed(from)),
                (true, true) => None,
            }
        }
    }
}
