//! User-facing notices raised after adds, deletes, and loads.
//!
//! The controller only needs something implementing [`Notifier`]. The
//! terminal UI uses [`NoticeCenter`], which keeps a few live notices that
//! auto-dismiss by kind plus a bounded history ring.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Maximum number of notices kept in the history ring.
pub const NOTICE_HISTORY_MAX: usize = 50;

/// Maximum number of notices visible at once.
pub const MAX_VISIBLE_NOTICES: usize = 3;

const SUCCESS_DISMISS_MS: u64 = 4_000;
const ERROR_DISMISS_MS: u64 = 8_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Success,
    Error,
}

impl NoticeKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Success => "OK",
            Self::Error => "ERR",
        }
    }

    #[must_use]
    pub fn dismiss_after(self) -> Duration {
        match self {
            Self::Info | Self::Success => Duration::from_millis(SUCCESS_DISMISS_MS),
            Self::Error => Duration::from_millis(ERROR_DISMISS_MS),
        }
    }
}

/// Fire-and-forget notification sink.
pub trait Notifier {
    fn notify(&mut self, kind: NoticeKind, message: &str);
}

/// Discards every notice. Useful for headless callers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&mut self, _kind: NoticeKind, _message: &str) {}
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub id: u64,
    pub kind: NoticeKind,
    pub message: String,
    pub dismiss_at: Instant,
}

#[derive(Debug, Default)]
pub struct NoticeCenter {
    active: VecDeque<Notice>,
    history: VecDeque<Notice>,
    next_id: u64,
}

impl NoticeCenter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: NoticeKind, message: impl Into<String>) {
        self.push_at(kind, message, Instant::now());
    }

    fn push_at(&mut self, kind: NoticeKind, message: impl Into<String>, now: Instant) {
        let notice = Notice {
            id: self.next_id,
            kind,
            message: message.into(),
            dismiss_at: now + kind.dismiss_after(),
        };
        self.next_id += 1;

        if self.active.len() >= MAX_VISIBLE_NOTICES {
            if let Some(evicted) = self.active.pop_front() {
                self.push_history(evicted);
            }
        }
        self.active.push_back(notice);
    }

    /// Dismiss expired notices. Returns `true` if anything changed.
    pub fn tick(&mut self) -> bool {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> bool {
        let before = self.active.len();
        while let Some(pos) = self.active.iter().position(|n| now >= n.dismiss_at) {
            if let Some(expired) = self.active.remove(pos) {
                self.push_history(expired);
            }
        }
        self.active.len() != before
    }

    pub fn dismiss_all(&mut self) {
        while let Some(notice) = self.active.pop_front() {
            self.push_history(notice);
        }
    }

    /// Live notices, oldest first.
    pub fn active(&self) -> impl Iterator<Item = &Notice> {
        self.active.iter()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&Notice> {
        self.active.back().or_else(|| self.history.back())
    }

    #[must_use]
    pub fn history(&self) -> &VecDeque<Notice> {
        &self.history
    }

    fn push_history(&mut self, notice: Notice) {
        if self.history.len() >= NOTICE_HISTORY_MAX {
            self.history.pop_front();
        }
        self.history.push_back(notice);
    }
}

impl Notifier for NoticeCenter {
    fn notify(&mut self, kind: NoticeKind, message: &str) {
        self.push(kind, message);
    }
}
