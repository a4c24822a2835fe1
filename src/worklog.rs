use std::fmt::Display;

use chrono::NaiveDateTime;

/// Reconciliation state of a time tracker entry relative to its Tempo counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkLogState {
    #[default]
    Unknown,
    /// Entry misses a key, project, activity or description, or has no duration.
    Incomplete,
    /// Entry was never uploaded.
    New,
    /// Uploaded entry whose activity, start, duration or description changed.
    Updated,
    /// Uploaded entry that now points to a different issue.
    Moved,
    Synced,
}

impl Display for WorkLogState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkLogState::Unknown => write!(f, "unknown"),
            WorkLogState::Incomplete => write!(f, "incomplete"),
            WorkLogState::New => write!(f, "new"),
            WorkLogState::Updated => write!(f, "updated"),
            WorkLogState::Moved => write!(f, "moved"),
            WorkLogState::Synced => write!(f, "synced"),
        }
    }
}

/// A single worklog, either loaded from the time tracker (`master_id` set) or from Tempo
/// (`second_id` set). A synced time tracker worklog carries both ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkLog {
    pub state: WorkLogState,

    pub master_id: Option<i64>,
    pub second_id: Option<i64>,
    pub key: Option<String>,
    pub activity: Option<String>,

    pub project: Option<String>,
    pub description: Option<String>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Seconds.
    pub duration: i64,
    pub tags: Vec<String>,

    /// Human readable list of detected changes.
    pub tooltip: Option<String>,
}

impl WorkLog {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, duration: i64) -> Self {
        Self {
            state: WorkLogState::Unknown,
            master_id: None,
            second_id: None,
            key: None,
            activity: None,
            project: None,
            description: None,
            start,
            end,
            duration,
            tags: vec![],
            tooltip: None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.key.is_none()
            || self.project.is_none()
            || self.activity.is_none()
            || self.description.is_none()
            || self.duration <= 0
    }
}
