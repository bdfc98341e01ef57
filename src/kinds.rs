use crate::models::{Record, STATUS_FIELD};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static LABEL_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s_\-]+").expect("valid separator regex"));

pub const UNKNOWN_STATUS: &str = "Unknown";
pub const PRIORITY_FIELD: &str = "priority";

/// Lower-cases and collapses `-`, `_` and whitespace runs so that
/// `"In Progress"`, `"in-progress"` and `"in_progress"` compare equal.
pub fn normalize_label(value: &str) -> String {
    LABEL_SEPARATORS
        .replace_all(value.trim(), " ")
        .trim()
        .to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordKind {
    Project,
    Task,
    Activity,
    Transaction,
    Contact,
    Meeting,
    Milestone,
}

impl RecordKind {
    pub const ALL: [Self; 7] = [
        Self::Project,
        Self::Task,
        Self::Activity,
        Self::Transaction,
        Self::Contact,
        Self::Meeting,
        Self::Milestone,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Task => "task",
            Self::Activity => "activity",
            Self::Transaction => "transaction",
            Self::Contact => "contact",
            Self::Meeting => "meeting",
            Self::Milestone => "milestone",
        }
    }

    pub fn collection(self) -> &'static str {
        match self {
            Self::Project => "projects",
            Self::Task => "tasks",
            Self::Activity => "activities",
            Self::Transaction => "transactions",
            Self::Contact => "contacts",
            Self::Meeting => "meetings",
            Self::Milestone => "milestones",
        }
    }

    pub fn statuses(self) -> &'static [&'static str] {
        match self {
            Self::Project => &["not started", "upcoming", "in progress", "completed", "on hold"],
            Self::Task => &["pending", "approved", "rejected", "changes_requested", "revoked"],
            Self::Activity => &["pending", "approved", "rejected", "completed"],
            Self::Transaction => &["pending", "completed", "failed", "refunded"],
            Self::Contact => &["active", "archived"],
            Self::Meeting => &["upcoming", "in progress", "completed", "cancelled"],
            Self::Milestone => &["upcoming", "in progress", "completed"],
        }
    }

    /// Bucket for records whose status is absent or outside the enumeration.
    pub fn fallback_status(self) -> &'static str {
        match self {
            Self::Project => "not started",
            Self::Contact => "active",
            Self::Meeting | Self::Milestone => "upcoming",
            Self::Task | Self::Activity | Self::Transaction => UNKNOWN_STATUS,
        }
    }

    pub fn date_field(self) -> &'static str {
        match self {
            Self::Project | Self::Task | Self::Contact => "createdAt",
            Self::Activity => "timestamp",
            Self::Transaction | Self::Meeting => "date",
            Self::Milestone => "dueDate",
        }
    }

    pub fn search_fields(self) -> &'static [&'static str] {
        match self {
            Self::Project => &["name", "description", "clientName"],
            Self::Task => &["title", "description", "projectName", "assignee"],
            Self::Activity => &["title", "description", "userName", "type"],
            Self::Transaction => &["description", "reference", "email"],
            Self::Contact => &["name", "email", "company", "phone"],
            Self::Meeting => &["title", "description", "location"],
            Self::Milestone => &["title", "description"],
        }
    }

    pub fn tab_statuses(self, tab: &str) -> Option<&'static [&'static str]> {
        let tab = normalize_label(tab);
        match (self, tab.as_str()) {
            (Self::Project, "active") => Some(&["upcoming", "in progress"]),
            (Self::Project, "completed") => Some(&["completed"]),
            (Self::Task, "pending") => Some(&["pending"]),
            (Self::Task, "history") => Some(&["approved", "rejected", "changes_requested", "revoked"]),
            (Self::Meeting, "upcoming") => Some(&["upcoming"]),
            (Self::Meeting, "past") => Some(&["completed", "cancelled"]),
            _ => None,
        }
    }

    /// Value used for `field` when a record of this kind does not carry it.
    pub fn field_default(self, field: &str) -> Option<&'static str> {
        match (self, field) {
            (Self::Task, PRIORITY_FIELD) => Some("Medium"),
            _ => None,
        }
    }

    /// Declared label matching `raw` after normalization.
    pub fn resolve_status(self, raw: &str) -> Option<&'static str> {
        let wanted = normalize_label(raw);
        self.statuses()
            .iter()
            .copied()
            .find(|status| normalize_label(status) == wanted)
    }

    pub fn canonical_status(self, record: &Record) -> &'static str {
        record
            .text(STATUS_FIELD)
            .and_then(|raw| self.resolve_status(&raw))
            .unwrap_or_else(|| self.fallback_status())
    }

    pub fn field_text(self, record: &Record, field: &str) -> Option<String> {
        record
            .text(field)
            .or_else(|| self.field_default(field).map(ToString::to_string))
    }

    /// Short human label used in notifications.
    pub fn display_title(self, record: &Record) -> String {
        self.search_fields()
            .iter()
            .find_map(|field| record.text(field).filter(|value| !value.trim().is_empty()))
            .unwrap_or_else(|| record.id.clone())
    }
}
