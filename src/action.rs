//! Reversible file-system actions and the batches classifiers produce.
//!
//! Every action carries enough information to be inverted later: the
//! kind-specific payload (trash location, byte backup, directory flag) lives
//! inside [`ActionKind`] so that undo and redo can dispatch on a single match.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Local};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};

/// Raw bytes of a small file, kept so a deletion or creation can be replayed.
///
/// Serialized as a base64 string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteBackup(pub Vec<u8>);

impl ByteBackup {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for ByteBackup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for ByteBackup {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(ByteBackup)
            .map_err(serde::de::Error::custom)
    }
}

/// The kind of a recorded operation, with its kind-specific metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    Move,
    Copy,
    Rename,
    Delete {
        /// Where the deleted item was moved to, if it was kept.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trash_path: Option<PathBuf>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        backup: Option<ByteBackup>,
    },
    Create {
        #[serde(default)]
        is_dir: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        backup: Option<ByteBackup>,
    },
}

impl ActionKind {
    /// Short label used in history listings and exports.
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Move => "Move",
            ActionKind::Copy => "Copy",
            ActionKind::Rename => "Rename",
            ActionKind::Delete { .. } => "Delete",
            ActionKind::Create { .. } => "Create",
        }
    }
}

/// One reversible file-system operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    /// Empty for [`ActionKind::Create`].
    #[serde(default)]
    pub source: PathBuf,
    pub destination: PathBuf,
    pub timestamp: DateTime<Local>,
}

impl Action {
    pub fn new(kind: ActionKind, source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            source: source.into(),
            destination: destination.into(),
            timestamp: Local::now(),
        }
    }

    pub fn moved(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self::new(ActionKind::Move, source, destination)
    }

    pub fn copied(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self::new(ActionKind::Copy, source, destination)
    }

    pub fn renamed(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self::new(ActionKind::Rename, source, destination)
    }

    pub fn deleted(
        source: impl Into<PathBuf>,
        trash_path: Option<PathBuf>,
        backup: Option<ByteBackup>,
    ) -> Self {
        let destination = trash_path.clone().unwrap_or_default();
        Self::new(ActionKind::Delete { trash_path, backup }, source, destination)
    }

    pub fn created(destination: impl Into<PathBuf>, is_dir: bool, backup: Option<ByteBackup>) -> Self {
        Self::new(
            ActionKind::Create { is_dir, backup },
            PathBuf::new(),
            destination,
        )
    }

    /// Same action with a fresh timestamp, used when a redo re-records it.
    pub fn restamped(&self) -> Self {
        Self {
            timestamp: Local::now(),
            ..self.clone()
        }
    }

    pub fn is_move(&self) -> bool {
        matches!(self.kind, ActionKind::Move)
    }

    /// One-line human description.
    pub fn describe(&self) -> String {
        match &self.kind {
            ActionKind::Create { .. } => format!("Create {}", self.destination.display()),
            ActionKind::Delete { .. } => format!("Delete {}", self.source.display()),
            kind => format!(
                "{} {} → {}",
                kind.label(),
                self.source.display(),
                self.destination.display()
            ),
        }
    }
}

/// The successful moves of one classifier run, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationBatch {
    pub created_at: DateTime<Local>,
    pub actions: Vec<Action>,
}

impl OrganizationBatch {
    pub fn new() -> Self {
        Self {
            created_at: Local::now(),
            actions: Vec::new(),
        }
    }

    /// Rebuilds a batch read back from a log line. The creation time is the
    /// timestamp of its first action.
    pub fn from_actions(actions: Vec<Action>) -> Self {
        let created_at = actions
            .first()
            .map(|a| a.timestamp)
            .unwrap_or_else(Local::now);
        Self {
            created_at,
            actions,
        }
    }

    pub fn record_move(&mut self, source: &Path, destination: &Path) {
        self.actions.push(Action::moved(source, destination));
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl Default for OrganizationBatch {
    fn default() -> Self {
        Self::new()
    }
}
