use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};

/// Whether an event asserts the entire current truth for a data source scope at poll
/// time, or a single change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// First full assertion after startup.
    InitSnapshot,
    /// Periodic full assertion.
    Snapshot,
    /// A single change pushed or polled between snapshots.
    Incremental,
}

impl SyncMode {
    pub fn is_snapshot(&self) -> bool {
        matches!(self, SyncMode::InitSnapshot | SyncMode::Snapshot)
    }
}

impl Display for SyncMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::InitSnapshot => write!(f, "init_snapshot"),
            SyncMode::Snapshot => write!(f, "snapshot"),
            SyncMode::Incremental => write!(f, "incremental"),
        }
    }
}

/// What the transformer decided this event does to its entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    CreateEntity,
    UpdateEntity,
    DeleteEntity,
}

impl Display for EventAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EventAction::CreateEntity => write!(f, "create_entity"),
            EventAction::UpdateEntity => write!(f, "update_entity"),
            EventAction::DeleteEntity => write!(f, "delete_entity"),
        }
    }
}

/// One raw event as delivered by a driver, before transformation. `sample_timestamp` is
/// the source's own time for the observation, which orders updates regardless of
/// wall-clock arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalEvent {
    pub datasource: String,
    pub sync_mode: SyncMode,
    /// Driver-side hint; the transformer makes the final action decision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<EventAction>,
    pub sample_timestamp: DateTime<Utc>,
    pub payload: Value,
}

impl ExternalEvent {
    pub fn new(
        datasource: &str,
        sync_mode: SyncMode,
        sample_timestamp: DateTime<Utc>,
        payload: Value,
    ) -> ExternalEvent {
        ExternalEvent {
            datasource: datasource.to_string(),
            sync_mode,
            action: None,
            sample_timestamp,
            payload,
        }
    }

    pub fn with_action(mut self, action: EventAction) -> ExternalEvent {
        self.action = Some(action);
        self
    }
}

impl Display for ExternalEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ExternalEvent({}, {})", self.datasource, self.sync_mode)
    }
}

/// Channel vocabulary in front of the processor. Producers (drivers) may be many and
/// concurrent; a single consumer applies messages strictly in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IngestMessage {
    Entity(ExternalEvent),
    /// A full-snapshot batch for one datasource finished; entities of that scope that
    /// the batch did not assert are implicitly gone.
    SnapshotEnd { datasource: String },
}

impl Display for IngestMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestMessage::Entity(event) => write!(f, "Entity({event})"),
            IngestMessage::SnapshotEnd { datasource } => {
                write!(f, "SnapshotEnd({datasource})")
            }
        }
    }
}
