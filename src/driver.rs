//! Driver contract and the pull-side change-detection baseline.
//!
//! Drivers live outside this crate: push drivers simply send [IngestMessage]s into the
//! processor channel, pull drivers poll their source on an interval and diff against a
//! baseline they themselves own (not the graph). [ChangeTracker] is that baseline: it
//! answers "what is currently not nominal, plus what just returned to nominal" and
//! "what changed since I last looked", so repeated polls produce exactly the events the
//! processor needs and nothing else.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{error::VigilError, event::ExternalEvent};

pub const NOMINAL_STATUS: &str = "OK";

/// Pull-driver interface. `get_all` feeds snapshot syncs, `get_changes` feeds
/// incremental syncs; both are stateful diffs against the driver-owned baseline.
pub trait Driver: Send {
    fn get_all(&mut self) -> Result<Vec<ExternalEvent>, VigilError>;
    fn get_changes(&mut self) -> Result<Vec<ExternalEvent>, VigilError>;
}

/// One observed item in a poll: an opaque key and its raw status string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSample {
    pub key: String,
    pub status: String,
}

impl StatusSample {
    pub fn new(key: &str, status: &str) -> StatusSample {
        StatusSample {
            key: key.to_string(),
            status: status.to_string(),
        }
    }
}

/// The retained per-item status baseline a pull driver diffs its polls against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeTracker {
    nominal: String,
    baseline: BTreeMap<String, String>,
}

impl ChangeTracker {
    pub fn new(nominal: &str) -> ChangeTracker {
        ChangeTracker {
            nominal: nominal.to_string(),
            baseline: BTreeMap::default(),
        }
    }

    /// Items that matter for a full assertion: everything currently not nominal, plus
    /// anything that was last observed non-nominal and has since returned to nominal
    /// (reported once, so the consumer sees the recovery). Advances the baseline.
    pub fn get_all(&mut self, current: &[StatusSample]) -> Vec<StatusSample> {
        let selected = current
            .iter()
            .filter(|sample| {
                let was_nominal = self
                    .baseline
                    .get(&sample.key)
                    .map(|status| status == &self.nominal)
                    .unwrap_or(true);
                sample.status != self.nominal || !was_nominal
            })
            .cloned()
            .collect();
        self.observe(current);
        selected
    }

    /// Items whose status differs from the last observation. Items never seen before
    /// count as nominal, so a new nominal item is not a change. Advances the baseline.
    pub fn get_changes(&mut self, current: &[StatusSample]) -> Vec<StatusSample> {
        let selected = current
            .iter()
            .filter(|sample| {
                let previous = self
                    .baseline
                    .get(&sample.key)
                    .map(String::as_str)
                    .unwrap_or(self.nominal.as_str());
                sample.status != previous
            })
            .cloned()
            .collect();
        self.observe(current);
        selected
    }

    fn observe(&mut self, current: &[StatusSample]) {
        for sample in current {
            self.baseline
                .insert(sample.key.clone(), sample.status.clone());
        }
    }
}
