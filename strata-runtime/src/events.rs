//! Run events
//!
//! Every run emits an ordered event log. Planned materializations are emitted
//! up front for the job's selected keys; materializations are emitted for
//! every output actually handed to an IO manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strata_core::AssetKey;
use uuid::Uuid;

/// What happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEventKind {
    RunStart,
    AssetMaterializationPlanned {
        asset_key: AssetKey,
    },
    StepStart {
        node: String,
    },
    LoadedInput {
        node: String,
        input: String,
        io_manager_key: Option<String>,
    },
    StepOutput {
        node: String,
        output: String,
    },
    HandledOutput {
        node: String,
        output: String,
        io_manager_key: String,
    },
    AssetMaterialization {
        asset_key: AssetKey,
        partition: Option<String>,
    },
    StepSuccess {
        node: String,
    },
    StepFailure {
        node: String,
        error: String,
    },
    StepSkipped {
        node: String,
    },
    RunSuccess,
    RunFailure {
        error: String,
    },
}

impl RunEventKind {
    /// Event type name, as used when filtering event logs
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunStart => "run_start",
            Self::AssetMaterializationPlanned { .. } => "asset_materialization_planned",
            Self::StepStart { .. } => "step_start",
            Self::LoadedInput { .. } => "loaded_input",
            Self::StepOutput { .. } => "step_output",
            Self::HandledOutput { .. } => "handled_output",
            Self::AssetMaterialization { .. } => "asset_materialization",
            Self::StepSuccess { .. } => "step_success",
            Self::StepFailure { .. } => "step_failure",
            Self::StepSkipped { .. } => "step_skipped",
            Self::RunSuccess => "run_success",
            Self::RunFailure { .. } => "run_failure",
        }
    }
}

/// One entry of a run's event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub run_id: Uuid,
    pub job_name: String,
    pub timestamp: DateTime<Utc>,

    #[serde(flatten)]
    pub kind: RunEventKind,
}

impl RunEvent {
    pub fn new(run_id: Uuid, job_name: impl Into<String>, kind: RunEventKind) -> Self {
        Self {
            run_id,
            job_name: job_name.into(),
            timestamp: Utc::now(),
            kind,
        }
    }

    /// Key of a planned materialization
    pub fn planned_asset_key(&self) -> Option<&AssetKey> {
        match &self.kind {
            RunEventKind::AssetMaterializationPlanned { asset_key } => Some(asset_key),
            _ => None,
        }
    }

    /// Key of an actual materialization
    pub fn materialized_asset_key(&self) -> Option<&AssetKey> {
        match &self.kind {
            RunEventKind::AssetMaterialization { asset_key, .. } => Some(asset_key),
            _ => None,
        }
    }
}
