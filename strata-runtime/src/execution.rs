//! In-process execution
//!
//! Runs a job's nodes one after another in the current thread. Every value
//! crosses an IO manager: outputs are handed to the IO manager of their output
//! and inputs are loaded through the IO manager they are wired to, even when
//! the producing node ran earlier in the same run.

use crate::events::{RunEvent, RunEventKind};
use crate::job::{InputSource, InputWiring, JobDefinition, JobNode};
use crate::run_storage::{InMemoryRunStorage, RunRecord, RunStorage};
use crate::state_machine::{RunStatus, StateMachine};
use crate::Result;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use strata_core::key::format_names;
use strata_core::{
    AssetKey, ComputeContext, Error, InputContext, IoManager, OutputContext, Value,
    DEFAULT_OUTPUT_NAME, PARTITION_NAME_TAG,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Options for a single in-process run
#[derive(Clone, Default)]
pub struct ExecuteOptions {
    run_storage: Option<Arc<dyn RunStorage>>,
    tags: BTreeMap<String, String>,
    partition_key: Option<String>,
    run_id: Option<Uuid>,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the run in `storage` instead of a throwaway in-memory store
    pub fn with_run_storage(mut self, storage: Arc<dyn RunStorage>) -> Self {
        self.run_storage = Some(storage);
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags.extend(tags);
        self
    }

    /// Run a single partition; also sets the partition tag
    pub fn with_partition_key(mut self, key: impl Into<String>) -> Self {
        self.partition_key = Some(key.into());
        self
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }
}

/// Outcome of an in-process run
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    run_id: Uuid,
    job_name: String,
    success: bool,
    events: Vec<RunEvent>,
    outputs: HashMap<(String, String), Value>,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.success
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Events emitted by the run, in order
    pub fn events(&self) -> &[RunEvent] {
        &self.events
    }

    /// Value a node returned for its default output
    pub fn output_for_node(&self, node_name: &str) -> Option<&Value> {
        self.output_for_node_output(node_name, DEFAULT_OUTPUT_NAME)
    }

    /// Value a node returned for the named output
    pub fn output_for_node_output(&self, node_name: &str, output_name: &str) -> Option<&Value> {
        self.outputs
            .get(&(node_name.to_string(), output_name.to_string()))
    }

    /// Keys planned for materialization, in emission order
    pub fn planned_asset_keys(&self) -> Vec<&AssetKey> {
        self.events
            .iter()
            .filter_map(RunEvent::planned_asset_key)
            .collect()
    }

    /// Keys actually materialized, in emission order
    pub fn materialized_asset_keys(&self) -> Vec<&AssetKey> {
        self.events
            .iter()
            .filter_map(RunEvent::materialized_asset_key)
            .collect()
    }

    /// Failure messages of failed steps, keyed by node
    pub fn step_failures(&self) -> BTreeMap<&str, &str> {
        self.events
            .iter()
            .filter_map(|event| match &event.kind {
                RunEventKind::StepFailure { node, error } => Some((node.as_str(), error.as_str())),
                _ => None,
            })
            .collect()
    }
}

/// Mutable state of one run
struct Run<'a> {
    job: &'a JobDefinition,
    run_id: Uuid,
    partition_key: Option<String>,
    storage: Arc<dyn RunStorage>,
    events: Vec<RunEvent>,
    outputs: HashMap<(String, String), Value>,
}

impl Run<'_> {
    fn emit(&mut self, kind: RunEventKind) -> Result<()> {
        let event = RunEvent::new(self.run_id, self.job.name(), kind);
        self.storage.handle_run_event(event.clone())?;
        self.events.push(event);
        Ok(())
    }

    fn io_manager(&self, key: &str) -> Result<Arc<dyn IoManager>> {
        self.job
            .resource_defs()
            .get(key)
            .and_then(|resource| resource.as_io_manager())
            .ok_or_else(|| {
                Error::IoManager(format!(
                    "Resource '{}' of job '{}' is not an IO manager",
                    key,
                    self.job.name()
                ))
                .into()
            })
    }

    fn input_context(&self, wiring: &InputWiring) -> InputContext {
        let upstream_output = match &wiring.source {
            InputSource::Upstream {
                node_name,
                output_name,
            } => Some(OutputContext {
                run_id: self.run_id,
                step_key: node_name.clone(),
                name: output_name.clone(),
                asset_key: Some(wiring.asset_key.clone()),
                partition_key: self.partition_key.clone(),
            }),
            InputSource::External => None,
        };
        InputContext {
            name: wiring.input_name.clone(),
            asset_key: Some(wiring.asset_key.clone()),
            upstream_output,
            partition_key: self.partition_key.clone(),
        }
    }

    fn resource_values(&self, node: &JobNode) -> HashMap<String, Value> {
        let resources = self.job.resource_defs();
        node.definition
            .required_resource_keys()
            .iter()
            .map(|key| {
                let value = resources
                    .get(key)
                    .and_then(|resource| resource.value().cloned())
                    .unwrap_or(Value::Null);
                (key.clone(), value)
            })
            .collect()
    }

    /// Load inputs, compute and hand outputs to IO managers
    fn run_step(&mut self, node: &JobNode) -> Result<()> {
        let node_name = node.name().to_string();

        let mut inputs = HashMap::with_capacity(node.inputs.len());
        for wiring in &node.inputs {
            let io_manager = self.io_manager(&wiring.io_manager_key)?;
            let value = io_manager.load_input(&self.input_context(wiring))?;
            inputs.insert(wiring.input_name.clone(), value);
            self.emit(RunEventKind::LoadedInput {
                node: node_name.clone(),
                input: wiring.input_name.clone(),
                io_manager_key: Some(wiring.io_manager_key.clone()),
            })?;
        }

        let selected: Vec<String> = node
            .definition
            .selected_outputs()
            .map(|out| out.name.clone())
            .collect();
        let context = ComputeContext::new(
            self.run_id,
            node_name.clone(),
            inputs,
            self.resource_values(node),
            selected.clone(),
            self.partition_key.clone(),
        );

        let mut yielded = HashSet::new();
        for output in node.definition.compute(&context)? {
            let out = node.definition.output_named(&output.name).ok_or_else(|| {
                Error::Execution(format!(
                    "Node '{}' yielded an output '{}' it does not declare",
                    node_name, output.name
                ))
            })?;
            if !yielded.insert(output.name.clone()) {
                return Err(Error::Execution(format!(
                    "Node '{}' yielded output '{}' more than once",
                    node_name, output.name
                ))
                .into());
            }
            if !selected.contains(&output.name) {
                warn!(
                    node = %node_name,
                    output = %output.name,
                    asset_key = %out.asset_key,
                    "Node yielded an output that was not selected"
                );
            }

            self.emit(RunEventKind::StepOutput {
                node: node_name.clone(),
                output: output.name.clone(),
            })?;

            let output_context = OutputContext {
                run_id: self.run_id,
                step_key: node_name.clone(),
                name: output.name.clone(),
                asset_key: Some(out.asset_key.clone()),
                partition_key: self.partition_key.clone(),
            };
            self.io_manager(&out.io_manager_key)?
                .handle_output(&output_context, &output.value)?;

            self.emit(RunEventKind::HandledOutput {
                node: node_name.clone(),
                output: output.name.clone(),
                io_manager_key: out.io_manager_key.clone(),
            })?;
            self.emit(RunEventKind::AssetMaterialization {
                asset_key: out.asset_key.clone(),
                partition: self.partition_key.clone(),
            })?;
            self.outputs
                .insert((node_name.clone(), output.name), output.value);
        }

        let missing: Vec<&str> = node
            .definition
            .selected_outputs()
            .filter(|out| out.is_required && !yielded.contains(&out.name))
            .map(|out| out.name.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(Error::Execution(format!(
                "Node '{}' did not yield required outputs {}",
                node_name,
                format_names(missing)
            ))
            .into());
        }

        Ok(())
    }
}

impl JobDefinition {
    /// Run the job in the current process with default options
    pub fn execute_in_process(&self) -> Result<ExecutionResult> {
        self.execute_in_process_with(ExecuteOptions::default())
    }

    /// Run the job in the current process
    ///
    /// Step failures do not return an error: they are recorded as
    /// `StepFailure` events, downstream steps are skipped and the result
    /// reports `success() == false`. Errors are returned only when the run
    /// cannot be recorded or the partition key is not valid for the job.
    pub fn execute_in_process_with(&self, options: ExecuteOptions) -> Result<ExecutionResult> {
        let ExecuteOptions {
            run_storage,
            mut tags,
            partition_key,
            run_id,
        } = options;

        if let (Some(key), Some(partitions_def)) = (&partition_key, self.partitions_def()) {
            if !partitions_def.has_partition_key(key, Utc::now()) {
                return Err(Error::Config(format!(
                    "Partition key '{}' is not a partition of job '{}'",
                    key,
                    self.name()
                ))
                .into());
            }
        }
        if let Some(key) = &partition_key {
            tags.insert(PARTITION_NAME_TAG.to_string(), key.clone());
        }

        let run_id = run_id.unwrap_or_else(Uuid::new_v4);
        let storage: Arc<dyn RunStorage> = match run_storage {
            Some(storage) => storage,
            None => Arc::new(InMemoryRunStorage::new()),
        };
        storage.add_run(RunRecord::new(run_id, self.name(), tags))?;

        let mut state = StateMachine::new();
        let mut run = Run {
            job: self,
            run_id,
            partition_key,
            storage,
            events: Vec::new(),
            outputs: HashMap::new(),
        };

        state.transition(RunStatus::Started)?;
        info!(job = %self.name(), run_id = %run_id, nodes = self.nodes().len(), "Starting run");
        run.emit(RunEventKind::RunStart)?;
        for key in self.asset_keys() {
            run.emit(RunEventKind::AssetMaterializationPlanned {
                asset_key: key.clone(),
            })?;
        }

        let mut unsuccessful: HashSet<&str> = HashSet::new();
        let mut failed: Vec<&str> = Vec::new();
        for node in self.nodes() {
            let node_name = node.name();
            if node
                .upstream_nodes()
                .iter()
                .any(|upstream| unsuccessful.contains(upstream))
            {
                debug!(node = node_name, "Skipping step with failed upstream");
                unsuccessful.insert(node_name);
                run.emit(RunEventKind::StepSkipped {
                    node: node_name.to_string(),
                })?;
                continue;
            }

            run.emit(RunEventKind::StepStart {
                node: node_name.to_string(),
            })?;
            match run.run_step(node) {
                Ok(()) => {
                    debug!(node = node_name, "Step succeeded");
                    run.emit(RunEventKind::StepSuccess {
                        node: node_name.to_string(),
                    })?;
                }
                Err(err) => {
                    error!(node = node_name, error = %err, "Step failed");
                    unsuccessful.insert(node_name);
                    failed.push(node_name);
                    run.emit(RunEventKind::StepFailure {
                        node: node_name.to_string(),
                        error: err.to_string(),
                    })?;
                }
            }
        }

        let success = failed.is_empty();
        if success {
            state.transition(RunStatus::Success)?;
            run.emit(RunEventKind::RunSuccess)?;
        } else {
            state.transition(RunStatus::Failure)?;
            run.emit(RunEventKind::RunFailure {
                error: format!(
                    "Execution of run for \"{}\" failed. Steps failed: {}",
                    self.name(),
                    format_names(failed)
                ),
            })?;
        }
        info!(job = %self.name(), run_id = %run_id, status = %state.current_state(), "Run finished");

        Ok(ExecutionResult {
            run_id,
            job_name: self.name().to_string(),
            success,
            events: run.events,
            outputs: run.outputs,
        })
    }
}
