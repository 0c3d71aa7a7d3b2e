//! Executor definitions
//!
//! Groups and jobs only record which executor they were configured with.
//! Runs started from this workspace always execute in process; the
//! multiprocess executor exists so that entry points can reject it.

use serde::{Deserialize, Serialize};

/// Executor attached to an asset group or job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorDefinition {
    /// Run every step sequentially in the current process
    InProcess,

    /// Run each step in a child process
    Multiprocess {
        /// Upper bound on concurrently running steps (0 = number of CPUs)
        max_concurrent: usize,
    },
}

impl ExecutorDefinition {
    /// The multiprocess executor with its default concurrency
    pub fn multiprocess() -> Self {
        Self::Multiprocess { max_concurrent: 0 }
    }

    /// Name used in error messages and configuration
    pub fn name(&self) -> &'static str {
        match self {
            Self::InProcess => "in_process",
            Self::Multiprocess { .. } => "multiprocess",
        }
    }

    /// Parse an executor from its configuration name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "in_process" => Some(Self::InProcess),
            "multiprocess" => Some(Self::multiprocess()),
            _ => None,
        }
    }

    pub fn is_in_process(&self) -> bool {
        matches!(self, Self::InProcess)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for executor in [ExecutorDefinition::InProcess, ExecutorDefinition::multiprocess()] {
            assert_eq!(ExecutorDefinition::from_name(executor.name()), Some(executor));
        }
        assert_eq!(ExecutorDefinition::from_name("celery"), None);
    }
}
