//! Provisioning error types

use fleetyard_cloud::{CloudError, PowerState};
use fleetyard_core::CoreError;
use fleetyard_ledger::LedgerError;
use std::fmt;
use thiserror::Error;

/// Provider-facing step of a workflow, reported with every provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStep {
    FindImages,
    CreateCompute,
    AllocatePublicAddress,
    AssociatePublicAddress,
    TagCompute,
    DisassociatePublicAddress,
    ReleasePublicAddress,
    TerminateCompute,
    StartCompute,
    StopCompute,
    WaitForPowerState,
    ResizeCompute,
    ListCompute,
    DescribeStatus,
    UpsertDnsRecord,
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            WorkflowStep::FindImages => "find-images",
            WorkflowStep::CreateCompute => "create-compute",
            WorkflowStep::AllocatePublicAddress => "allocate-public-address",
            WorkflowStep::AssociatePublicAddress => "associate-public-address",
            WorkflowStep::TagCompute => "tag-compute",
            WorkflowStep::DisassociatePublicAddress => "disassociate-public-address",
            WorkflowStep::ReleasePublicAddress => "release-public-address",
            WorkflowStep::TerminateCompute => "terminate-compute",
            WorkflowStep::StartCompute => "start-compute",
            WorkflowStep::StopCompute => "stop-compute",
            WorkflowStep::WaitForPowerState => "wait-for-power-state",
            WorkflowStep::ResizeCompute => "resize-compute",
            WorkflowStep::ListCompute => "list-compute",
            WorkflowStep::DescribeStatus => "describe-status",
            WorkflowStep::UpsertDnsRecord => "upsert-dns-record",
        };
        write!(f, "{}", step)
    }
}

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("[{environment}] no image owned by {owner} matches '{name_pattern}'")]
    ImageNotFound {
        environment: String,
        owner: String,
        name_pattern: String,
    },

    #[error(
        "[{environment}] {count} images owned by {owner} match '{name_pattern}'; pin an image id or pick the most recent"
    )]
    AmbiguousImage {
        environment: String,
        owner: String,
        name_pattern: String,
        count: usize,
    },

    #[error("[{environment}] {step} failed for {target}: {source}")]
    Provider {
        step: WorkflowStep,
        environment: String,
        target: String,
        #[source]
        source: CloudError,
    },

    #[error("[{environment}] {id} did not reach {target}: {reason}")]
    WaitTimeout {
        environment: String,
        id: String,
        target: PowerState,
        reason: String,
    },

    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("[{environment}] no DNS zone configured for root domain {root_domain}")]
    UnknownZone {
        environment: String,
        root_domain: String,
    },

    #[error("No addresses given for {0}")]
    EmptyRecord(String),
}

impl ProvisionError {
    pub(crate) fn provider(
        step: WorkflowStep,
        environment: &str,
        target: impl fmt::Display,
        source: CloudError,
    ) -> Self {
        ProvisionError::Provider {
            step,
            environment: environment.to_string(),
            target: target.to_string(),
            source,
        }
    }

    /// Step that failed, for provider failures
    pub fn failed_step(&self) -> Option<WorkflowStep> {
        match self {
            ProvisionError::Provider { step, .. } => Some(*step),
            ProvisionError::WaitTimeout { .. } => Some(WorkflowStep::WaitForPowerState),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
