//! Ledger error types

use fleetyard_core::{Accessibility, CoreError};
use std::net::Ipv4Addr;
use thiserror::Error;

/// Broad class of a ledger failure, used to decide how loudly to report it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Missing or invalid configuration; fix the config and retry by hand
    Configuration,
    /// The request collides with existing state
    Conflict,
    /// Ledger and configuration have drifted apart
    Consistency,
    /// Persistence backend failure
    Storage,
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Environment not found: {0}")]
    UnknownEnvironment(String),

    #[error("Invalid environment name: {0}")]
    InvalidEnvironment(String),

    #[error("[{environment}] no container is configured for {accessibility} instances")]
    NoMatchingContainer {
        environment: String,
        accessibility: Accessibility,
    },

    #[error(
        "[{environment}] no free address left in container {container} ({cidr}) after scanning {scanned} candidates"
    )]
    AddressExhaustion {
        environment: String,
        container: String,
        cidr: String,
        scanned: u32,
    },

    #[error("[{environment}] an instance named '{name}' already exists")]
    DuplicateName { environment: String, name: String },

    #[error("[{environment}] no reservation holds private address {address}")]
    UnknownReservation {
        environment: String,
        address: Ipv4Addr,
    },

    #[error("[{environment}] private address {address} belongs to bound instance {id}")]
    AddressBound {
        environment: String,
        address: Ipv4Addr,
        id: String,
    },

    #[error("[{environment}] instance not tracked: {id}")]
    UnknownInstance { environment: String, id: String },

    #[error(
        "[{environment}] instance {instance} references container {container} which is no longer configured"
    )]
    UnknownContainer {
        environment: String,
        instance: String,
        container: String,
    },

    #[error("[{environment}] container {container} references unknown key pair {key_pair}")]
    UnknownKeyPair {
        environment: String,
        container: String,
        key_pair: String,
    },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("State error: {0}")]
    StateError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LedgerError {
    pub fn class(&self) -> ErrorClass {
        match self {
            LedgerError::UnknownEnvironment(_)
            | LedgerError::InvalidEnvironment(_)
            | LedgerError::NoMatchingContainer { .. }
            | LedgerError::Core(_) => ErrorClass::Configuration,
            LedgerError::AddressExhaustion { .. }
            | LedgerError::DuplicateName { .. }
            | LedgerError::AddressBound { .. }
            | LedgerError::UnknownInstance { .. } => ErrorClass::Conflict,
            LedgerError::UnknownReservation { .. }
            | LedgerError::UnknownContainer { .. }
            | LedgerError::UnknownKeyPair { .. } => ErrorClass::Consistency,
            LedgerError::StateError(_) | LedgerError::Io(_) | LedgerError::Json(_) => {
                ErrorClass::Storage
            }
        }
    }

    /// Whether an operator should be paged about this failure
    pub fn is_alert(&self) -> bool {
        matches!(self, LedgerError::AddressExhaustion { .. })
            || self.class() == ErrorClass::Consistency
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
