use client_core::ClientError;
use thiserror::Error;

use crate::controller::{Action, SessionState};

/// Rejected before any network call; session state is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no barcode entered")]
    EmptyBarcode,
    #[error("no company selected")]
    NoCompanySelected,
    #[error("session has no scanned entries")]
    EmptyLedger,
    #[error("barcode {0} is not in the current session")]
    UnknownBarcode(String),
    #[error("cannot {action} while {state}")]
    InvalidTransition { state: SessionState, action: Action },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Some shipments of the batch may already exist remotely; the ledger is kept as-is.
    #[error("commit failed: {failed} of {attempted} shipment calls failed: {source}")]
    Commit {
        failed: usize,
        attempted: usize,
        #[source]
        source: ClientError,
    },
}

impl SessionError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
