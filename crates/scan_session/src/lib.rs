//! Scan session controller: batches barcode scans for one company in memory and replays
//! them to the shipment service as one shipment per scanned unit.

pub mod controller;
pub mod debounce;
pub mod error;
pub mod feedback;
pub mod ledger;

pub use controller::{Action, ScanOutcome, ScanSessionController, SessionState};
pub use debounce::ScanDebouncer;
pub use error::{SessionError, ValidationError};
pub use feedback::{FeedbackSink, SilentFeedback, Tone};
pub use ledger::{Ledger, ScanEntry, SummaryRecord};
