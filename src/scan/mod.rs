//! Scan job control: isolated workers, timeouts, cancellation, queueing
//! and durable outcomes.

pub mod controller;
pub mod error;
mod monitor;
pub mod result_store;
pub mod types;
pub mod worker;

pub use controller::ScanController;
pub use error::{ControllerError, ResultStoreError, SubmitError};
pub use result_store::{FsResultStore, ResultStore};
pub use types::*;
pub use worker::ScanExecutor;
