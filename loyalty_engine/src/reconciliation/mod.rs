//! # Reconciliation
//!
//! Reconciliation is the act of asking the accrual authority what an order is worth and applying the answer to the
//! ledger. It happens in the background, off the request path.
//!
//! [`ReconciliationDispatcher`] runs a fixed number of workers that share a single unbounded job queue. Submitting a
//! job through a [`DispatcherHandle`] never blocks; if every worker is busy the job simply waits in the queue, so the
//! number of concurrent calls to the authority never exceeds the worker count.
//!
//! A job that finds the order still being processed by the authority is put back on the queue after a delay, up to a
//! configured number of attempts. A job that fails (network, timeout, authority or storage errors) is logged and
//! dropped.
mod dispatcher;
mod job;

pub use dispatcher::{DispatchError, DispatcherConfig, DispatcherHandle, DispatcherStats, ReconciliationDispatcher};
pub use job::{reconcile_order, ReconcileError, ReconcileJob};
