//! Child process management: the generic executor and the sink binary on top of it.

pub mod executor;
pub mod sink_process;

pub use executor::{Completion, ProcessError, ProcessExecutor, ProcessOutcome, RunningProcess, TimeoutAction};
pub use sink_process::BinarySinkProcess;
