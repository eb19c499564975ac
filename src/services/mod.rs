//! Application services: the sink supervisor, its job wrapper, the job
//! lifecycle manager and the readiness probe.

pub mod job_lifecycle;
pub mod readiness;
pub mod sink_job;
pub mod sink_supervisor;

pub use job_lifecycle::JobLifecycleManager;
pub use readiness::{parse_drift, MetricsReadinessProbe};
pub use sink_job::{sink_job_factory, SinkJob};
pub use sink_supervisor::{LoopExit, PreparedRun, RunSummary, SinkSupervisor};
