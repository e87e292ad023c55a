#![forbid(unsafe_code)]

pub mod app_services;
pub mod code_check;
pub mod error;
pub mod execution;
pub mod persist;
pub mod progress_ledger;
pub mod session_timer;

pub use app_services::AppServices;
pub use code_check::{CheckOutcome, CheckReport, CodeCheckService};
pub use error::AppServicesError;
pub use execution::{
    BackendRegistry, ExecutionBackend, NativeInterpreter, SandboxConfig, SimulatedBackend,
};
pub use persist::PersistQueue;
pub use progress_ledger::ProgressLedger;
pub use session_timer::SessionTimer;
