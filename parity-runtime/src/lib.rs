mod controller;
mod error;
mod pool;
mod registry;
mod unit;

pub use controller::{ReplayController, ReplayUpdate, SessionRegistry};
pub use error::RuntimeError;
pub use pool::{ExecutionUnit, WorkerPool};
pub use registry::CancellationRegistry;
pub use unit::{UNIT_THREAD_NAME, UnitHandle, spawn_unit};
