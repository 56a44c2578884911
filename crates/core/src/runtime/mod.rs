mod orchestrator;
mod shutdown;
pub mod worker;

pub use orchestrator::Orchestrator;
pub use shutdown::ShutdownGuard;
