pub mod audit;
pub mod build;
pub mod error;
pub mod log;

pub use audit::AuditEvent;
pub use build::BuildResult;
pub use error::{Error, Result};
pub use log::BuildLog;
