pub mod classifier;
pub mod config;
pub mod error;
pub mod project;
pub mod scheduler;
pub mod shutdown;
pub mod storage;
pub mod validation;
pub mod workspace;

pub use error::{Result, SpiceError};
pub use workspace::{ProjectHandle, Workspace};
