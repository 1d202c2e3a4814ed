//! Boundaries to the host: filesystem layout, source control, processes.

pub mod fs;
pub mod git;
pub mod process;
