//! Functionality shared between the mod package command line tools.

pub mod perf;
pub mod tool;
