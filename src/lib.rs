pub mod assemble;
pub mod config;
pub mod end_time;
pub mod error;
pub mod execution;
pub mod program;
pub mod report;
pub mod source;
pub mod store;
