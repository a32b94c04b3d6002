//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Pool reaper: runs idle cleanup on a fixed interval, in addition to the
//!   cleanup performed on every release

mod reaper;

pub use reaper::spawn_reaper_task;
