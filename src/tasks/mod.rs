//! Background Tasks Module
//!
//! Contains background tasks that run periodically while a client is alive.
//!
//! # Tasks
//! - TTL Sweep: Removes expired cache entries at a fixed interval

mod sweep;

pub use sweep::{spawn_sweep_task, SweepHandle};
