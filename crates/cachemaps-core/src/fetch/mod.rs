//! Background execution of tile downloads.
//!
//! All downloads go through one `TileFetchScheduler` worker so the app never
//! has more than one static map request in flight. Callers that must have
//! the maps before continuing bypass the queue with `run_inline`.

pub mod scheduler;

pub use scheduler::{SchedulerState, TileFetchScheduler, TileJob, DEFAULT_QUEUE_CAPACITY};
