//! Per-object conversion: one select request, optionally written back to storage.
//!
//! Split into focused submodules:
//! - [`task`] - Task lifecycle, cancellation handle and result reporting
//! - [`select`] - Size-bounded collection of streamed select output
//! - [`template`] - Destination key rendering

mod select;
mod task;
mod template;


pub use task::{ConversionTask, TaskHandle};
pub use template::{DEFAULT_NAME_FORMAT, render_destination_key};
