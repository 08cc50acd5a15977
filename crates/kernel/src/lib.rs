//! Shared building blocks for the readshelf services: layered settings, the
//! module lifecycle, and the clock every time-dependent component reads.

pub mod clock;
pub mod module;
pub mod registry;
pub mod settings;

pub use clock::{Clock, ManualClock, SystemClock};
pub use module::{InitCtx, Module};
pub use registry::ModuleRegistry;
