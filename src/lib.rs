//! Cached, plugin-extensible host environment detection for diagnostics and
//! support logs.
//!
//! [`EnvironmentDetector`] lazily computes one [`EnvironmentSnapshot`] — OS
//! identity, toolchain, hardware and plugin-contributed facts — caches it
//! for the process lifetime and hands out independent copies. Failure
//! domains are isolated: a single probe lookup or plugin call failing
//! degrades its own fields to `unknown` without affecting the rest of the
//! pass, and no failure is ever surfaced to the caller as an error.
//!
//! ```no_run
//! use envsnap::EnvironmentDetector;
//!
//! let detector = EnvironmentDetector::new(Vec::new());
//! let env = detector.environment();
//! detector.log_detected_environment(None);
//! # let _ = env;
//! ```

mod detector;
mod plugin;
pub mod probes;
mod report;
mod snapshot;

pub use detector::EnvironmentDetector;
pub use plugin::{Capabilities, EnvironmentPlugin};
pub use report::{render_report, write_report, RenderError};
pub use snapshot::{Detected, EnvironmentSnapshot, HardwareInfo, OsInfo, RuntimeInfo};
