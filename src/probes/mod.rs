pub mod hardware;
mod os;
mod runtime;

use crate::snapshot::{HardwareInfo, OsInfo, RuntimeInfo};
use hardware::SysinfoSource;

/// The three built-in detection categories. The detector drives whichever
/// implementation it was constructed with; tests substitute failing or
/// counting probe sets.
pub trait Probes: Send {
    fn os(&mut self) -> OsInfo;
    fn runtime(&mut self) -> RuntimeInfo;
    fn hardware(&mut self) -> HardwareInfo;
}

/// Production probe set: platform constants, toolchain queries and a shared
/// `sysinfo` handle for hardware lookups.
pub struct BuiltinProbes {
    hardware: SysinfoSource,
}

impl BuiltinProbes {
    pub fn new() -> Self {
        Self {
            hardware: SysinfoSource::new(),
        }
    }
}

impl Default for BuiltinProbes {
    fn default() -> Self {
        Self::new()
    }
}

impl Probes for BuiltinProbes {
    fn os(&mut self) -> OsInfo {
        os::probe_os()
    }

    fn runtime(&mut self) -> RuntimeInfo {
        runtime::probe_runtime()
    }

    fn hardware(&mut self) -> HardwareInfo {
        hardware::probe_hardware(&mut self.hardware)
    }
}
