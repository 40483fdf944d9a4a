use std::process::Command;
use tracing::debug;

use crate::snapshot::{Detected, RuntimeInfo};

/// Toolchain facts: host compiler version, package-manager version, and the
/// isolation mechanism this process runs under, if any. Each lookup is
/// contained on its own; a failing one degrades only its field.
pub(crate) fn probe_runtime() -> RuntimeInfo {
    let container = detect_container();
    if let Some(mechanism) = &container {
        debug!(mechanism, "process runs inside an isolated environment");
    }

    RuntimeInfo {
        version: command_version("rustc").into(),
        cargo: command_version("cargo").into(),
        container,
    }
}

fn command_version(binary: &str) -> Option<String> {
    let output = Command::new(binary).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Name the isolation mechanism the process runs under, if one is
/// detectable. Checks the well-known container markers first, then cgroup
/// membership, then the WSL kernel signature.
#[cfg(unix)]
fn detect_container() -> Option<String> {
    if std::path::Path::new("/.dockerenv").exists() {
        return Some("docker".to_string());
    }
    if std::path::Path::new("/run/.containerenv").exists() {
        return Some("podman".to_string());
    }

    if let Ok(cgroup) = std::fs::read_to_string("/proc/1/cgroup") {
        if cgroup.contains("kubepods") {
            return Some("kubernetes".to_string());
        }
        if cgroup.contains("docker") {
            return Some("docker".to_string());
        }
        if cgroup.contains("lxc") {
            return Some("lxc".to_string());
        }
    }

    if let Ok(version) = std::fs::read_to_string("/proc/version") {
        let lower = version.to_lowercase();
        if lower.contains("microsoft") || lower.contains("wsl") {
            return Some("wsl".to_string());
        }
    }

    None
}

#[cfg(not(unix))]
fn detect_container() -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_yields_no_version() {
        assert_eq!(command_version("envsnap-no-such-binary"), None);
        assert_eq!(
            Detected::from(command_version("envsnap-no-such-binary")),
            Detected::Unknown
        );
    }

    #[test]
    fn probe_is_total() {
        // Whatever the host has installed, every field must resolve to a
        // known value or the explicit Unknown marker.
        let runtime = probe_runtime();
        if let Detected::Known(version) = &runtime.version {
            assert!(version.starts_with("rustc"));
        }
        if let Detected::Known(cargo) = &runtime.cargo {
            assert!(cargo.starts_with("cargo"));
        }
        if let Some(mechanism) = &runtime.container {
            assert!(!mechanism.is_empty());
        }
    }
}
