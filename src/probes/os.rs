use crate::snapshot::OsInfo;

/// Collapse the raw OS identifier into the coarse family tag support tooling
/// groups hosts by.
fn os_family(os: &str) -> &'static str {
    match os {
        "linux" | "android" => "linux",
        "macos" | "ios" => "macos",
        "windows" => "windows",
        "freebsd" | "netbsd" | "openbsd" | "dragonfly" => "bsd",
        _ => "unknown",
    }
}

// Both lookups resolve from compile-time platform constants, so no fallback
// is defined for either field.
pub(crate) fn probe_os() -> OsInfo {
    OsInfo {
        id: os_family(std::env::consts::OS).to_string(),
        platform: format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS),
    }
}
