use std::io::{self, Write};
use thiserror::Error;

use crate::snapshot::EnvironmentSnapshot;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to serialize environment snapshot: {0}")]
    Serialize(#[from] serde_yaml::Error),
    #[error("failed to write environment report: {0}")]
    Write(#[from] io::Error),
}

/// Render the snapshot as the multi-line support-log block: a one-line
/// summary followed by the YAML dump of the full record, every detail line
/// prefixed with `|  `. Degraded snapshots render with `unknown`
/// placeholders instead of failing.
pub fn render_report(snapshot: &EnvironmentSnapshot) -> Result<String, RenderError> {
    let dumped = serde_yaml::to_string(snapshot)?;
    let details = dumped
        .trim()
        .lines()
        .map(|line| format!("|  {line}"))
        .collect::<Vec<_>>()
        .join("\n");

    let toolchain = snapshot
        .runtime
        .as_ref()
        .map(|runtime| runtime.version.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let (family, platform) = snapshot
        .os
        .as_ref()
        .map(|os| (title_case(&os.id), os.platform.clone()))
        .unwrap_or_else(|| ("Unknown".to_string(), "unknown".to_string()));

    Ok(format!(
        "Detected environment is {toolchain} under {family} ({platform}). Details:\n{details}"
    ))
}

/// Render the snapshot into `writer`, e.g. a support bundle file.
pub fn write_report(
    snapshot: &EnvironmentSnapshot,
    writer: &mut dyn Write,
) -> Result<(), RenderError> {
    let block = render_report(snapshot)?;
    writeln!(writer, "{block}")?;
    Ok(())
}

fn title_case(tag: &str) -> String {
    let mut chars = tag.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
