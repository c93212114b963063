//! `rvrun target` — emit and validate target specification files.

use std::path::Path;

use anyhow::{Context, Result};

use rv_targets::{load_spec, spec_to_json, Severity, TargetSpec};

/// Print the built-in spec as JSON, to stdout or a file.
pub fn print(output: Option<&Path>) -> Result<()> {
    let spec = TargetSpec::riscv32imac_unknown_linux_gnu();
    let json = spec_to_json(&spec)?;
    match output {
        Some(path) => std::fs::write(path, json.as_bytes())
            .with_context(|| format!("writing {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

/// Validate a spec file. Returns a process exit code: nonzero when any
/// finding is an error.
pub fn validate(path: &Path) -> Result<i32> {
    let spec = load_spec(path).with_context(|| format!("loading {}", path.display()))?;
    let issues = rv_targets::validate(&spec);

    if issues.is_empty() {
        println!("{}: ok", path.display());
        return Ok(0);
    }
    let mut errors = 0;
    for issue in &issues {
        println!("{}: {}", issue.severity, issue.message);
        if issue.severity == Severity::Error {
            errors += 1;
        }
    }
    Ok(if errors > 0 { 1 } else { 0 })
}
