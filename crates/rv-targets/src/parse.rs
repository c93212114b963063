//! Loading, serialization, and validation of spec files.

use std::fmt;
use std::path::Path;

use crate::error::{Result, TargetError};
use crate::spec::TargetSpec;

/// How serious a validation finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// A validation finding in a target specification.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub message: String,
}

/// Load a target spec from a JSON file.
pub fn load_spec(path: &Path) -> Result<TargetSpec> {
    if !path.exists() {
        return Err(TargetError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_spec(&content)
}

/// Parse a target spec from a JSON string.
pub fn parse_spec(json: &str) -> Result<TargetSpec> {
    let spec: TargetSpec = serde_json::from_str(json)?;
    Ok(spec)
}

/// Serialize a target spec to pretty JSON.
pub fn spec_to_json(spec: &TargetSpec) -> Result<String> {
    let json = serde_json::to_string_pretty(spec)?;
    Ok(json)
}

/// Validate a target specification for internal consistency.
pub fn validate(spec: &TargetSpec) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    // 1. Pointer width must match the architecture's word size.
    let expected_width = match spec.arch.as_str() {
        "riscv32" => Some("32"),
        "riscv64" => Some("64"),
        _ => None,
    };
    match expected_width {
        Some(width) if spec.target_pointer_width != width => issues.push(ValidationIssue {
            severity: Severity::Error,
            message: format!(
                "target-pointer-width \"{}\" does not match arch \"{}\" (expected \"{}\")",
                spec.target_pointer_width, spec.arch, width
            ),
        }),
        None => issues.push(ValidationIssue {
            severity: Severity::Error,
            message: format!("unsupported arch \"{}\"", spec.arch),
        }),
        _ => {}
    }

    // 2. RISC-V is little-endian.
    if spec.arch.starts_with("riscv") && spec.target_endian != "little" {
        issues.push(ValidationIssue {
            severity: Severity::Error,
            message: format!(
                "target-endian \"{}\" is invalid for {}",
                spec.target_endian, spec.arch
            ),
        });
    }

    // 3. Feature string syntax: comma-separated, each item +x or -x.
    for item in spec.features.split(',').filter(|s| !s.is_empty()) {
        if !(item.starts_with('+') || item.starts_with('-')) || item.len() < 2 {
            issues.push(ValidationIssue {
                severity: Severity::Error,
                message: format!("malformed feature \"{item}\" (expected \"+ext\" or \"-ext\")"),
            });
        }
    }

    // 4. Atomics wider than the register size need the A extension and
    //    cannot exceed the word size on rv32.
    if let Some(width) = spec.max_atomic_width {
        if width > 0 && !spec.has_feature('a') {
            issues.push(ValidationIssue {
                severity: Severity::Warning,
                message: format!(
                    "max-atomic-width is {width} but the feature string does not enable +a"
                ),
            });
        }
        if spec.arch == "riscv32" && width > 32 {
            issues.push(ValidationIssue {
                severity: Severity::Error,
                message: format!("max-atomic-width {width} exceeds the rv32 word size"),
            });
        }
    }

    // 5. A configured cross linker must carry the spec's own triple. A
    //    toolchain installed under a different triple (riscv32gc vs
    //    riscv32imac, say) means the linker override is looked up under a
    //    key that never matches, and the build falls back to the default
    //    linker without saying so.
    if let Some(linker) = &spec.linker {
        if let Some(linker_triple) = linker_triple(linker) {
            if linker_triple != spec.llvm_target {
                issues.push(ValidationIssue {
                    severity: Severity::Warning,
                    message: format!(
                        "linker \"{linker}\" is built for triple \"{linker_triple}\" but the \
                         spec's triple is \"{}\"; the override may silently not apply",
                        spec.llvm_target
                    ),
                });
            }
        }
    }

    issues
}

/// Extract the triple prefix from a cross tool's executable name, e.g.
/// `riscv32gc-unknown-linux-gnu-gcc` -> `riscv32gc-unknown-linux-gnu`.
fn linker_triple(linker: &str) -> Option<&str> {
    let name = Path::new(linker).file_name()?.to_str()?;
    for suffix in ["-gcc", "-g++", "-cc", "-clang", "-ld"] {
        if let Some(triple) = name.strip_suffix(suffix) {
            // A triple has at least arch-vendor-os components.
            if triple.matches('-').count() >= 2 {
                return Some(triple);
            }
        }
    }
    None
}
