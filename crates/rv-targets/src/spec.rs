//! Target specification schema.

use serde::{Deserialize, Serialize};

/// A custom compilation target description.
///
/// Field names follow the compiler's JSON spec-file conventions
/// (kebab-case keys, `llvm-target` carrying the full triple). Optional
/// fields are omitted from serialized output when unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TargetSpec {
    /// Full target triple, e.g. `riscv32imac-unknown-linux-gnu`.
    pub llvm_target: String,
    /// Base architecture, e.g. `riscv32`.
    pub arch: String,
    /// Data layout / calling ABI, e.g. `ilp32`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abi: Option<String>,
    /// CPU model passed to the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    /// Comma-separated feature string, e.g. `+m,+a,+c`.
    #[serde(default)]
    pub features: String,
    /// Pointer width in bits, as the schema's string form.
    pub target_pointer_width: String,
    /// Byte order: `little` or `big`.
    pub target_endian: String,
    /// Code model, e.g. `medium` (medlow/medany on RISC-V).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_model: Option<String>,
    /// Operating system component of the triple.
    pub os: String,
    /// Environment/libc component of the triple.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    /// Linker executable overriding the default, usually a cross gcc.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linker: Option<String>,
    /// Linker flavor matching `linker`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linker_flavor: Option<String>,
    /// Widest lock-free atomic the target supports, in bits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_atomic_width: Option<u32>,
    /// Panic strategy: `unwind` or `abort`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub panic_strategy: Option<String>,
}

impl TargetSpec {
    /// The target this workspace is built around: RV32 with the M, A and
    /// C extensions, ilp32 soft-float ABI, Linux/glibc conventions, and a
    /// cross gcc doing the linking.
    pub fn riscv32imac_unknown_linux_gnu() -> Self {
        TargetSpec {
            llvm_target: "riscv32imac-unknown-linux-gnu".into(),
            arch: "riscv32".into(),
            abi: Some("ilp32".into()),
            cpu: Some("generic-rv32".into()),
            features: "+m,+a,+c".into(),
            target_pointer_width: "32".into(),
            target_endian: "little".into(),
            code_model: Some("medium".into()),
            os: "linux".into(),
            env: Some("gnu".into()),
            linker: Some("riscv32imac-unknown-linux-gnu-gcc".into()),
            linker_flavor: Some("gnu-cc".into()),
            max_atomic_width: Some(32),
            panic_strategy: Some("abort".into()),
        }
    }

    /// Triple implied by the spec's own components, for cross-checking
    /// against `llvm_target`.
    pub fn triple(&self) -> &str {
        &self.llvm_target
    }

    /// Whether the feature string enables a given extension letter.
    pub fn has_feature(&self, ext: char) -> bool {
        self.features
            .split(',')
            .any(|f| f.strip_prefix('+').map(str::chars).and_then(|mut c| c.next()) == Some(ext))
    }
}
