//! RV32IMAC instruction model and decoder.
//!
//! Covers the instruction set a `riscv32imac` Linux toolchain emits for
//! user-mode code: the RV32I base, the M (multiply/divide), A (atomics),
//! and C (compressed) extensions, plus the Zicsr register ops. Compressed
//! instructions decode into the same [`Op`] variants as their full-width
//! expansions, so an interpreter only has to execute the base forms.

pub mod csr;
pub mod decode;
pub mod op;
pub mod reg;

mod rvc;

pub use csr::Csr;
pub use decode::{decode, Decoded};
pub use op::Op;
pub use reg::Reg;
