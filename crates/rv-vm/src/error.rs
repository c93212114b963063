//! Error types for the emulator.

use crate::loader::LoaderError;

/// What the guest was doing when a memory fault occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryAccess {
    Load,
    Store,
    Fetch,
}

impl std::fmt::Display for MemoryAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryAccess::Load => f.write_str("load"),
            MemoryAccess::Store => f.write_str("store"),
            MemoryAccess::Fetch => f.write_str("fetch"),
        }
    }
}

/// Guest memory faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    /// Access touched an address with no mapping, the guest equivalent
    /// of a segmentation fault.
    #[error("{access} fault at unmapped address 0x{addr:08x}")]
    Unmapped { access: MemoryAccess, addr: u32 },

    /// Atomic access to an address that is not 4-byte aligned.
    #[error("misaligned atomic {access} at 0x{addr:08x}")]
    MisalignedAtomic { access: MemoryAccess, addr: u32 },

    /// A guest C string ran past the allowed bound without a terminator.
    #[error("unterminated string at 0x{addr:08x} (searched {max} bytes)")]
    StringOverrun { addr: u32, max: u32 },
}

/// Faults raised by the hart itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HartError {
    /// The fetched bits are not a valid RV32IMAC encoding.
    #[error("illegal instruction 0x{raw:08x} at 0x{addr:08x}")]
    IllegalInstruction { addr: u32, raw: u32 },
}

/// Top-level error for driving a machine with kernel `E`.
#[derive(Debug, thiserror::Error)]
pub enum MachineError<E: std::error::Error + 'static> {
    #[error(transparent)]
    Hart(#[from] HartError),

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error("kernel: {0}")]
    Kernel(#[source] E),
}
