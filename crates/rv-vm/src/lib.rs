//! User-mode RV32 emulation.
//!
//! Runs statically linked `riscv32imac` Linux executables on the host:
//! a sparse paged guest address space, a single-hart interpreter over
//! the [`rv_inst`] decoder, a static ELF loader that builds the Linux
//! process image (segments, stack, auxiliary vector), and a syscall
//! layer that services the guest's Linux ABI calls with host resources.
//!
//! The OS personality is a trait ([`machine::Kernel`]), so tests can run
//! guest code against scripted kernels and the Linux layer is just one
//! implementation.

pub mod error;
pub mod hart;
pub mod linux;
pub mod loader;
pub mod machine;
pub mod memory;

pub use error::{HartError, MachineError, MemoryAccess, MemoryError};
pub use hart::Hart;
pub use linux::{Linux, LinuxError};
pub use machine::{Kernel, Machine, StepResult};
pub use memory::Memory;
