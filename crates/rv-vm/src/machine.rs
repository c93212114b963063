//! The machine: one hart, an address space, and a kernel personality.

use crate::error::MachineError;
use crate::hart::Hart;
use crate::loader::{self, LoadedImage};
use crate::memory::Memory;

/// Outcome of retiring one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    Continue,
    /// The guest asked to terminate with this exit code.
    Exit(i32),
}

/// The seam between the hart and whatever plays the operating system.
///
/// `ecall` and `ebreak` trap here. The Linux personality lives in
/// [`crate::linux`]; tests use scripted kernels.
pub trait Kernel {
    type Error: std::error::Error + Send + Sync + 'static;

    fn syscall(&mut self, hart: &mut Hart, mem: &mut Memory) -> Result<StepResult, Self::Error>;

    fn ebreak(&mut self, hart: &mut Hart, mem: &mut Memory) -> Result<StepResult, Self::Error>;
}

/// A single-hart guest machine.
pub struct Machine<K> {
    pub hart: Hart,
    pub mem: Memory,
    pub kernel: K,
}

impl<K: Kernel> Machine<K> {
    pub fn new(kernel: K) -> Self {
        Machine {
            hart: Hart::new(),
            mem: Memory::new(),
            kernel,
        }
    }

    /// Load a statically linked guest executable and point the hart at
    /// its entry. The kernel is not told about the image; callers that
    /// need that (the Linux personality does, for `brk`) attach it
    /// themselves.
    pub fn load_elf(
        &mut self,
        bytes: &[u8],
        args: &[String],
        envs: &[String],
    ) -> Result<LoadedImage, MachineError<K::Error>> {
        let image = loader::load(&mut self.mem, bytes, args, envs)?;
        self.hart.pc = image.entry;
        self.hart.set(rv_inst::Reg::Sp, image.sp);
        Ok(image)
    }

    /// Retire one instruction.
    pub fn step(&mut self) -> Result<StepResult, MachineError<K::Error>> {
        self.hart.step(&mut self.mem, &mut self.kernel)
    }

    /// Run until the guest exits; returns its exit code.
    pub fn run(&mut self) -> Result<i32, MachineError<K::Error>> {
        loop {
            if let StepResult::Exit(code) = self.step()? {
                tracing::debug!(
                    instructions = self.hart.inst_count,
                    code,
                    "guest exited"
                );
                return Ok(code);
            }
        }
    }
}
