use colored::Colorize;
use miette::Result;

use crate::error;
use crate::machine::{Fault, Machine, DEFAULT_MEMORY_SIZE};
use crate::program::Program;
use crate::symbol::Op;

/// Owns a built [`Program`] and the [`Machine`] it executes against.
#[derive(Debug)]
pub struct RunState {
    prog: Program,
    mach: Machine,
}

impl RunState {
    pub fn new(prog: Program) -> RunState {
        Self::with_memory(prog, DEFAULT_MEMORY_SIZE)
    }

    pub fn with_memory(prog: Program, mem_size: usize) -> RunState {
        RunState {
            prog,
            mach: Machine::new(mem_size),
        }
    }

    pub fn machine(&self) -> &Machine {
        &self.mach
    }

    /// Interpreter loop: execute from the program's entry point until the
    /// terminal sentinel.
    ///
    /// `eip` is incremented once per step *after* the step returns, so every
    /// control transfer inside [`step`](Self::step) stores `target - 1`.
    pub fn run(&mut self) -> Result<()> {
        self.mach.set_eip(self.prog.start() as i32);
        loop {
            let eip = self.mach.eip();
            let index = usize::try_from(eip)
                .ok()
                .filter(|ix| *ix < self.prog.len())
                .ok_or_else(|| error::runtime_lost_eip(eip))?;

            if self.prog.op(index) == Op::Halt {
                return Ok(());
            }
            if let Err(fault) = self.step(index) {
                let near = self.prog.enclosing_label(index);
                return Err(error::runtime_fault(fault, eip, near));
            }
            self.mach.set_eip(self.mach.eip().wrapping_add(1));
        }
    }

    /// Execute the single instruction at `index`, mutating machine state.
    fn step(&mut self, index: usize) -> Result<(), Fault> {
        let Self { prog, mach } = self;
        let args = prog.args(index);

        match prog.op(index) {
            Op::Halt | Op::Nop => {}
            // Reserved; executes as a no-op. Programs relying on it get no
            // compatibility promise.
            Op::Int => {
                eprintln!(
                    "{:>12} 'int' is reserved and was ignored",
                    "Warning".yellow().bold()
                );
            }
            Op::Mov => {
                let value = mach.fetch(&args[1])?;
                mach.store(&args[0], value)?;
            }
            Op::Push => {
                let value = mach.fetch(&args[0])?;
                mach.push(value)?;
            }
            Op::Pop => {
                let value = mach.pop()?;
                mach.store(&args[0], value)?;
            }
            Op::Pushf => mach.push(mach.flags)?,
            // Restores FLAGS from the stack top; the decoded operand is
            // ignored so that conditional jumps observe the popped value
            Op::Popf => mach.flags = mach.pop()?,
            Op::Inc => {
                let value = mach.fetch(&args[0])?.wrapping_add(1);
                mach.store(&args[0], value)?;
            }
            Op::Dec => {
                let value = mach.fetch(&args[0])?.wrapping_sub(1);
                mach.store(&args[0], value)?;
            }
            Op::Add => {
                let value = mach.fetch(&args[0])?.wrapping_add(mach.fetch(&args[1])?);
                mach.store(&args[0], value)?;
            }
            Op::Sub => {
                let value = mach.fetch(&args[0])?.wrapping_sub(mach.fetch(&args[1])?);
                mach.store(&args[0], value)?;
            }
            Op::Mul => {
                let value = mach.fetch(&args[0])?.wrapping_mul(mach.fetch(&args[1])?);
                mach.store(&args[0], value)?;
            }
            Op::Div => {
                let divisor = mach.fetch(&args[1])?;
                if divisor == 0 {
                    return Err(Fault::DivideByZero);
                }
                let value = mach.fetch(&args[0])?.wrapping_div(divisor);
                mach.store(&args[0], value)?;
            }
            // Leaves the first operand untouched; `rem` reads the result
            Op::Mod => {
                let divisor = mach.fetch(&args[1])?;
                if divisor == 0 {
                    return Err(Fault::DivideByZero);
                }
                mach.remainder = mach.fetch(&args[0])?.wrapping_rem(divisor);
            }
            Op::Rem => mach.store(&args[0], mach.remainder)?,
            Op::Not => {
                let value = !mach.fetch(&args[0])?;
                mach.store(&args[0], value)?;
            }
            Op::Xor => {
                let value = mach.fetch(&args[0])? ^ mach.fetch(&args[1])?;
                mach.store(&args[0], value)?;
            }
            Op::Or => {
                let value = mach.fetch(&args[0])? | mach.fetch(&args[1])?;
                mach.store(&args[0], value)?;
            }
            Op::And => {
                let value = mach.fetch(&args[0])? & mach.fetch(&args[1])?;
                mach.store(&args[0], value)?;
            }
            Op::Shl => {
                let value = mach
                    .fetch(&args[0])?
                    .wrapping_shl(mach.fetch(&args[1])? as u32);
                mach.store(&args[0], value)?;
            }
            // Logical shift; the count is masked to 0..=31
            Op::Shr => {
                let value = (mach.fetch(&args[0])? as u32)
                    .wrapping_shr(mach.fetch(&args[1])? as u32) as i32;
                mach.store(&args[0], value)?;
            }
            // Exactly one of equal, greater, or neither holds, so bits 0 and
            // 1 are never both set
            Op::Cmp => {
                let lhs = mach.fetch(&args[0])?;
                let rhs = mach.fetch(&args[1])?;
                mach.flags = (lhs == rhs) as i32 | ((lhs > rhs) as i32) << 1;
            }
            Op::Jmp => {
                let target = mach.fetch(&args[0])?;
                mach.set_eip(target.wrapping_sub(1));
            }
            // Push the return index, then the `jmp` effect in the same step
            Op::Call => {
                mach.push(mach.eip())?;
                let target = mach.fetch(&args[0])?;
                mach.set_eip(target.wrapping_sub(1));
            }
            // The post-increment advances past the call site
            Op::Ret => {
                let target = mach.pop()?;
                mach.set_eip(target);
            }
            Op::Je => {
                if mach.flags & 0x1 != 0 {
                    let target = mach.fetch(&args[0])?;
                    mach.set_eip(target.wrapping_sub(1));
                }
            }
            Op::Jne => {
                if mach.flags & 0x1 == 0 {
                    let target = mach.fetch(&args[0])?;
                    mach.set_eip(target.wrapping_sub(1));
                }
            }
            Op::Jg => {
                if mach.flags & 0x2 != 0 {
                    let target = mach.fetch(&args[0])?;
                    mach.set_eip(target.wrapping_sub(1));
                }
            }
            // `equal | greater` as a mask test; `cmp` never sets both bits
            Op::Jge => {
                if mach.flags & 0x3 != 0 {
                    let target = mach.fetch(&args[0])?;
                    mach.set_eip(target.wrapping_sub(1));
                }
            }
            Op::Jl => {
                if mach.flags & 0x3 == 0 {
                    let target = mach.fetch(&args[0])?;
                    mach.set_eip(target.wrapping_sub(1));
                }
            }
            Op::Jle => {
                if mach.flags & 0x2 == 0 {
                    let target = mach.fetch(&args[0])?;
                    mach.set_eip(target.wrapping_sub(1));
                }
            }
            Op::Prn => println!("{}", mach.fetch(&args[0])?),
        };

        Ok(())
    }
}
