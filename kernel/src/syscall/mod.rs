//! System call surface.
//!
//! Ten calls, numbered 1..10, raised with `INT 0x80`: the number in EAX
//! and up to three arguments in EBX, ECX, EDX. The dispatcher reads the
//! saved register frame, and its return value is written back into the
//! frame's EAX slot for the IRET. Every failure is the architectural -1.

use crate::error::KernelError;

/// The ten calls a user program may raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Syscall {
    Halt = 1,
    Execute = 2,
    Read = 3,
    Write = 4,
    Open = 5,
    Close = 6,
    Getargs = 7,
    Vidmap = 8,
    SetHandler = 9,
    Sigreturn = 10,
}

impl TryFrom<u32> for Syscall {
    type Error = KernelError;

    fn try_from(number: u32) -> Result<Self, KernelError> {
        match number {
            1 => Ok(Syscall::Halt),
            2 => Ok(Syscall::Execute),
            3 => Ok(Syscall::Read),
            4 => Ok(Syscall::Write),
            5 => Ok(Syscall::Open),
            6 => Ok(Syscall::Close),
            7 => Ok(Syscall::Getargs),
            8 => Ok(Syscall::Vidmap),
            9 => Ok(Syscall::SetHandler),
            10 => Ok(Syscall::Sigreturn),
            _ => Err(KernelError::Unsupported),
        }
    }
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod imp {
    use super::*;
    use crate::arch::x86::interrupts::InterruptFrame;
    use crate::fs::file::{self, FILE_ARRAY_SIZE};
    use crate::mm::{USER_IMAGE_BASE, USER_IMAGE_TOP};
    use crate::process::{self, MAX_COMMAND_LENGTH};

    /// Entry from the trampoline for vector 0x80. The result lands in the
    /// caller's EAX.
    pub fn dispatch(frame: &mut InterruptFrame) -> i32 {
        let number = frame.eax;
        let (a, b, c) = (frame.ebx, frame.ecx, frame.edx);
        let result = match Syscall::try_from(number) {
            Ok(call) => handle(call, a, b, c),
            Err(err) => {
                log::debug!("syscall: bad number {}", number);
                Err(err)
            }
        };
        match result {
            Ok(value) => value,
            Err(err) => {
                log::debug!("syscall {} failed: {}", number, err);
                err.as_syscall_result()
            }
        }
    }

    fn handle(call: Syscall, a: u32, b: u32, c: u32) -> Result<i32, KernelError> {
        match call {
            Syscall::Halt => sys_halt(a as u8),
            Syscall::Execute => sys_execute(a),
            Syscall::Read => sys_read(a, b, c),
            Syscall::Write => sys_write(a, b, c),
            Syscall::Open => sys_open(a),
            Syscall::Close => sys_close(a),
            Syscall::Getargs => sys_getargs(a, b),
            Syscall::Vidmap => sys_vidmap(a),
            Syscall::SetHandler | Syscall::Sigreturn => Err(KernelError::Unsupported),
        }
    }

    fn sys_halt(status: u8) -> Result<i32, KernelError> {
        // SAFETY: reading context only.
        if unsafe { process::current_pcb() }.is_none() {
            return Err(KernelError::NoCurrentTask);
        }
        // SAFETY: a current task exists; halt does not return.
        unsafe { process::halt(status) }
    }

    fn sys_execute(command_ptr: u32) -> Result<i32, KernelError> {
        if command_ptr == 0 {
            return Err(KernelError::InvalidAddress);
        }
        // Copy the NUL-terminated command out of user memory before the
        // address space changes under it.
        let mut command = [0u8; MAX_COMMAND_LENGTH];
        let mut len = 0usize;
        while len < MAX_COMMAND_LENGTH {
            // SAFETY: byte reads inside the caller's mapped range; a wild
            // pointer faults in the caller's own address space.
            let byte = unsafe { core::ptr::read((command_ptr as usize + len) as *const u8) };
            if byte == 0 {
                break;
            }
            command[len] = byte;
            len += 1;
        }
        // SAFETY: execute may block for the child's lifetime, which is the
        // contract of this call.
        let status = unsafe { process::execute(&command[..len]) }?;
        Ok(status as i32)
    }

    fn user_slice_mut(ptr: u32, len: u32) -> Result<&'static mut [u8], KernelError> {
        if ptr == 0 {
            return Err(KernelError::InvalidAddress);
        }
        // SAFETY: the slice aliases user memory for the duration of one
        // call; the driver only moves bytes through it.
        Ok(unsafe { core::slice::from_raw_parts_mut(ptr as *mut u8, len as usize) })
    }

    fn sys_read(fd: u32, buf: u32, nbytes: u32) -> Result<i32, KernelError> {
        if fd as usize >= FILE_ARRAY_SIZE {
            return Err(KernelError::InvalidDescriptor);
        }
        let buf = user_slice_mut(buf, nbytes)?;
        // Drivers may block on their IRQ; let it be delivered.
        // SAFETY: task context; the read path tolerates interrupts.
        unsafe { crate::arch::enable_interrupts() };
        let n = file::with_current_table(|table| table.read(fd as usize, buf))?;
        Ok(n as i32)
    }

    fn sys_write(fd: u32, buf: u32, nbytes: u32) -> Result<i32, KernelError> {
        if fd as usize >= FILE_ARRAY_SIZE {
            return Err(KernelError::InvalidDescriptor);
        }
        let buf = user_slice_mut(buf, nbytes)?;
        let n = file::with_current_table(|table| table.write(fd as usize, buf))?;
        Ok(n as i32)
    }

    fn sys_open(filename_ptr: u32) -> Result<i32, KernelError> {
        if filename_ptr == 0 {
            return Err(KernelError::InvalidFileName);
        }
        let mut name = [0u8; crate::fs::MAX_FNAME_LEN + 1];
        let mut len = 0usize;
        while len < name.len() {
            // SAFETY: as in sys_execute.
            let byte = unsafe { core::ptr::read((filename_ptr as usize + len) as *const u8) };
            if byte == 0 {
                break;
            }
            name[len] = byte;
            len += 1;
        }
        let fd = file::with_current_table(|table| table.open(&name[..len]))?;
        Ok(fd as i32)
    }

    fn sys_close(fd: u32) -> Result<i32, KernelError> {
        if fd as usize >= FILE_ARRAY_SIZE {
            return Err(KernelError::InvalidDescriptor);
        }
        file::with_current_table(|table| table.close(fd as usize))?;
        Ok(0)
    }

    fn sys_getargs(buf: u32, nbytes: u32) -> Result<i32, KernelError> {
        // SAFETY: reading the calling task's PCB.
        let pcb = unsafe { process::current_pcb() }.ok_or(KernelError::NoCurrentTask)?;
        let args_len = pcb.args_len as usize;
        if args_len == 0 {
            return Err(KernelError::NoArguments);
        }
        if args_len + 1 > nbytes as usize {
            return Err(KernelError::BufferTooSmall);
        }
        let out = user_slice_mut(buf, nbytes)?;
        out[..args_len].copy_from_slice(&pcb.args[..args_len]);
        out[args_len] = 0;
        Ok(0)
    }

    fn sys_vidmap(screen_start: u32) -> Result<i32, KernelError> {
        let ptr = screen_start as usize;
        if ptr < USER_IMAGE_BASE || ptr + core::mem::size_of::<u32>() > USER_IMAGE_TOP {
            return Err(KernelError::InvalidAddress);
        }
        // SAFETY: reading the calling task's PCB.
        let pcb = unsafe { process::current_pcb() }.ok_or(KernelError::NoCurrentTask)?;
        // SAFETY: the current task asked for the mapping in its own space.
        let vaddr = unsafe { crate::mm::video::vidmap_install(pcb.pid) };
        // SAFETY: the pointer was range checked against the user page.
        unsafe { core::ptr::write(ptr as *mut u32, vaddr) };
        Ok(0)
    }
}

#[cfg(not(all(target_arch = "x86", target_os = "none")))]
mod imp {
    use crate::arch::x86::interrupts::InterruptFrame;

    pub fn dispatch(_frame: &mut InterruptFrame) -> i32 {
        -1
    }
}

pub use imp::dispatch;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_map_onto_the_call_set() {
        assert_eq!(Syscall::try_from(1), Ok(Syscall::Halt));
        assert_eq!(Syscall::try_from(2), Ok(Syscall::Execute));
        assert_eq!(Syscall::try_from(8), Ok(Syscall::Vidmap));
        assert_eq!(Syscall::try_from(10), Ok(Syscall::Sigreturn));
    }

    #[test]
    fn out_of_range_numbers_are_rejected() {
        for number in [0u32, 11, 128, u32::MAX] {
            assert!(Syscall::try_from(number).is_err());
        }
    }

    #[test]
    fn the_call_set_is_closed_at_ten() {
        let valid = (0..=255u32).filter(|&n| Syscall::try_from(n).is_ok()).count();
        assert_eq!(valid, 10);
    }
}
