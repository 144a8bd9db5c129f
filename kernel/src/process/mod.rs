//! Process control: PCBs, the PID bitmap, program loading, and the
//! execute/halt pair.
//!
//! A task's PCB lives at the top of its 8 KiB kernel stack, placed by
//! address: PID `p`'s block sits at `8 MiB - (p+1) * 8 KiB`. Locating the
//! current PCB from kernel code is a bitmask on the stack pointer. PID 0
//! is the kernel pseudo-process and never has a PCB.

use core::sync::atomic::{AtomicU32, Ordering};

use spin::Mutex;

use crate::arch::x86::usermode::StackContext;
use crate::error::KernelError;
use crate::fs::file::FdTable;
use crate::mm::{KB, MB};

/// Process identifier. PID 0 is the kernel pseudo-process.
pub type Pid = u32;

/// Most tasks that can exist at once.
pub const MAX_TASKS: usize = 6;

/// The kernel pseudo-process.
pub const KERNEL_PID: Pid = 0;

/// Capacity of a task's argument buffer, terminator included.
pub const MAX_ARGS_LENGTH: usize = 128;

/// Longest command `execute` accepts: a 32-byte name, a separator, and
/// the argument buffer.
pub const MAX_COMMAND_LENGTH: usize = 32 + 1 + MAX_ARGS_LENGTH;

/// Bytes of executable header the loader inspects.
pub const EXE_HEADER_LEN: usize = 40;
/// Little-endian `0x7F 'E' 'L' 'F'`.
const EXE_MAGIC: u32 = 0x464C_457F;
/// Byte offset of the entry point within the header.
const EXE_ENTRY_OFFSET: usize = 24;

const KERNEL_STACK_SIZE: usize = 8 * KB;

/// Process control block. Lives at the top of the owning task's kernel
/// stack; everything the kernel knows about a task is reachable from here.
#[repr(C)]
pub struct Pcb {
    pub pid: Pid,
    pub parent_pid: Pid,
    /// Terminal this task belongs to.
    pub terminal: u32,
    /// 1 when the task last left the CPU through the scheduler, 0 when it
    /// is parked inside `execute`.
    pub from_scheduler: u32,
    /// Where `execute` was called from; restored on halt.
    pub parent_ctx: StackContext,
    /// Where the scheduler last parked this task.
    pub sched_ctx: StackContext,
    pub args: [u8; MAX_ARGS_LENGTH],
    pub args_len: u32,
    pub files: FdTable,
}

/// Base address of a PID's PCB (and so of its kernel stack region).
pub const fn pcb_address(pid: Pid) -> usize {
    8 * MB - (pid as usize + 1) * KERNEL_STACK_SIZE
}

/// Initial kernel stack pointer for a PID, just under the region top.
pub const fn kernel_stack_top(pid: Pid) -> usize {
    8 * MB - pid as usize * KERNEL_STACK_SIZE - 4
}

// --------------------------------------------------------------------------
// PID allocation
// --------------------------------------------------------------------------

/// Allocation bitmap over PIDs 1..=MAX_TASKS. Bit 0 is never set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PidBitmap(u16);

impl PidBitmap {
    pub const fn new() -> Self {
        Self(0)
    }

    pub const fn is_allocated(&self, pid: Pid) -> bool {
        self.0 & (1 << pid) != 0
    }

    /// Claim the lowest free PID.
    pub fn allocate(&mut self) -> Option<Pid> {
        for pid in 1..=MAX_TASKS as Pid {
            if !self.is_allocated(pid) {
                self.0 |= 1 << pid;
                return Some(pid);
            }
        }
        None
    }

    pub fn release(&mut self, pid: Pid) {
        self.0 &= !(1 << pid);
    }

    /// Round-robin successor: the next allocated PID strictly greater than
    /// `current`, wrapping to 1. Returns `current` itself only when it is
    /// the sole allocated PID.
    pub fn next_allocated_after(&self, current: Pid) -> Option<Pid> {
        if self.0 == 0 {
            return None;
        }
        let max = MAX_TASKS as Pid;
        let mut pid = current % max + 1;
        for _ in 0..MAX_TASKS {
            if self.is_allocated(pid) {
                return Some(pid);
            }
            pid = pid % max + 1;
        }
        None
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

static PIDS: Mutex<PidBitmap> = Mutex::new(PidBitmap::new());

/// Claim the lowest free PID. Interrupts are masked across the update.
pub fn allocate_pid() -> Result<Pid, KernelError> {
    crate::arch::without_interrupts(|| PIDS.lock().allocate()).ok_or(KernelError::TaskLimitReached)
}

/// Return a PID to the pool.
pub fn release_pid(pid: Pid) {
    crate::arch::without_interrupts(|| PIDS.lock().release(pid));
}

pub fn is_allocated(pid: Pid) -> bool {
    PIDS.lock().is_allocated(pid)
}

/// Snapshot of the allocation bitmap, for the scheduler's rotation.
pub fn pid_bitmap_snapshot() -> PidBitmap {
    *PIDS.lock()
}

/// PID owning the CPU right now; [`KERNEL_PID`] during boot.
static CURRENT_PID: AtomicU32 = AtomicU32::new(KERNEL_PID);

pub fn current_pid() -> Pid {
    CURRENT_PID.load(Ordering::Acquire)
}

pub(crate) fn set_current_pid(pid: Pid) {
    CURRENT_PID.store(pid, Ordering::Release);
}

// --------------------------------------------------------------------------
// Command parsing and the executable header
// --------------------------------------------------------------------------

/// A command split into its executable name and argument string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub name: [u8; 32],
    pub name_len: usize,
    pub args: [u8; MAX_ARGS_LENGTH],
    pub args_len: usize,
}

impl Command {
    pub fn name_bytes(&self) -> &[u8] {
        &self.name[..self.name_len]
    }

    pub fn args_bytes(&self) -> &[u8] {
        &self.args[..self.args_len]
    }
}

/// Split a command at its first space: name up to 32 bytes, arguments up
/// to the buffer size less the terminator. A longer name is truncated, as
/// the filesystem compares only 32 bytes anyway.
pub fn parse_command(command: &[u8]) -> Result<Command, KernelError> {
    let end = command
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(command.len());
    let command = &command[..end];
    if command.is_empty() {
        return Err(KernelError::InvalidFileName);
    }

    let split = command.iter().position(|&b| b == b' ');
    let (name_part, args_part) = match split {
        Some(i) => (&command[..i], &command[i + 1..]),
        None => (command, &command[..0]),
    };
    if name_part.is_empty() {
        return Err(KernelError::InvalidFileName);
    }

    let mut name = [0u8; 32];
    let name_len = name_part.len().min(32);
    name[..name_len].copy_from_slice(&name_part[..name_len]);

    let mut args = [0u8; MAX_ARGS_LENGTH];
    let args_len = args_part.len().min(MAX_ARGS_LENGTH - 1);
    args[..args_len].copy_from_slice(&args_part[..args_len]);

    Ok(Command {
        name,
        name_len,
        args,
        args_len,
    })
}

/// Validate an executable header and extract the entry point: the magic
/// word at offset 0, the entry EIP at offset 24.
pub fn parse_exec_header(header: &[u8]) -> Result<u32, KernelError> {
    if header.len() < EXE_HEADER_LEN {
        return Err(KernelError::NotExecutable);
    }
    let magic = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    if magic != EXE_MAGIC {
        return Err(KernelError::NotExecutable);
    }
    Ok(u32::from_le_bytes([
        header[EXE_ENTRY_OFFSET],
        header[EXE_ENTRY_OFFSET + 1],
        header[EXE_ENTRY_OFFSET + 2],
        header[EXE_ENTRY_OFFSET + 3],
    ]))
}

// --------------------------------------------------------------------------
// PCB access and task lifecycle (bare metal)
// --------------------------------------------------------------------------

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod imp {
    use super::*;
    use crate::arch::x86::{gdt, usermode};
    use crate::drivers::terminal;
    use crate::fs::file;
    use crate::mm::{paging, video, USER_LOAD_ADDR, USER_STACK_TOP};

    /// Raw PCB pointer for an allocated PID.
    ///
    /// # Safety
    /// `pid` must be in 1..=MAX_TASKS; aliasing is governed by the
    /// uniprocessor, interrupts-masked mutation discipline.
    pub unsafe fn pcb_mut(pid: Pid) -> &'static mut Pcb {
        debug_assert!(pid != KERNEL_PID && pid as usize <= MAX_TASKS);
        // SAFETY: the address is the PID's reserved block inside the
        // kernel 4 MiB page; the caller upholds exclusivity.
        unsafe { &mut *(pcb_address(pid) as *mut Pcb) }
    }

    /// The running task's PCB, recovered by masking the stack pointer into
    /// its 8 KiB kernel stack block. `None` while the kernel pseudo-process
    /// runs on the boot stack.
    ///
    /// # Safety
    /// Must be called on a task kernel stack or the boot stack, which is
    /// true for all kernel code in this system.
    pub unsafe fn current_pcb() -> Option<&'static mut Pcb> {
        if current_pid() == KERNEL_PID {
            return None;
        }
        let esp: u32;
        // SAFETY: reading ESP has no side effects.
        unsafe {
            core::arch::asm!("mov {}, esp", out(reg) esp, options(nomem, preserves_flags));
        }
        let base = (esp as usize) & !(KERNEL_STACK_SIZE - 1);
        // SAFETY: a nonzero current PID means this stack is a task kernel
        // stack whose base block is its PCB.
        Some(unsafe { &mut *(base as *mut Pcb) })
    }

    /// The current task's descriptor table, if a task is running.
    pub fn current_pcb_files() -> Option<&'static mut FdTable> {
        // SAFETY: kernel code runs on the stacks current_pcb expects.
        unsafe { current_pcb().map(|pcb| &mut pcb.files) }
    }

    /// Terminal the current context belongs to: the running task's, or the
    /// visible terminal for the kernel pseudo-process.
    pub fn current_terminal() -> usize {
        // SAFETY: as above.
        match unsafe { current_pcb() } {
            Some(pcb) => pcb.terminal as usize,
            None => terminal::visible_terminal(),
        }
    }

    /// Terminal an arbitrary allocated task belongs to.
    pub fn terminal_of(pid: Pid) -> usize {
        // SAFETY: callers only name allocated PIDs.
        unsafe { pcb_mut(pid).terminal as usize }
    }

    fn write_pcb(pid: Pid, parent: Pid, terminal: usize, command: &Command) {
        // SAFETY: the PID was just allocated; nothing else touches its
        // block until this task runs.
        let pcb = unsafe { pcb_mut(pid) };
        pcb.pid = pid;
        pcb.parent_pid = parent;
        pcb.terminal = terminal as u32;
        pcb.from_scheduler = 0;
        pcb.parent_ctx = StackContext::default();
        pcb.sched_ctx = StackContext::default();
        pcb.args = command.args;
        pcb.args_len = command.args_len as u32;
        pcb.files = FdTable::new_task_table();
    }

    struct LoadedProgram {
        fd: usize,
        entry: u32,
        length: u32,
    }

    /// Open and validate an executable through the caller's descriptor
    /// table, leaving the descriptor positioned at byte 0.
    fn open_executable(name: &[u8]) -> Result<LoadedProgram, KernelError> {
        file::with_current_table(|table| {
            let fd = table.open(name)?;
            let mut header = [0u8; EXE_HEADER_LEN];
            let result = (|| {
                let n = table.read(fd, &mut header)?;
                let entry = parse_exec_header(&header[..n])?;
                table.seek(fd, 0)?;
                let length = table.length(fd)?;
                if length as usize > crate::mm::USER_IMAGE_TOP - USER_LOAD_ADDR {
                    return Err(KernelError::ImageTooLarge);
                }
                Ok(LoadedProgram { fd, entry, length })
            })();
            if result.is_err() {
                let _ = table.close(fd);
            }
            result
        })
    }

    /// Copy the whole image into the (already mapped) user page and close
    /// the descriptor.
    fn load_image(program: &LoadedProgram) -> Result<(), KernelError> {
        file::with_current_table(|table| {
            // SAFETY: task_space_init mapped the 4 MiB user page covering
            // exactly this range before we were called.
            let dst = unsafe {
                core::slice::from_raw_parts_mut(
                    USER_LOAD_ADDR as *mut u8,
                    program.length as usize,
                )
            };
            let read = table.read(program.fd, dst)?;
            table.close(program.fd)?;
            if read != program.length as usize {
                return Err(KernelError::NotExecutable);
            }
            Ok(())
        })
    }

    /// Start a program and run it to completion. Returns the status byte
    /// its halt delivered (or 0 if it terminated without one).
    ///
    /// The caller's stack position is recorded in the child's PCB; control
    /// comes back here when the child halts.
    ///
    /// # Safety
    /// Must run in a context that may block for the child's whole
    /// lifetime: a task's system call, the boot path, or halt's base-shell
    /// respawn loop.
    pub unsafe fn execute(command: &[u8]) -> Result<u32, KernelError> {
        let command = parse_command(command)?;

        // Capture the caller's identity now: if the caller is a dying
        // base shell being respawned, the new PCB may overwrite its block.
        let (parent_candidate, term) = match unsafe { current_pcb() } {
            Some(pcb) => (pcb.pid, pcb.terminal as usize),
            None => (KERNEL_PID, terminal::visible_terminal()),
        };
        let caller_pid = current_pid();

        let program = open_executable(command.name_bytes())?;

        crate::arch::disable_interrupts();
        let new_pid = match allocate_pid() {
            Ok(pid) => pid,
            Err(err) => {
                file::with_current_table(|t| {
                    let _ = t.close(program.fd);
                });
                return Err(err);
            }
        };

        // The 128 MiB range must be present before the loader reads into
        // it; this also switches CR3 to the child's directory.
        // SAFETY: new_pid was just allocated.
        unsafe { paging::task_space_init(new_pid) };

        if let Err(err) = load_image(&program) {
            release_pid(new_pid);
            // SAFETY: the caller's directory is still fully formed.
            unsafe { paging::load_task_directory(caller_pid) };
            // SAFETY: re-enabling what this function disabled.
            unsafe { crate::arch::enable_interrupts() };
            return Err(err);
        }

        let is_base_shell =
            command.name_bytes() == b"shell" && terminal::base_shell(term).is_none();
        if is_base_shell {
            terminal::set_base_shell(term, Some(new_pid));
            terminal::clear_terminal(term);
        }
        terminal::set_active_pid(term, new_pid);

        let parent = if is_base_shell {
            // A base shell never returns to a real parent: halt respawns it.
            KERNEL_PID
        } else {
            parent_candidate
        };
        write_pcb(new_pid, parent, term, &command);

        // The caller is about to park inside execute.
        if let Some(pcb) = unsafe { current_pcb() } {
            if pcb.pid == caller_pid {
                pcb.from_scheduler = 0;
            }
        }

        log::debug!(
            "execute: pid {} parent {} terminal {} entry {:#x}",
            new_pid,
            parent,
            term,
            program.entry
        );

        gdt::set_kernel_stack(kernel_stack_top(new_pid) as u32);
        set_current_pid(new_pid);
        // SAFETY: new_pid's space is live and its terminal assignment is
        // recorded; steer its video page before it runs.
        unsafe { video::remap_video(None, new_pid) };

        // SAFETY: address space, TSS, and PCB are fully formed; the
        // linkage slot lives in the child's PCB as halt expects.
        let status = unsafe {
            usermode::enter_user(
                &mut pcb_mut(new_pid).parent_ctx,
                program.entry,
                USER_STACK_TOP as u32,
            )
        };

        // Halt already restored paging, TSS, and the current PID; it
        // arrives here with interrupts masked.
        // SAFETY: ends the critical section halt left us in.
        unsafe { crate::arch::enable_interrupts() };
        Ok(status)
    }

    /// Terminate the current task and resume its parent, delivering
    /// `status` through the execute linkage. A dying base shell is
    /// respawned in place instead.
    ///
    /// # Safety
    /// A current task must exist.
    pub unsafe fn halt(status: u8) -> ! {
        crate::arch::disable_interrupts();
        // SAFETY: the caller guarantees a running task.
        let pcb = unsafe { current_pcb() }.expect("halt: no current task");
        let pid = pcb.pid;
        let parent = pcb.parent_pid;
        let term = pcb.terminal as usize;

        pcb.files.release_all();
        release_pid(pid);
        log::debug!("halt: pid {} status {} parent {}", pid, status, parent);

        if terminal::base_shell(term) == Some(pid) {
            terminal::set_base_shell(term, None);
            terminal::set_active_pid(term, 0);
            log::info!("halt: base shell on terminal {} exited, respawning", term);
            // The PCB still names this pid/terminal, so execute inherits
            // the right terminal. Control re-enters the new shell's IRET
            // and never unwinds further.
            loop {
                if unsafe { execute(b"shell") }.is_err() {
                    log::error!("halt: cannot respawn shell on terminal {}", term);
                    crate::arch::halt_loop();
                }
            }
        }

        terminal::set_active_pid(term, parent);
        // SAFETY: the parent's directory and stack are intact; it parked
        // inside execute waiting for exactly this.
        unsafe {
            paging::load_task_directory(parent);
            if parent != KERNEL_PID {
                video::steer(parent);
            }
            paging::flush_tlb();
            gdt::set_kernel_stack(kernel_stack_top(parent) as u32);
            set_current_pid(parent);
            let ctx = pcb.parent_ctx;
            usermode::halt_return(ctx.esp, ctx.ebp, status as u32)
        }
    }

    /// Create a base shell for a terminal without running it: the task is
    /// parked on an artificial first-run frame and becomes runnable by the
    /// ordinary scheduler switch. Used for terminals 1 and 2 at boot and
    /// for Alt+Fn switches to a dead terminal.
    ///
    /// # Safety
    /// Interrupt side effects aside, the caller's address space is
    /// restored before returning.
    pub unsafe fn spawn_parked_shell(term: usize) -> Result<Pid, KernelError> {
        let caller_pid = current_pid();
        let program = open_executable(b"shell")?;
        let command = parse_command(b"shell")?;

        crate::arch::disable_interrupts();
        let new_pid = match allocate_pid() {
            Ok(pid) => pid,
            Err(err) => {
                file::with_current_table(|t| {
                    let _ = t.close(program.fd);
                });
                return Err(err);
            }
        };

        // SAFETY: fresh PID; switches CR3 to the new space for the load.
        unsafe { paging::task_space_init(new_pid) };
        let result = load_image(&program);
        if let Err(err) = result {
            release_pid(new_pid);
            // SAFETY: caller's directory untouched.
            unsafe { paging::load_task_directory(caller_pid) };
            return Err(err);
        }

        write_pcb(new_pid, KERNEL_PID, term, &command);
        // SAFETY: the PID's kernel stack block is unused beyond the PCB.
        let pcb = unsafe { pcb_mut(new_pid) };
        pcb.from_scheduler = 1;
        pcb.sched_ctx = unsafe {
            usermode::build_first_run_stack(kernel_stack_top(new_pid) as u32, program.entry)
        };

        terminal::set_base_shell(term, Some(new_pid));
        terminal::set_active_pid(term, new_pid);
        terminal::clear_terminal(term);
        // SAFETY: steer against the new task's terminal, then come home.
        unsafe {
            video::steer(new_pid);
            paging::load_task_directory(caller_pid);
        }
        log::info!("terminal {}: shell parked as pid {}", term, new_pid);
        Ok(new_pid)
    }
}

#[cfg(not(all(target_arch = "x86", target_os = "none")))]
mod imp {
    //! Host stubs: there are no kernel stacks to carve PCBs out of.

    use super::*;

    /// # Safety
    /// Host stub; panics.
    pub unsafe fn pcb_mut(_pid: Pid) -> &'static mut Pcb {
        unimplemented!("PCBs exist only on the bare-metal target")
    }

    /// # Safety
    /// Host stub; no current task ever exists.
    pub unsafe fn current_pcb() -> Option<&'static mut Pcb> {
        None
    }

    pub fn current_pcb_files() -> Option<&'static mut FdTable> {
        None
    }

    pub fn current_terminal() -> usize {
        crate::drivers::terminal::visible_terminal()
    }

    pub fn terminal_of(_pid: Pid) -> usize {
        0
    }

    /// # Safety
    /// Host stub; panics.
    pub unsafe fn execute(_command: &[u8]) -> Result<u32, KernelError> {
        unimplemented!("execute requires the bare-metal target")
    }

    /// # Safety
    /// Host stub; panics.
    pub unsafe fn halt(_status: u8) -> ! {
        unimplemented!("halt requires the bare-metal target")
    }

    /// # Safety
    /// Host stub; panics.
    pub unsafe fn spawn_parked_shell(_term: usize) -> Result<Pid, KernelError> {
        unimplemented!("spawn requires the bare-metal target")
    }
}

pub use imp::{
    current_pcb, current_pcb_files, current_terminal, execute, halt, pcb_mut, spawn_parked_shell,
    terminal_of,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcbs_stack_down_from_eight_megabytes() {
        assert_eq!(pcb_address(1), 8 * MB - 16 * KB);
        assert_eq!(pcb_address(6), 8 * MB - 56 * KB);
        assert_eq!(kernel_stack_top(1), 8 * MB - 8 * KB - 4);
        // Each stack region is exactly one block.
        assert_eq!(pcb_address(1) + KERNEL_STACK_SIZE, kernel_stack_top(1) + 4);
    }

    #[test]
    fn pid_allocation_prefers_the_lowest_free() {
        let mut pids = PidBitmap::new();
        assert_eq!(pids.allocate(), Some(1));
        assert_eq!(pids.allocate(), Some(2));
        assert_eq!(pids.allocate(), Some(3));
        pids.release(2);
        assert_eq!(pids.allocate(), Some(2));
    }

    #[test]
    fn pid_pool_exhausts_at_max_tasks() {
        let mut pids = PidBitmap::new();
        for expected in 1..=MAX_TASKS as Pid {
            assert_eq!(pids.allocate(), Some(expected));
        }
        assert_eq!(pids.allocate(), None);
        pids.release(4);
        assert_eq!(pids.allocate(), Some(4));
    }

    #[test]
    fn round_robin_wraps_and_skips_holes() {
        let mut pids = PidBitmap::new();
        for _ in 0..4 {
            pids.allocate();
        }
        pids.release(2);
        // 1, 3, 4 allocated.
        assert_eq!(pids.next_allocated_after(1), Some(3));
        assert_eq!(pids.next_allocated_after(3), Some(4));
        assert_eq!(pids.next_allocated_after(4), Some(1));
        assert_eq!(pids.next_allocated_after(6), Some(1));
    }

    #[test]
    fn round_robin_on_a_single_task_returns_it() {
        let mut pids = PidBitmap::new();
        pids.allocate();
        assert_eq!(pids.next_allocated_after(1), Some(1));
        assert_eq!(PidBitmap::new().next_allocated_after(1), None);
    }

    #[test]
    fn commands_split_at_the_first_space() {
        let cmd = parse_command(b"cat frame0.txt\0trailing-garbage").unwrap();
        assert_eq!(cmd.name_bytes(), b"cat");
        assert_eq!(cmd.args_bytes(), b"frame0.txt");

        let bare = parse_command(b"ls").unwrap();
        assert_eq!(bare.name_bytes(), b"ls");
        assert!(bare.args_bytes().is_empty());

        let multi = parse_command(b"grep a b c").unwrap();
        assert_eq!(multi.args_bytes(), b"a b c");
    }

    #[test]
    fn empty_commands_are_rejected() {
        assert!(parse_command(b"").is_err());
        assert!(parse_command(b"\0whatever").is_err());
        assert!(parse_command(b" leading-space").is_err());
    }

    #[test]
    fn oversized_arguments_are_clamped() {
        let mut cmd = [b'x'; 300];
        cmd[5] = b' ';
        let parsed = parse_command(&cmd).unwrap();
        assert_eq!(parsed.name_bytes(), b"xxxxx");
        assert_eq!(parsed.args_bytes().len(), MAX_ARGS_LENGTH - 1);
    }

    #[test]
    fn exec_header_requires_the_magic() {
        let mut header = [0u8; EXE_HEADER_LEN];
        header[..4].copy_from_slice(&[0x7F, b'E', b'L', b'F']);
        header[24..28].copy_from_slice(&0x0804_8094u32.to_le_bytes());
        assert_eq!(parse_exec_header(&header), Ok(0x0804_8094));

        header[1] = b'X';
        assert_eq!(parse_exec_header(&header), Err(KernelError::NotExecutable));
        assert_eq!(
            parse_exec_header(&[0x7F, b'E', b'L', b'F']),
            Err(KernelError::NotExecutable)
        );
    }
}
