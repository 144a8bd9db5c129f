//! Three virtual terminals.
//!
//! Each terminal owns a line buffer being typed into, a completed-line
//! snapshot, a read-ready flag, and a cursor. Exactly one terminal is
//! visible; its cells live in physical video memory, the other two are
//! redirected to backing pages by the paging layer. Task-side writes go
//! through the steered virtual video address; the keyboard echo and the
//! screen swaps go through the spare window that always aliases the
//! physical page.

use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use spin::Mutex;

use crate::arch::without_interrupts;
use crate::arch::x86::vga::{self, Cursor, TextBuffer};
use crate::error::KernelError;
use crate::mm::{backing_page, VIDEO, VIDEO_WINDOW};
use crate::process::Pid;

/// Number of virtual terminals.
pub const NUM_TERMINALS: usize = 3;
/// Bytes per line buffer; the last byte is reserved for the newline.
pub const LINE_BUFFER_SIZE: usize = 128;

/// The in-progress input line. The final byte is reserved so a finished
/// line always ends in `\n`.
#[derive(Clone, Copy)]
pub struct LineBuffer {
    buf: [u8; LINE_BUFFER_SIZE],
    len: usize,
}

impl LineBuffer {
    pub const fn new() -> Self {
        Self {
            buf: [0; LINE_BUFFER_SIZE],
            len: 0,
        }
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append one byte; refuses once only the newline slot remains.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.len >= LINE_BUFFER_SIZE - 1 {
            return false;
        }
        self.buf[self.len] = byte;
        self.len += 1;
        true
    }

    /// Remove the last byte if there is one.
    pub fn backspace(&mut self) -> bool {
        if self.len == 0 {
            return false;
        }
        self.len -= 1;
        self.buf[self.len] = 0;
        true
    }

    /// Terminate with `\n`, hand out the finished line, and reset.
    pub fn finalize(&mut self) -> ([u8; LINE_BUFFER_SIZE], usize) {
        self.buf[self.len] = b'\n';
        let line = self.buf;
        let len = self.len + 1;
        self.buf = [0; LINE_BUFFER_SIZE];
        self.len = 0;
        (line, len)
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

struct Terminal {
    line: LineBuffer,
    completed: [u8; LINE_BUFFER_SIZE],
    completed_len: usize,
    cursor: Cursor,
}

impl Terminal {
    const fn new() -> Self {
        Self {
            line: LineBuffer::new(),
            completed: [0; LINE_BUFFER_SIZE],
            completed_len: 0,
            cursor: Cursor { row: 0, col: 0 },
        }
    }
}

static TERMINALS: Mutex<[Terminal; NUM_TERMINALS]> =
    Mutex::new([const { Terminal::new() }; NUM_TERMINALS]);

/// Per-terminal completed-line flags, written by the IRQ path and spun on
/// by blocked readers.
static READ_READY: [AtomicBool; NUM_TERMINALS] =
    [const { AtomicBool::new(false) }; NUM_TERMINALS];

/// Index of the visible terminal.
static VISIBLE: AtomicUsize = AtomicUsize::new(0);

/// Task currently belonging to each terminal (0 = none).
static ACTIVE_PIDS: [AtomicU32; NUM_TERMINALS] = [const { AtomicU32::new(0) }; NUM_TERMINALS];

/// The never-truly-exiting first shell of each terminal (0 = none yet).
static SHELL_PIDS: [AtomicU32; NUM_TERMINALS] = [const { AtomicU32::new(0) }; NUM_TERMINALS];

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Cursor for boot-time output, before the terminals exist.
static BOOT_CURSOR: Mutex<Cursor> = Mutex::new(Cursor { row: 0, col: 0 });

/// Index of the visible terminal.
pub fn visible_terminal() -> usize {
    VISIBLE.load(Ordering::Acquire)
}

/// The task a terminal currently runs, if any.
pub fn active_pid(terminal: usize) -> Option<Pid> {
    match ACTIVE_PIDS[terminal].load(Ordering::Acquire) {
        0 => None,
        pid => Some(pid),
    }
}

pub fn set_active_pid(terminal: usize, pid: Pid) {
    ACTIVE_PIDS[terminal].store(pid, Ordering::Release);
}

/// A terminal's base shell, if it has been started.
pub fn base_shell(terminal: usize) -> Option<Pid> {
    match SHELL_PIDS[terminal].load(Ordering::Acquire) {
        0 => None,
        pid => Some(pid),
    }
}

pub fn set_base_shell(terminal: usize, pid: Option<Pid>) {
    SHELL_PIDS[terminal].store(pid.unwrap_or(0), Ordering::Release);
}

/// The visible screen through the spare window page. Valid once paging is
/// up; every address space carries the window mapping.
fn window() -> TextBuffer {
    // SAFETY: the window page aliases physical text video memory in every
    // address space the kernel ever loads.
    unsafe { TextBuffer::at(VIDEO_WINDOW) }
}

/// A terminal's screen as its own task sees it: the steered virtual video
/// page.
fn steered() -> TextBuffer {
    // SAFETY: virtual VIDEO is present in every address space; paging
    // points it at the right physical page for the calling task.
    unsafe { TextBuffer::at(VIDEO) }
}

/// Reset line state and blank the backing pages. Runs with paging on and
/// interrupts still masked.
pub fn init() {
    let mut terminals = TERMINALS.lock();
    for (index, terminal) in terminals.iter_mut().enumerate() {
        *terminal = Terminal::new();
        if index != 0 {
            // SAFETY: backing pages are identity mapped in the kernel's
            // address space.
            let mut backing = unsafe { TextBuffer::at(backing_page(index)) };
            backing.clear(&mut terminal.cursor);
        }
    }
    // Terminal 0 inherits the boot screen and cursor.
    terminals[0].cursor = *BOOT_CURSOR.lock();
    drop(terminals);
    INITIALIZED.store(true, Ordering::Release);
    log::info!("terminals: {} ready, terminal 0 visible", NUM_TERMINALS);
}

/// Blocking read of the next completed line on `terminal`. Spins with
/// interrupts deliverable until the IRQ path posts a line, then copies up
/// to `buf.len()` bytes, stopping after the newline.
pub fn read(terminal: usize, buf: &mut [u8]) -> Result<usize, KernelError> {
    if terminal >= NUM_TERMINALS {
        return Err(KernelError::InvalidDescriptor);
    }
    // SAFETY: read is only reached from task context via the system-call
    // layer; blocking on the IRQ requires taking interrupts.
    unsafe { crate::arch::enable_interrupts() };
    while !READ_READY[terminal].load(Ordering::Acquire) {
        core::hint::spin_loop();
    }

    Ok(without_interrupts(|| {
        let mut terminals = TERMINALS.lock();
        let t = &mut terminals[terminal];
        let limit = buf.len().min(t.completed_len);
        let mut copied = 0;
        for i in 0..limit {
            let byte = t.completed[i];
            buf[i] = byte;
            copied = i + 1;
            if byte == b'\n' {
                break;
            }
        }
        READ_READY[terminal].store(false, Ordering::Release);
        copied
    }))
}

/// Write bytes to `terminal`'s screen through the steered video address,
/// with that terminal's cursor.
pub fn write(terminal: usize, buf: &[u8]) -> Result<usize, KernelError> {
    if terminal >= NUM_TERMINALS {
        return Err(KernelError::InvalidDescriptor);
    }
    without_interrupts(|| {
        let mut terminals = TERMINALS.lock();
        let t = &mut terminals[terminal];
        steered().write_bytes(&mut t.cursor, buf);
        if terminal == visible_terminal() {
            vga::set_hw_cursor(&t.cursor);
        }
    });
    Ok(buf.len())
}

/// Keyboard sink: apply one decoded byte to the visible terminal's line
/// discipline and echo through the window. Runs in IRQ context with
/// interrupts masked.
pub fn write_key(key: u8) {
    let visible = visible_terminal();
    let mut terminals = TERMINALS.lock();
    let t = &mut terminals[visible];
    match key {
        0x08 => {
            if t.line.backspace() {
                window().write_byte(&mut t.cursor, 0x08);
            }
        }
        b'\n' => {
            let (line, len) = t.line.finalize();
            t.completed = line;
            t.completed_len = len;
            window().write_byte(&mut t.cursor, b'\n');
            READ_READY[visible].store(true, Ordering::Release);
        }
        key => {
            if t.line.push(key) {
                window().write_byte(&mut t.cursor, key);
            }
        }
    }
    vga::set_hw_cursor(&t.cursor);
}

/// Ctrl+L: blank the visible screen and home its cursor.
pub fn clear_visible() {
    without_interrupts(|| {
        if !INITIALIZED.load(Ordering::Acquire) {
            let mut cursor = BOOT_CURSOR.lock();
            // SAFETY: before the terminals exist the kernel address space
            // identity-maps the video page.
            unsafe { TextBuffer::at(VIDEO) }.clear(&mut cursor);
            return;
        }
        let mut terminals = TERMINALS.lock();
        let t = &mut terminals[visible_terminal()];
        window().clear(&mut t.cursor);
        vga::set_hw_cursor(&t.cursor);
    });
}

/// Blank a terminal's screen wherever it currently lives (used when a
/// fresh base shell takes the terminal over).
pub fn clear_terminal(terminal: usize) {
    if terminal == visible_terminal() {
        clear_visible();
        return;
    }
    without_interrupts(|| {
        let mut terminals = TERMINALS.lock();
        let t = &mut terminals[terminal];
        // SAFETY: backing pages are identity mapped everywhere.
        unsafe { TextBuffer::at(backing_page(terminal)) }.clear(&mut t.cursor);
    });
}

/// Alt+Fn: make `new` the visible terminal. Saves the outgoing screen to
/// its backing page, restores the incoming one, re-steers the running
/// task's video mapping, and hands the CPU to the new terminal's task
/// (starting a base shell if it never had one).
pub fn switch_to(new: usize) {
    if new >= NUM_TERMINALS || new == visible_terminal() {
        return;
    }
    without_interrupts(|| {
        {
            let mut terminals = TERMINALS.lock();
            let old = visible_terminal();
            // SAFETY: window and backing pages are mapped in every address
            // space; interrupts are masked so nobody paints mid-copy.
            let mut old_backing = unsafe { TextBuffer::at(backing_page(old)) };
            window().copy_to(&mut old_backing);
            let new_backing = unsafe { TextBuffer::at(backing_page(new)) };
            new_backing.copy_to(&mut window());
            VISIBLE.store(new, Ordering::Release);
            vga::set_hw_cursor(&terminals[new].cursor);
        }

        // The running task's writes must now land per the new visibility.
        let current = crate::process::current_pid();
        if current != crate::process::KERNEL_PID {
            // SAFETY: the current task has a live address space.
            unsafe { crate::mm::video::remap_video(None, current) };
        }

        match base_shell(new) {
            None => match unsafe { crate::process::spawn_parked_shell(new) } {
                // SAFETY/note: spawned parked; the scheduler fields are
                // fully formed, so switching to it is an ordinary switch.
                Ok(pid) => unsafe { crate::sched::task_switch(pid) },
                Err(err) => log::error!("terminal {}: cannot start shell: {}", new, err),
            },
            Some(_) => {
                if let Some(pid) = active_pid(new) {
                    // SAFETY: active PIDs name allocated tasks.
                    unsafe { crate::sched::task_switch(pid) };
                }
            }
        }
    });
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
struct VisibleConsole<'a> {
    buffer: TextBuffer,
    cursor: &'a mut Cursor,
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
impl fmt::Write for VisibleConsole<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.buffer.write_bytes(self.cursor, s.as_bytes());
        Ok(())
    }
}

/// Back end of `print!`/`println!`: the visible screen, or the raw video
/// page during boot.
#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use core::fmt::Write;

    #[cfg(not(all(target_arch = "x86", target_os = "none")))]
    {
        std::print!("{}", args);
    }

    #[cfg(all(target_arch = "x86", target_os = "none"))]
    without_interrupts(|| {
        if INITIALIZED.load(Ordering::Acquire) {
            let mut terminals = TERMINALS.lock();
            let visible = visible_terminal();
            let t = &mut terminals[visible];
            let mut console = VisibleConsole {
                buffer: window(),
                cursor: &mut t.cursor,
            };
            let _ = console.write_fmt(args);
            vga::set_hw_cursor(&t.cursor);
        } else {
            let mut cursor = BOOT_CURSOR.lock();
            let mut console = VisibleConsole {
                // SAFETY: identity-mapped (or pre-paging physical) video
                // page during boot.
                buffer: unsafe { TextBuffer::at(VIDEO) },
                cursor: &mut cursor,
            };
            let _ = console.write_fmt(args);
            vga::set_hw_cursor(&cursor);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_buffer_reserves_the_newline_slot() {
        let mut line = LineBuffer::new();
        for i in 0..LINE_BUFFER_SIZE - 1 {
            assert!(line.push(b'a'), "push {} should fit", i);
        }
        // Byte 128 would evict the newline reservation.
        assert!(!line.push(b'b'));
        assert_eq!(line.len(), LINE_BUFFER_SIZE - 1);

        let (buf, len) = line.finalize();
        assert_eq!(len, LINE_BUFFER_SIZE);
        assert_eq!(buf[LINE_BUFFER_SIZE - 1], b'\n');
        assert!(buf[..LINE_BUFFER_SIZE - 1].iter().all(|&b| b == b'a'));
    }

    #[test]
    fn backspace_erases_only_typed_bytes() {
        let mut line = LineBuffer::new();
        assert!(!line.backspace());
        line.push(b'h');
        line.push(b'i');
        assert!(line.backspace());
        assert_eq!(line.len(), 1);
        let (buf, len) = line.finalize();
        assert_eq!(&buf[..len], b"h\n");
    }

    #[test]
    fn finalize_resets_for_the_next_line() {
        let mut line = LineBuffer::new();
        line.push(b'l');
        line.push(b's');
        let (buf, len) = line.finalize();
        assert_eq!(&buf[..len], b"ls\n");
        assert!(line.is_empty());
        let (buf2, len2) = line.finalize();
        assert_eq!(&buf2[..len2], b"\n");
    }

    #[test]
    fn shell_and_active_pid_slots_hold_assignments() {
        set_base_shell(2, Some(5));
        assert_eq!(base_shell(2), Some(5));
        set_base_shell(2, None);
        assert_eq!(base_shell(2), None);

        set_active_pid(2, 4);
        assert_eq!(active_pid(2), Some(4));
        set_active_pid(2, 0);
        assert_eq!(active_pid(2), None);
    }
}
