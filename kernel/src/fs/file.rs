//! File descriptors: the polymorphic operation vector and the per-task
//! descriptor table.
//!
//! A descriptor is polymorphic over {read, write, open, close}; the
//! concrete variant (terminal, RTC, directory, regular file) is picked at
//! open time from the dentry type. Slots 0 and 1 are the terminal and can
//! never be closed.

use spin::Mutex;

use super::{FileType, MAX_FNAME_LEN};
use crate::error::KernelError;

/// Descriptor index of standard input.
pub const STDIN: usize = 0;
/// Descriptor index of standard output.
pub const STDOUT: usize = 1;
/// Slots per task.
pub const FILE_ARRAY_SIZE: usize = 8;

/// Low bit of the flags word marks the slot in use.
pub const FLAG_IN_USE: u32 = 0x1;

/// The operation vector a descriptor dispatches through.
pub trait FileOps: Sync {
    /// Per-driver open hook, after the slot is bound.
    fn open(&self, _name: &[u8]) -> Result<(), KernelError> {
        Ok(())
    }

    fn read(&self, fd: &mut FileDescriptor, buf: &mut [u8]) -> Result<usize, KernelError>;

    fn write(&self, fd: &mut FileDescriptor, buf: &[u8]) -> Result<usize, KernelError>;

    /// Per-driver close hook, before the slot is released.
    fn close(&self, _fd: &mut FileDescriptor) -> Result<(), KernelError> {
        Ok(())
    }
}

/// One descriptor slot.
#[derive(Clone, Copy)]
pub struct FileDescriptor {
    ops: Option<&'static dyn FileOps>,
    pub inode: u32,
    pub position: u32,
    pub flags: u32,
}

impl FileDescriptor {
    const fn empty() -> Self {
        Self {
            ops: None,
            inode: 0,
            position: 0,
            flags: 0,
        }
    }

    pub const fn in_use(&self) -> bool {
        self.flags & FLAG_IN_USE != 0
    }
}

// --------------------------------------------------------------------------
// Concrete operation vectors
// --------------------------------------------------------------------------

struct TerminalOps;

impl FileOps for TerminalOps {
    fn read(&self, _fd: &mut FileDescriptor, buf: &mut [u8]) -> Result<usize, KernelError> {
        crate::drivers::terminal::read(crate::process::current_terminal(), buf)
    }

    fn write(&self, _fd: &mut FileDescriptor, buf: &[u8]) -> Result<usize, KernelError> {
        crate::drivers::terminal::write(crate::process::current_terminal(), buf)
    }

    fn close(&self, _fd: &mut FileDescriptor) -> Result<(), KernelError> {
        // The terminal outlives every descriptor pointing at it.
        Err(KernelError::InvalidDescriptor)
    }
}

struct RtcOps;

impl FileOps for RtcOps {
    fn open(&self, _name: &[u8]) -> Result<(), KernelError> {
        crate::arch::x86::rtc::set_frequency(crate::arch::x86::rtc::MIN_FREQUENCY)
    }

    fn read(&self, _fd: &mut FileDescriptor, _buf: &mut [u8]) -> Result<usize, KernelError> {
        crate::arch::x86::rtc::wait_for_tick();
        Ok(0)
    }

    fn write(&self, _fd: &mut FileDescriptor, buf: &[u8]) -> Result<usize, KernelError> {
        let frequency = crate::arch::x86::rtc::decode_frequency(buf)?;
        crate::arch::x86::rtc::set_frequency(frequency)?;
        Ok(0)
    }

    fn close(&self, _fd: &mut FileDescriptor) -> Result<(), KernelError> {
        crate::arch::x86::rtc::set_frequency(crate::arch::x86::rtc::MIN_FREQUENCY)
    }
}

struct DirectoryOps;

impl FileOps for DirectoryOps {
    fn read(&self, fd: &mut FileDescriptor, buf: &mut [u8]) -> Result<usize, KernelError> {
        let image = super::image();
        if fd.position >= image.num_dentries() {
            return Ok(0);
        }
        let dentry = image.read_dentry_by_index(fd.position)?;
        fd.position += 1;
        let name = dentry.name_bytes();
        let n = name.len().min(buf.len());
        buf[..n].copy_from_slice(&name[..n]);
        Ok(n)
    }

    fn write(&self, _fd: &mut FileDescriptor, _buf: &[u8]) -> Result<usize, KernelError> {
        Err(KernelError::ReadOnly)
    }
}

struct RegularFileOps;

impl FileOps for RegularFileOps {
    fn read(&self, fd: &mut FileDescriptor, buf: &mut [u8]) -> Result<usize, KernelError> {
        let n = super::image().read_data(fd.inode, fd.position, buf)?;
        fd.position += n as u32;
        Ok(n)
    }

    fn write(&self, _fd: &mut FileDescriptor, _buf: &[u8]) -> Result<usize, KernelError> {
        Err(KernelError::ReadOnly)
    }
}

static TERMINAL_OPS: TerminalOps = TerminalOps;
static RTC_OPS: RtcOps = RtcOps;
static DIRECTORY_OPS: DirectoryOps = DirectoryOps;
static REGULAR_FILE_OPS: RegularFileOps = RegularFileOps;

fn ops_for(ftype: FileType) -> &'static dyn FileOps {
    match ftype {
        FileType::Rtc => &RTC_OPS,
        FileType::Directory => &DIRECTORY_OPS,
        FileType::Regular => &REGULAR_FILE_OPS,
    }
}

// --------------------------------------------------------------------------
// Descriptor table
// --------------------------------------------------------------------------

/// A task's descriptor table. Slots 0/1 are pre-bound to the terminal.
pub struct FdTable {
    slots: [FileDescriptor; FILE_ARRAY_SIZE],
}

impl FdTable {
    /// An entirely empty table (the kernel's, before boot finishes).
    pub const fn empty() -> Self {
        Self {
            slots: [FileDescriptor::empty(); FILE_ARRAY_SIZE],
        }
    }

    /// A fresh task table with stdin/stdout bound to the terminal.
    pub fn new_task_table() -> Self {
        let mut table = Self::empty();
        for slot in [STDIN, STDOUT] {
            table.slots[slot] = FileDescriptor {
                ops: Some(&TERMINAL_OPS),
                inode: 0,
                position: 0,
                flags: FLAG_IN_USE,
            };
        }
        table
    }

    fn slot(&mut self, fd: usize) -> Result<&mut FileDescriptor, KernelError> {
        if fd >= FILE_ARRAY_SIZE || !self.slots[fd].in_use() {
            return Err(KernelError::InvalidDescriptor);
        }
        Ok(&mut self.slots[fd])
    }

    /// Open a named file: lowest free slot from 2 up, operation vector by
    /// dentry type, then the driver's open hook.
    pub fn open(&mut self, name: &[u8]) -> Result<usize, KernelError> {
        if name.is_empty() || name.len() > MAX_FNAME_LEN {
            return Err(KernelError::InvalidFileName);
        }
        let dentry = super::image().read_dentry_by_name(name)?;
        let Some(fd) = (2..FILE_ARRAY_SIZE).find(|&i| !self.slots[i].in_use()) else {
            return Err(KernelError::DescriptorsExhausted);
        };
        let ops = ops_for(dentry.ftype);
        self.slots[fd] = FileDescriptor {
            ops: Some(ops),
            inode: dentry.inode,
            position: 0,
            flags: FLAG_IN_USE,
        };
        if let Err(err) = ops.open(name) {
            self.slots[fd] = FileDescriptor::empty();
            return Err(err);
        }
        Ok(fd)
    }

    /// Close a slot. Stdin and stdout are reserved and refuse.
    pub fn close(&mut self, fd: usize) -> Result<(), KernelError> {
        if fd == STDIN || fd == STDOUT {
            return Err(KernelError::InvalidDescriptor);
        }
        let slot = self.slot(fd)?;
        let ops = slot.ops;
        let mut parked = *slot;
        self.slots[fd] = FileDescriptor::empty();
        if let Some(ops) = ops {
            ops.close(&mut parked)?;
        }
        Ok(())
    }

    /// Read through a slot's operation vector.
    pub fn read(&mut self, fd: usize, buf: &mut [u8]) -> Result<usize, KernelError> {
        let slot = self.slot(fd)?;
        let ops = slot.ops.ok_or(KernelError::InvalidDescriptor)?;
        ops.read(slot, buf)
    }

    /// Write through a slot's operation vector.
    pub fn write(&mut self, fd: usize, buf: &[u8]) -> Result<usize, KernelError> {
        let slot = self.slot(fd)?;
        let ops = slot.ops.ok_or(KernelError::InvalidDescriptor)?;
        ops.write(slot, buf)
    }

    /// Rewind or reposition a slot (the program loader seeks back to 0
    /// after sniffing the header).
    pub fn seek(&mut self, fd: usize, position: u32) -> Result<(), KernelError> {
        self.slot(fd)?.position = position;
        Ok(())
    }

    /// Total file length behind a slot.
    pub fn length(&mut self, fd: usize) -> Result<u32, KernelError> {
        let inode = self.slot(fd)?.inode;
        super::image().inode_len(inode)
    }

    /// Release every non-reserved slot, running the driver close hooks.
    /// Used by halt when a task dies with descriptors open.
    pub fn release_all(&mut self) {
        for fd in 2..FILE_ARRAY_SIZE {
            if self.slots[fd].in_use() {
                let _ = self.close(fd);
            }
        }
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::empty()
    }
}

/// The kernel pseudo-process's table, used before any task exists.
static KERNEL_FDS: Mutex<FdTable> = Mutex::new(FdTable::empty());

/// Bind the kernel table's stdin/stdout. Called once at boot.
pub fn init_kernel_fds() {
    *KERNEL_FDS.lock() = FdTable::new_task_table();
}

/// Run `f` against the calling context's descriptor table: the current
/// task's, or the kernel's when no task is running.
pub fn with_current_table<R>(f: impl FnOnce(&mut FdTable) -> R) -> R {
    match crate::process::current_pcb_files() {
        Some(files) => f(files),
        None => f(&mut KERNEL_FDS.lock()),
    }
}

#[cfg(test)]
mod tests {
    use super::super::testfs::FileSpec;
    use super::*;

    fn image_fixture() -> std::vec::Vec<u8> {
        super::super::testfs::build(&[
            FileSpec {
                name: b".",
                ftype: 1,
                content: b"",
            },
            FileSpec {
                name: b"frame0.txt",
                ftype: 2,
                content: b"fishy contents\n",
            },
            FileSpec {
                name: b"shell",
                ftype: 2,
                content: b"\x7fELF-ish",
            },
        ])
    }

    fn mounted_table() -> FdTable {
        super::super::mount_for_tests(image_fixture);
        FdTable::new_task_table()
    }

    #[test]
    fn open_allocates_the_lowest_free_slot() {
        let mut table = mounted_table();
        assert_eq!(table.open(b"frame0.txt"), Ok(2));
        assert_eq!(table.open(b"frame0.txt"), Ok(3));
        table.close(2).unwrap();
        // Slot 2 is free again and preferred over 4.
        assert_eq!(table.open(b"shell"), Ok(2));
    }

    #[test]
    fn seventh_open_exhausts_the_table() {
        let mut table = mounted_table();
        for expected in 2..FILE_ARRAY_SIZE {
            assert_eq!(table.open(b"frame0.txt"), Ok(expected));
        }
        assert_eq!(
            table.open(b"frame0.txt"),
            Err(KernelError::DescriptorsExhausted)
        );
    }

    #[test]
    fn stdio_slots_refuse_to_close() {
        let mut table = mounted_table();
        assert_eq!(table.close(STDIN), Err(KernelError::InvalidDescriptor));
        assert_eq!(table.close(STDOUT), Err(KernelError::InvalidDescriptor));
    }

    #[test]
    fn closing_a_free_slot_fails() {
        let mut table = mounted_table();
        assert_eq!(table.close(5), Err(KernelError::InvalidDescriptor));
        assert_eq!(table.close(99), Err(KernelError::InvalidDescriptor));
    }

    #[test]
    fn reads_advance_the_position() {
        let mut table = mounted_table();
        let fd = table.open(b"frame0.txt").unwrap();
        let mut buf = [0u8; 6];
        assert_eq!(table.read(fd, &mut buf), Ok(6));
        assert_eq!(&buf, b"fishy ");
        assert_eq!(table.read(fd, &mut buf), Ok(6));
        assert_eq!(&buf, b"conten");
        // Seek back and reconcile.
        table.seek(fd, 0).unwrap();
        let mut whole = [0u8; 32];
        let n = table.read(fd, &mut whole).unwrap();
        assert_eq!(&whole[..n], b"fishy contents\n");
        assert_eq!(table.read(fd, &mut whole), Ok(0));
    }

    #[test]
    fn directory_reads_walk_the_names_then_end() {
        let mut table = mounted_table();
        let fd = table.open(b".").unwrap();
        let mut buf = [0u8; MAX_FNAME_LEN];
        assert_eq!(table.read(fd, &mut buf), Ok(1));
        assert_eq!(&buf[..1], b".");
        assert_eq!(table.read(fd, &mut buf), Ok(10));
        assert_eq!(&buf[..10], b"frame0.txt");
        assert_eq!(table.read(fd, &mut buf), Ok(5));
        assert_eq!(table.read(fd, &mut buf), Ok(0));
        assert_eq!(table.read(fd, &mut buf), Ok(0));
    }

    #[test]
    fn writes_to_the_filesystem_fail() {
        let mut table = mounted_table();
        let fd = table.open(b"frame0.txt").unwrap();
        assert_eq!(table.write(fd, b"nope"), Err(KernelError::ReadOnly));
        let dir = table.open(b".").unwrap();
        assert_eq!(table.write(dir, b"nope"), Err(KernelError::ReadOnly));
    }

    #[test]
    fn file_length_reports_the_inode_length() {
        let mut table = mounted_table();
        let fd = table.open(b"frame0.txt").unwrap();
        assert_eq!(table.length(fd), Ok(15));
    }

    #[test]
    fn release_all_frees_every_user_slot() {
        let mut table = mounted_table();
        table.open(b"frame0.txt").unwrap();
        table.open(b"shell").unwrap();
        table.release_all();
        assert_eq!(table.open(b"frame0.txt"), Ok(2));
        // Stdio survived.
        assert!(table.slots[STDIN].in_use());
        assert!(table.slots[STDOUT].in_use());
    }

    #[test]
    fn unused_and_out_of_range_descriptors_reject_io() {
        let mut table = mounted_table();
        let mut buf = [0u8; 4];
        assert_eq!(table.read(6, &mut buf), Err(KernelError::InvalidDescriptor));
        assert_eq!(
            table.read(FILE_ARRAY_SIZE, &mut buf),
            Err(KernelError::InvalidDescriptor)
        );
    }
}
