//! Two-level page tables with a mixed 4 KiB / 4 MiB layout.
//!
//! One page directory per PID (the kernel pseudo-process included), plus
//! two 4 KiB page tables each: one covering the low 4 MiB (video page
//! steering) and one covering the gibibyte region vidmap maps into. All of
//! it lives in statically allocated, 4 KiB aligned arrays; entries are
//! rewritten by execute and halt but the storage never moves.

use bitflags::bitflags;

use super::{
    backing_page, user_page_phys, KERNEL_BASE, LARGE_PAGE_SIZE, NUM_BACKING_PAGES, PAGE_SIZE,
    VIDEO, VIDEO_WINDOW, VIDMAP_BASE,
};
use crate::process::{Pid, MAX_TASKS};

/// Entries per directory or table.
pub const ENTRY_COUNT: usize = 1024;

bitflags! {
    /// Bits shared by directory and table entries.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EntryFlags: u32 {
        const PRESENT = 1 << 0;
        const WRITABLE = 1 << 1;
        const USER = 1 << 2;
        const WRITE_THROUGH = 1 << 3;
        const NO_CACHE = 1 << 4;
        const ACCESSED = 1 << 5;
        const DIRTY = 1 << 6;
        /// In a directory entry: this maps a 4 MiB page.
        const LARGE = 1 << 7;
        const GLOBAL = 1 << 8;
    }
}

/// One page directory or page table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Entry(u32);

impl Entry {
    /// An absent entry.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Entry mapping `addr` with `flags`. `addr` must be 4 KiB aligned
    /// (4 MiB aligned for LARGE entries); misalignment is a programmer
    /// error, not a runtime condition.
    pub fn new(addr: u32, flags: EntryFlags) -> Self {
        if flags.contains(EntryFlags::LARGE) {
            debug_assert!(addr as usize % LARGE_PAGE_SIZE == 0);
        } else {
            debug_assert!(addr as usize % PAGE_SIZE == 0);
        }
        Self(addr | flags.bits())
    }

    pub const fn is_present(&self) -> bool {
        self.0 & EntryFlags::PRESENT.bits() != 0
    }

    /// Physical address this entry maps.
    pub const fn addr(&self) -> u32 {
        self.0 & 0xFFFF_F000
    }

    pub const fn flags(&self) -> EntryFlags {
        EntryFlags::from_bits_truncate(self.0)
    }
}

/// A 4 KiB aligned array of 1024 entries; the same shape serves as page
/// directory and page table.
#[repr(C, align(4096))]
pub struct PageTable {
    pub entries: [Entry; ENTRY_COUNT],
}

impl PageTable {
    pub const fn new() -> Self {
        Self {
            entries: [Entry::empty(); ENTRY_COUNT],
        }
    }

    pub fn clear(&mut self) {
        self.entries = [Entry::empty(); ENTRY_COUNT];
    }
}

impl Default for PageTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Directory slot covering a virtual address.
pub const fn pde_index(virt: usize) -> usize {
    virt >> 22
}

/// Table slot covering a virtual address.
pub const fn pte_index(virt: usize) -> usize {
    (virt >> 12) & 0x3FF
}

/// Flags for the pages that alias text video memory.
fn video_flags() -> EntryFlags {
    EntryFlags::PRESENT | EntryFlags::WRITABLE | EntryFlags::NO_CACHE
}

/// Populate a low page table the way every task sees the first 4 MiB:
/// only the video page, its backing pages, and the spare window are
/// present. The video PTE itself starts identity mapped and is re-steered
/// by the video layer.
pub fn fill_task_low_table(table: &mut PageTable) {
    table.clear();
    table.entries[pte_index(VIDEO)] = Entry::new(VIDEO as u32, video_flags());
    for t in 0..NUM_BACKING_PAGES {
        let page = backing_page(t);
        table.entries[pte_index(page)] = Entry::new(page as u32, video_flags());
    }
    table.entries[pte_index(VIDEO_WINDOW)] = Entry::new(VIDEO as u32, video_flags());
}

/// Populate the kernel's low page table: the whole first 4 MiB identity
/// mapped as 4 KiB pages, with page zero absent to trap null dereferences,
/// and the spare window aliased onto physical video memory.
pub fn fill_kernel_low_table(table: &mut PageTable) {
    table.clear();
    for i in 1..ENTRY_COUNT {
        table.entries[i] = Entry::new(
            (i * PAGE_SIZE) as u32,
            EntryFlags::PRESENT | EntryFlags::WRITABLE | EntryFlags::NO_CACHE,
        );
    }
    table.entries[pte_index(VIDEO_WINDOW)] = Entry::new(VIDEO as u32, video_flags());
}

/// The kernel image entry: one global 4 MiB supervisor page at 4 MiB.
pub fn kernel_image_entry() -> Entry {
    Entry::new(
        KERNEL_BASE as u32,
        EntryFlags::PRESENT
            | EntryFlags::WRITABLE
            | EntryFlags::LARGE
            | EntryFlags::GLOBAL
            | EntryFlags::NO_CACHE,
    )
}

/// The user image entry for a PID: a 4 MiB user page backed by the PID's
/// statically assigned physical page.
pub fn user_image_entry(pid: Pid) -> Entry {
    Entry::new(
        user_page_phys(pid) as u32,
        EntryFlags::PRESENT | EntryFlags::WRITABLE | EntryFlags::USER | EntryFlags::LARGE,
    )
}

/// Rewrite one 4 KiB mapping in a table. `user` selects user+supervisor
/// access; the TLB must be flushed by the caller once the table is live.
pub fn map_page(table: &mut PageTable, phys: u32, virt: usize, user: bool) {
    let mut flags = video_flags();
    if user {
        flags |= EntryFlags::USER;
    }
    table.entries[pte_index(virt)] = Entry::new(phys, flags);
}

/// Drop one 4 KiB mapping in a table.
pub fn unmap_page(table: &mut PageTable, virt: usize) {
    table.entries[pte_index(virt)] = Entry::empty();
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod imp {
    use super::*;

    static mut DIRECTORIES: [PageTable; MAX_TASKS + 1] =
        [const { PageTable::new() }; MAX_TASKS + 1];
    static mut LOW_TABLES: [PageTable; MAX_TASKS + 1] =
        [const { PageTable::new() }; MAX_TASKS + 1];
    static mut VIDMAP_TABLES: [PageTable; MAX_TASKS + 1] =
        [const { PageTable::new() }; MAX_TASKS + 1];

    /// # Safety
    /// Exclusive access; callers run with interrupts masked on one CPU.
    pub unsafe fn directory(pid: Pid) -> &'static mut PageTable {
        // SAFETY: index bounded by the PID allocator; aliasing is governed
        // by the uniprocessor discipline the caller upholds.
        unsafe { &mut (*(&raw mut DIRECTORIES))[pid as usize] }
    }

    /// # Safety
    /// As for [`directory`].
    pub unsafe fn low_table(pid: Pid) -> &'static mut PageTable {
        // SAFETY: as above.
        unsafe { &mut (*(&raw mut LOW_TABLES))[pid as usize] }
    }

    /// # Safety
    /// As for [`directory`].
    pub unsafe fn vidmap_table(pid: Pid) -> &'static mut PageTable {
        // SAFETY: as above.
        unsafe { &mut (*(&raw mut VIDMAP_TABLES))[pid as usize] }
    }

    fn table_entry(table: &PageTable) -> Entry {
        Entry::new(
            table as *const PageTable as u32,
            EntryFlags::PRESENT | EntryFlags::WRITABLE,
        )
    }

    fn vidmap_dir_entry(table: &PageTable) -> Entry {
        Entry::new(
            table as *const PageTable as u32,
            EntryFlags::PRESENT | EntryFlags::WRITABLE | EntryFlags::USER,
        )
    }

    /// Switch the MMU to a PID's directory.
    ///
    /// # Safety
    /// The directory must map the kernel image and the current stack.
    pub unsafe fn load_task_directory(pid: Pid) {
        // SAFETY: every directory built here carries the kernel mappings.
        unsafe {
            let addr = directory(pid) as *const PageTable as u32;
            core::arch::asm!("mov cr3, {0}", in(reg) addr, options(nostack, preserves_flags));
        }
    }

    /// Flush the TLB by reloading CR3.
    pub fn flush_tlb() {
        // SAFETY: rewriting CR3 with its current value only drops cached
        // translations.
        unsafe {
            core::arch::asm!(
                "mov {tmp}, cr3",
                "mov cr3, {tmp}",
                tmp = out(reg) _,
                options(nostack, preserves_flags)
            );
        }
    }

    /// Build the kernel address space and turn paging on: identity-mapped
    /// low 4 MiB (4 KiB pages, page zero absent), the 4 MiB global kernel
    /// page, PSE enabled before PG.
    pub fn init() {
        // SAFETY: boot is single threaded with interrupts masked; nothing
        // else references the static tables yet.
        unsafe {
            let low = low_table(0);
            fill_kernel_low_table(low);
            let dir = directory(0);
            dir.clear();
            dir.entries[0] = table_entry(low);
            dir.entries[pde_index(KERNEL_BASE)] = kernel_image_entry();

            let dir_addr = dir as *const PageTable as u32;
            // SAFETY: PSE first so the 4 MiB kernel entry decodes the
            // moment PG is set; the code enabling paging runs from that
            // very page, identity mapped.
            core::arch::asm!(
                "mov ecx, cr4",
                "or ecx, 0x10",
                "mov cr4, ecx",
                "mov cr3, {dir}",
                "mov ecx, cr0",
                "or ecx, 0x80000000",
                "mov cr0, ecx",
                dir = in(reg) dir_addr,
                out("ecx") _,
                options(nostack)
            );
        }
        log::info!("paging: PSE on, kernel page live");
    }

    /// Reset a PID's address space for a fresh task: low table, kernel
    /// page, the PID's 4 MiB user page at 128 MiB, and an empty vidmap
    /// table. Switches the hardware to the new directory.
    ///
    /// # Safety
    /// The PID must be allocated to the task being built and no other live
    /// task may be using its tables.
    pub unsafe fn task_space_init(pid: Pid) {
        // SAFETY: per the contract, these tables belong to `pid` alone.
        unsafe {
            let low = low_table(pid);
            fill_task_low_table(low);
            let vidmap = vidmap_table(pid);
            vidmap.clear();

            let dir = directory(pid);
            dir.clear();
            dir.entries[0] = table_entry(low);
            dir.entries[pde_index(KERNEL_BASE)] = kernel_image_entry();
            dir.entries[pde_index(crate::mm::USER_IMAGE_BASE)] = user_image_entry(pid);
            dir.entries[pde_index(VIDMAP_BASE)] = vidmap_dir_entry(vidmap);

            load_task_directory(pid);
        }
    }
}

#[cfg(not(all(target_arch = "x86", target_os = "none")))]
mod imp {
    //! Host stubs backed by ordinary heap tables so pure logic can still
    //! be exercised.

    use super::*;

    pub fn init() {}

    pub fn flush_tlb() {}

    /// # Safety
    /// Host stub; panics.
    pub unsafe fn directory(_pid: Pid) -> &'static mut PageTable {
        unimplemented!("page directories exist only on the bare-metal target")
    }

    /// # Safety
    /// Host stub; panics.
    pub unsafe fn low_table(_pid: Pid) -> &'static mut PageTable {
        unimplemented!("page tables exist only on the bare-metal target")
    }

    /// # Safety
    /// Host stub; panics.
    pub unsafe fn vidmap_table(_pid: Pid) -> &'static mut PageTable {
        unimplemented!("page tables exist only on the bare-metal target")
    }

    /// # Safety
    /// Host stub; no-op.
    pub unsafe fn load_task_directory(_pid: Pid) {}

    /// # Safety
    /// Host stub; no-op.
    pub unsafe fn task_space_init(_pid: Pid) {}
}

pub use imp::{
    directory, flush_tlb, init, load_task_directory, low_table, task_space_init, vidmap_table,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::USER_IMAGE_BASE;

    #[test]
    fn index_math_matches_the_architecture() {
        assert_eq!(pde_index(USER_IMAGE_BASE), 32);
        assert_eq!(pde_index(VIDMAP_BASE), 256);
        assert_eq!(pde_index(KERNEL_BASE), 1);
        assert_eq!(pte_index(VIDEO), 0xB8);
        assert_eq!(pte_index(VIDEO_WINDOW), 0xBC);
    }

    #[test]
    fn kernel_image_entry_is_a_global_large_page() {
        let entry = kernel_image_entry();
        assert!(entry.is_present());
        assert!(entry.flags().contains(EntryFlags::LARGE | EntryFlags::GLOBAL));
        assert!(!entry.flags().contains(EntryFlags::USER));
        assert_eq!(entry.addr(), KERNEL_BASE as u32);
    }

    #[test]
    fn user_image_entry_tracks_the_pid() {
        let entry = user_image_entry(3);
        assert_eq!(entry.addr() as usize, 16 * crate::mm::MB);
        assert!(entry.flags().contains(EntryFlags::USER | EntryFlags::LARGE));
    }

    #[test]
    fn task_low_table_maps_only_the_video_pages() {
        let mut table = PageTable::new();
        fill_task_low_table(&mut table);
        let present: std::vec::Vec<usize> = (0..ENTRY_COUNT)
            .filter(|&i| table.entries[i].is_present())
            .collect();
        assert_eq!(present, std::vec![0xB8, 0xB9, 0xBA, 0xBB, 0xBC]);
        // The spare window aliases physical video memory.
        assert_eq!(table.entries[0xBC].addr() as usize, VIDEO);
        assert_eq!(table.entries[0xB9].addr() as usize, backing_page(0));
    }

    #[test]
    fn kernel_low_table_identity_maps_with_a_null_guard() {
        let mut table = PageTable::new();
        fill_kernel_low_table(&mut table);
        assert!(!table.entries[0].is_present());
        assert_eq!(table.entries[1].addr() as usize, PAGE_SIZE);
        assert_eq!(table.entries[0xB8].addr() as usize, VIDEO);
        assert_eq!(table.entries[0xBC].addr() as usize, VIDEO);
        assert!(table.entries[1023].is_present());
    }

    #[test]
    fn map_and_unmap_rewrite_one_slot() {
        let mut table = PageTable::new();
        map_page(&mut table, 0xB8000, VIDEO, true);
        let entry = table.entries[pte_index(VIDEO)];
        assert!(entry.flags().contains(EntryFlags::USER));
        unmap_page(&mut table, VIDEO);
        assert!(!table.entries[pte_index(VIDEO)].is_present());
    }
}
