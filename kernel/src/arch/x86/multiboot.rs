//! Multiboot v1 information structures.
//!
//! The kernel consumes exactly one thing from the loader: the first boot
//! module, which is the filesystem image. The rest of the structure is
//! logged for the serial console and otherwise ignored.

/// Value the loader leaves in EAX.
pub const BOOTLOADER_MAGIC: u32 = 0x2BAD_B002;

/// Flag bits in `MultibootInfo::flags`.
pub mod flags {
    /// `mem_lower`/`mem_upper` are valid.
    pub const MEMORY: u32 = 1 << 0;
    /// `boot_device` is valid.
    pub const BOOT_DEVICE: u32 = 1 << 1;
    /// `cmdline` is valid.
    pub const CMDLINE: u32 = 1 << 2;
    /// `mods_count`/`mods_addr` are valid.
    pub const MODULES: u32 = 1 << 3;
}

/// The fixed head of the multiboot information structure. Later fields
/// (symbol tables, memory map, and so on) exist in memory but the kernel
/// never reads them.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct MultibootInfo {
    pub flags: u32,
    pub mem_lower: u32,
    pub mem_upper: u32,
    pub boot_device: u32,
    pub cmdline: u32,
    pub mods_count: u32,
    pub mods_addr: u32,
}

/// One entry of the boot module list.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct ModuleEntry {
    pub start: u32,
    pub end: u32,
    pub string: u32,
    reserved: u32,
}

impl MultibootInfo {
    /// Whether a flags bit (see [`flags`]) is set.
    pub const fn has(&self, bit: u32) -> bool {
        self.flags & bit != 0
    }

    /// The loader's module list.
    ///
    /// # Safety
    /// `mods_addr`/`mods_count` must describe a live array, which is true
    /// for the structure a multiboot loader hands over.
    pub unsafe fn modules(&self) -> &'static [ModuleEntry] {
        if !self.has(flags::MODULES) || self.mods_count == 0 {
            return &[];
        }
        // SAFETY: guaranteed by the caller; the loader placed the array
        // below 1 MiB where it is identity mapped.
        unsafe {
            core::slice::from_raw_parts(
                self.mods_addr as *const ModuleEntry,
                self.mods_count as usize,
            )
        }
    }

    /// Start and end addresses of the first module: the filesystem image.
    ///
    /// # Safety
    /// As for [`Self::modules`].
    pub unsafe fn first_module(&self) -> Option<(u32, u32)> {
        // SAFETY: forwarded contract.
        let mods = unsafe { self.modules() };
        mods.first().map(|m| (m.start, m.end))
    }

    /// Log the pieces of the handoff the kernel cares about.
    pub fn log_summary(&self) {
        log::debug!("multiboot flags = {:#x}", self.flags);
        if self.has(flags::MEMORY) {
            log::debug!(
                "mem_lower = {} KiB, mem_upper = {} KiB",
                self.mem_lower,
                self.mem_upper
            );
        }
        if self.has(flags::BOOT_DEVICE) {
            log::debug!("boot_device = {:#x}", self.boot_device);
        }
        if self.has(flags::MODULES) {
            log::debug!("{} boot module(s)", self.mods_count);
            // SAFETY: loader-provided list, still mapped this early.
            for (i, module) in unsafe { self.modules() }.iter().enumerate() {
                log::debug!(
                    "module {} at {:#x}..{:#x}",
                    i,
                    module.start,
                    module.end
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(flags: u32) -> MultibootInfo {
        MultibootInfo {
            flags,
            mem_lower: 640,
            mem_upper: 64 * 1024,
            boot_device: 0,
            cmdline: 0,
            mods_count: 0,
            mods_addr: 0,
        }
    }

    #[test]
    fn flag_bits_gate_their_fields() {
        let i = info(flags::MEMORY | flags::MODULES);
        assert!(i.has(flags::MEMORY));
        assert!(i.has(flags::MODULES));
        assert!(!i.has(flags::CMDLINE));
    }

    #[test]
    fn empty_module_list_yields_nothing() {
        let i = info(flags::MODULES);
        // SAFETY: mods_count is zero, so no memory is dereferenced.
        assert!(unsafe { i.first_module() }.is_none());
        let no_flag = info(0);
        // SAFETY: as above.
        assert!(unsafe { no_flag.first_module() }.is_none());
    }

    #[test]
    fn layout_matches_the_multiboot_abi() {
        use core::mem::offset_of;
        assert_eq!(offset_of!(MultibootInfo, mods_count), 20);
        assert_eq!(offset_of!(MultibootInfo, mods_addr), 24);
        assert_eq!(core::mem::size_of::<ModuleEntry>(), 16);
    }
}
