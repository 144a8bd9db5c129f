//! Memory management: the fixed physical map and the paging layer.
//!
//! All storage is statically partitioned; there is no allocator. The
//! constants here are the single source of truth for the layout every
//! other subsystem computes against.

pub mod paging;
pub mod video;

/// One kibibyte.
pub const KB: usize = 1024;
/// One mebibyte.
pub const MB: usize = 1024 * 1024;

/// Small page size.
pub const PAGE_SIZE: usize = 4 * KB;
/// Large (PSE) page size.
pub const LARGE_PAGE_SIZE: usize = 4 * MB;

/// Base of the kernel's 4 MiB global page (virtual and physical).
pub const KERNEL_BASE: usize = 4 * MB;
/// One past the kernel image and stack region; the boot stack top.
pub const KERNEL_TOP: usize = 8 * MB;

/// Base of the user 4 MiB page in every task's address space.
pub const USER_IMAGE_BASE: usize = 128 * MB;
/// One past the user page.
pub const USER_IMAGE_TOP: usize = 132 * MB;
/// Where the flat program image is copied within the user page.
pub const USER_LOAD_ADDR: usize = 0x0804_8000;
/// Initial user stack pointer.
pub const USER_STACK_TOP: usize = USER_IMAGE_TOP - 4;

/// Virtual address vidmap hands to user programs.
pub const VIDMAP_BASE: usize = 0x4000_0000;

/// Physical (and steered virtual) address of text video memory.
pub const VIDEO: usize = 0xB8000;
/// Spare page: a permanent window onto physical [`VIDEO`] in every address
/// space.
pub const VIDEO_WINDOW: usize = 0xBC000;

/// Number of terminals with backing pages behind the video page.
pub const NUM_BACKING_PAGES: usize = 3;

/// Physical page mirroring terminal `t`'s screen while it is not visible.
pub const fn backing_page(terminal: usize) -> usize {
    VIDEO + (terminal + 1) * PAGE_SIZE
}

/// Physical 4 MiB page backing a task's user image.
pub const fn user_page_phys(pid: u32) -> usize {
    (pid as usize + 1) * LARGE_PAGE_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backing_pages_trail_the_video_page() {
        assert_eq!(backing_page(0), 0xB9000);
        assert_eq!(backing_page(1), 0xBA000);
        assert_eq!(backing_page(2), 0xBB000);
        // The spare window page sits just past the last backing page.
        assert_eq!(backing_page(NUM_BACKING_PAGES - 1) + PAGE_SIZE, VIDEO_WINDOW);
    }

    #[test]
    fn user_pages_are_large_page_aligned_and_disjoint() {
        for pid in 1..=6u32 {
            let base = user_page_phys(pid);
            assert_eq!(base % LARGE_PAGE_SIZE, 0);
            assert_eq!(base, (pid as usize + 1) * 4 * MB);
        }
        // PID 1's page starts right after the kernel page.
        assert_eq!(user_page_phys(1), 8 * MB);
    }

    #[test]
    fn the_load_address_sits_inside_the_user_page() {
        assert!(USER_LOAD_ADDR >= USER_IMAGE_BASE);
        assert!(USER_LOAD_ADDR < USER_IMAGE_TOP);
        assert_eq!(USER_STACK_TOP, 132 * MB - 4);
    }
}
