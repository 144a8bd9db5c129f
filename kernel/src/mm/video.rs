//! Video memory steering.
//!
//! Every task writes its terminal output through the virtual video address.
//! Whether those stores land on the visible screen or in a backing page is
//! decided here, by rewriting the task's low page table on every terminal
//! or task switch.

use super::{backing_page, VIDEO};
use crate::process::{Pid, KERNEL_PID};

/// Where a task's video page must point: physical video memory when its
/// terminal is the visible one, that terminal's backing page otherwise.
pub const fn video_pte_target(task_terminal: usize, visible_terminal: usize) -> usize {
    if task_terminal == visible_terminal {
        VIDEO
    } else {
        backing_page(task_terminal)
    }
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod imp {
    use super::*;
    use crate::mm::{paging, VIDMAP_BASE};

    /// Re-point one task's video PTE according to the steering rule. Does
    /// not flush; callers batch updates and flush once.
    ///
    /// # Safety
    /// `pid` must be an allocated task (never the kernel pseudo-process).
    pub unsafe fn steer(pid: Pid) {
        let target = video_pte_target(
            crate::process::terminal_of(pid),
            crate::drivers::terminal::visible_terminal(),
        );
        // SAFETY: the low table belongs to `pid`; single writer per the
        // interrupts-masked discipline.
        unsafe {
            paging::map_page(paging::low_table(pid), target as u32, VIDEO, false);
        }
    }

    /// Apply the steering rule after a task switch: the incoming task
    /// always, the outgoing task unless it is the kernel, then one TLB
    /// flush for both.
    ///
    /// # Safety
    /// Both PIDs must have live address spaces.
    pub unsafe fn remap_video(old: Option<Pid>, new: Pid) {
        // SAFETY: forwarded contract.
        unsafe {
            steer(new);
            if let Some(old_pid) = old {
                if old_pid != KERNEL_PID && old_pid != new {
                    steer(old_pid);
                }
            }
        }
        paging::flush_tlb();
    }

    /// Map physical video memory user-accessible at the vidmap address in
    /// `pid`'s space and return that virtual address.
    ///
    /// # Safety
    /// `pid` must be the running task, so the mapping becomes visible to
    /// the caller that asked for it.
    pub unsafe fn vidmap_install(pid: Pid) -> u32 {
        // SAFETY: the vidmap table belongs to `pid` and its directory entry
        // was installed user-accessible at task_space_init.
        unsafe {
            paging::map_page(paging::vidmap_table(pid), VIDEO as u32, VIDMAP_BASE, true);
        }
        paging::flush_tlb();
        VIDMAP_BASE as u32
    }
}

#[cfg(not(all(target_arch = "x86", target_os = "none")))]
mod imp {
    use super::*;

    /// # Safety
    /// Host stub; no-op.
    pub unsafe fn steer(_pid: Pid) {}

    /// # Safety
    /// Host stub; no-op.
    pub unsafe fn remap_video(_old: Option<Pid>, _new: Pid) {}

    /// # Safety
    /// Host stub; returns the architectural constant.
    pub unsafe fn vidmap_install(_pid: Pid) -> u32 {
        crate::mm::VIDMAP_BASE as u32
    }
}

pub use imp::{remap_video, steer, vidmap_install};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visible_terminal_steers_to_physical_video() {
        assert_eq!(video_pte_target(0, 0), VIDEO);
        assert_eq!(video_pte_target(2, 2), VIDEO);
    }

    #[test]
    fn hidden_terminals_steer_to_their_backing_page() {
        assert_eq!(video_pte_target(0, 1), backing_page(0));
        assert_eq!(video_pte_target(1, 0), backing_page(1));
        assert_eq!(video_pte_target(2, 0), backing_page(2));
    }

    #[test]
    fn steering_decision_covers_the_full_matrix() {
        for task_t in 0..3 {
            for visible in 0..3 {
                let target = video_pte_target(task_t, visible);
                if task_t == visible {
                    assert_eq!(target, VIDEO);
                } else {
                    assert_eq!(target, backing_page(task_t));
                    assert_ne!(target, VIDEO);
                }
            }
        }
    }
}
