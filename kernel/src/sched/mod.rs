//! Round-robin scheduler.
//!
//! The PIT tick rotates the CPU over the allocated PIDs, strictly greater
//! index first, wrapping to 1 and never landing on the kernel
//! pseudo-process. Switching is a kernel-stack swap: the outgoing task's
//! ESP/EBP go into its PCB, the incoming task's come out. A task that is
//! parked inside `execute` has no scheduler frame; landing on it falls
//! back to the execute-return linkage recorded by the task it spawned.

use crate::process::{self, Pid, KERNEL_PID};

/// PIT tick body: pick the round-robin successor and switch to it. Runs
/// in IRQ context with interrupts masked, after the EOI has been sent.
pub fn timer_tick() {
    let current = process::current_pid();
    if current == KERNEL_PID {
        // Boot has not launched the first shell yet.
        return;
    }
    let pids = process::pid_bitmap_snapshot();
    if let Some(next) = pids.next_allocated_after(current) {
        if next != current {
            // SAFETY: `next` is allocated per the snapshot and interrupts
            // are masked for the whole switch.
            unsafe { task_switch(next) };
        }
    }
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod imp {
    use super::*;
    use crate::arch::x86::{gdt, usermode};
    use crate::mm::{paging, video};
    use crate::process::{kernel_stack_top, pcb_mut};

    /// Hand the CPU to `new_pid`. Returns (much later) when the scheduler
    /// rotates back to the calling task.
    ///
    /// # Safety
    /// `new_pid` must be allocated, interrupts must be masked, and the
    /// caller must be on a task kernel stack (never the boot stack).
    pub unsafe fn task_switch(new_pid: Pid) {
        let current = process::current_pid();
        if new_pid == current {
            return;
        }
        if current == KERNEL_PID {
            log::error!("task_switch: cannot switch away from the kernel");
            return;
        }
        if !process::is_allocated(new_pid) {
            log::error!("task_switch: pid {} is not allocated", new_pid);
            return;
        }

        gdt::set_kernel_stack(kernel_stack_top(new_pid) as u32);

        // SAFETY: both PIDs are allocated; exclusivity per masked
        // interrupts on one CPU.
        let cur_pcb = unsafe { pcb_mut(current) };
        let new_pcb = unsafe { pcb_mut(new_pid) };
        let new_has_sched_frame = new_pcb.from_scheduler != 0;
        let new_ctx = new_pcb.sched_ctx;
        let fallback_ctx = cur_pcb.parent_ctx;
        cur_pcb.from_scheduler = 1;

        process::set_current_pid(new_pid);
        // SAFETY: every task directory carries the kernel mappings, so the
        // switch is transparent to this code path.
        unsafe {
            paging::load_task_directory(new_pid);
            video::remap_video(Some(current), new_pid);
        }

        if !new_has_sched_frame {
            // The incoming task never reached the scheduler: it is parked
            // inside execute, and the frame to resume it through is the
            // parent linkage recorded by the task we are leaving.
            // SAFETY: the linkage was written by enter_user on a stack
            // that is parked until exactly this resumption.
            unsafe {
                usermode::park_and_halt_return(
                    &mut cur_pcb.sched_ctx,
                    fallback_ctx.esp,
                    fallback_ctx.ebp,
                    0,
                );
            }
        }

        // SAFETY: the incoming frame was parked by this same switch path
        // (or by build_first_run_stack); the save slot is ours.
        unsafe {
            usermode::switch_stacks(&mut cur_pcb.sched_ctx, new_ctx.esp, new_ctx.ebp);
        }
    }
}

#[cfg(not(all(target_arch = "x86", target_os = "none")))]
mod imp {
    use super::*;

    /// # Safety
    /// Host stub; panics.
    pub unsafe fn task_switch(_new_pid: Pid) {
        unimplemented!("task switching requires the bare-metal target")
    }
}

pub use imp::task_switch;
