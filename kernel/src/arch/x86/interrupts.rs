//! Interrupt entry: vector stubs, the saved register frame, and the
//! C-level dispatcher.
//!
//! Every vector funnels through one trampoline that normalizes the stack:
//! a sentinel error code when the CPU pushed none, the vector number, the
//! general registers, and the data segment selectors. The dispatcher then
//! demultiplexes on the vector and the stub unwinds with IRET.

use bitflags::bitflags;

use super::{pic, pit, rtc};
use crate::arch::halt_loop;

/// Highest vector treated as a CPU exception.
pub const MAX_EXCEPTION_VECTOR: u32 = 31;
/// PIT tick, IRQ0.
pub const TIMER_VECTOR: u32 = 32;
/// Keyboard, IRQ1.
pub const KEYBOARD_VECTOR: u32 = 33;
/// RTC periodic interrupt, IRQ8.
pub const RTC_VECTOR: u32 = 40;
/// Software interrupt for system calls.
pub const SYSCALL_VECTOR: u32 = 128;

/// Error-code slot filler for vectors where the CPU pushes none.
pub const SENTINEL_ERROR_CODE: u32 = 0xDEAD_BEEF;

/// The register frame the trampoline builds, lowest address first.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct InterruptFrame {
    pub gs: u32,
    pub fs: u32,
    pub es: u32,
    pub ds: u32,
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub esp_dummy: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub vector: u32,
    pub error_code: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    /// Only valid when the interrupt arrived from ring 3.
    pub user_esp: u32,
    /// Only valid when the interrupt arrived from ring 3.
    pub user_ss: u32,
}

bitflags! {
    /// Page-fault error code bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFaultCode: u32 {
        /// Fault on a present page (protection violation) rather than a
        /// non-present one.
        const PROTECTION = 1 << 0;
        /// Faulting access was a write.
        const WRITE = 1 << 1;
        /// Fault occurred in user mode.
        const USER = 1 << 2;
        /// A reserved bit was set in a paging structure.
        const RESERVED = 1 << 3;
    }
}

/// Human-readable exception names, indexed by vector.
pub fn exception_name(vector: u32) -> &'static str {
    const NAMES: [&str; 20] = [
        "Divide By Zero",
        "Debug",
        "Non-Maskable Interrupt",
        "Breakpoint",
        "Overflow",
        "Bound Range Exceeded",
        "Invalid Opcode",
        "Device Not Available",
        "Double Fault",
        "Coprocessor Segment Overrun",
        "Invalid TSS",
        "Segment Not Present",
        "Stack-Segment Fault",
        "General Protection Fault",
        "Page Fault",
        "Reserved",
        "x87 Floating Point Exception",
        "Alignment Check",
        "Machine Check",
        "SIMD Floating Point Exception",
    ];
    NAMES
        .get(vector as usize)
        .copied()
        .unwrap_or("Reserved")
}

/// Faulting linear address of the last page fault.
#[cfg(all(target_arch = "x86", target_os = "none"))]
fn read_cr2() -> u32 {
    let addr: u32;
    // SAFETY: CR2 is read-only here and always holds the last faulting
    // linear address.
    unsafe {
        core::arch::asm!("mov {}, cr2", out(reg) addr, options(nomem, nostack, preserves_flags));
    }
    addr
}

#[cfg(not(all(target_arch = "x86", target_os = "none")))]
fn read_cr2() -> u32 {
    0
}

/// Render the fatal exception report and park the machine.
fn handle_exception(frame: &InterruptFrame) -> ! {
    crate::drivers::terminal::clear_visible();
    println!("An exception has occurred");
    println!("ISR: {}", frame.vector);
    if frame.error_code != SENTINEL_ERROR_CODE {
        println!("Error: {:#x}", frame.error_code);
    }
    println!("Cause: {}", exception_name(frame.vector));

    if frame.vector == 14 {
        let code = PageFaultCode::from_bits_truncate(frame.error_code);
        println!("Address: {:#x}", read_cr2());
        println!(
            "Reason: {}",
            if code.contains(PageFaultCode::PROTECTION) {
                "Page-level protection violation"
            } else {
                "Non-present page"
            }
        );
        println!(
            "R/W: {}",
            if code.contains(PageFaultCode::WRITE) {
                "Write"
            } else {
                "Read"
            }
        );
        println!(
            "U/S: {}",
            if code.contains(PageFaultCode::USER) {
                "User mode"
            } else {
                "Supervisor mode"
            }
        );
        if code.contains(PageFaultCode::RESERVED) {
            println!("Caused by reserved bits set to 1 in a page directory");
        }
    }

    log::error!(
        "exception {} ({}) at {:#x}, error {:#x}",
        frame.vector,
        exception_name(frame.vector),
        frame.eip,
        frame.error_code
    );
    halt_loop();
}

/// Demultiplex one vectored entry. Called by the trampoline with a pointer
/// to the frame it saved; mutations to the frame (the EAX slot in
/// particular) are restored into the interrupted context on IRET.
#[no_mangle]
pub extern "C" fn isr_dispatch(frame: &mut InterruptFrame) {
    match frame.vector {
        v if v <= MAX_EXCEPTION_VECTOR => handle_exception(frame),
        TIMER_VECTOR => {
            // EOI first: the tick may switch stacks and not come back for
            // a long time.
            pic::send_eoi(pit::PIT_IRQ);
            crate::sched::timer_tick();
        }
        KEYBOARD_VECTOR => crate::drivers::keyboard::handle_interrupt(),
        RTC_VECTOR => rtc::handle_interrupt(),
        SYSCALL_VECTOR => {
            frame.eax = crate::syscall::dispatch(frame) as u32;
        }
        v => {
            println!("Unhandled interrupt: {}", v);
            halt_loop();
        }
    }
}

// Vector stubs. Each pushes the sentinel where the CPU pushed no error
// code, then the vector number, and falls into the common trampoline.
#[cfg(all(target_arch = "x86", target_os = "none"))]
core::arch::global_asm!(
    r#"
.macro isr_noerr num
.global isr\num
isr\num:
    push 0xDEADBEEF
    push \num
    jmp interrupt_common
.endm

.macro isr_err num
.global isr\num
isr\num:
    push \num
    jmp interrupt_common
.endm

isr_noerr 0
isr_noerr 1
isr_noerr 2
isr_noerr 3
isr_noerr 4
isr_noerr 5
isr_noerr 6
isr_noerr 7
isr_err   8
isr_err   10
isr_err   11
isr_err   12
isr_err   13
isr_err   14
isr_noerr 16
isr_err   17
isr_noerr 18
isr_noerr 19
isr_noerr 32
isr_noerr 33
isr_noerr 40
isr_noerr 128

interrupt_common:
    pushad
    push ds
    push es
    push fs
    push gs
    mov cx, 0x18
    mov ds, cx
    mov es, cx
    mov fs, cx
    mov gs, cx
    push esp
    call isr_dispatch
    add esp, 4
    pop gs
    pop fs
    pop es
    pop ds
    popad
    add esp, 8
    iretd
"#
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_layout_matches_the_trampoline_pushes() {
        use core::mem::offset_of;
        // Segment saves sit below the pushad block.
        assert_eq!(offset_of!(InterruptFrame, gs), 0);
        assert_eq!(offset_of!(InterruptFrame, ds), 12);
        // pushad: edi lowest, eax highest.
        assert_eq!(offset_of!(InterruptFrame, edi), 16);
        assert_eq!(offset_of!(InterruptFrame, eax), 44);
        // Stub pushes: vector below the error code.
        assert_eq!(offset_of!(InterruptFrame, vector), 48);
        assert_eq!(offset_of!(InterruptFrame, error_code), 52);
        // CPU frame.
        assert_eq!(offset_of!(InterruptFrame, eip), 56);
        assert_eq!(offset_of!(InterruptFrame, user_ss), 72);
    }

    #[test]
    fn exception_names_cover_the_architectural_set() {
        assert_eq!(exception_name(0), "Divide By Zero");
        assert_eq!(exception_name(13), "General Protection Fault");
        assert_eq!(exception_name(14), "Page Fault");
        assert_eq!(exception_name(25), "Reserved");
    }

    #[test]
    fn page_fault_bits_decode() {
        let code = PageFaultCode::from_bits_truncate(0x6);
        assert!(code.contains(PageFaultCode::WRITE));
        assert!(code.contains(PageFaultCode::USER));
        assert!(!code.contains(PageFaultCode::PROTECTION));
    }
}
