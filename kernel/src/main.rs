//! FerriteOS kernel binary: boot sequence and panic plumbing.

#![no_std]
#![cfg_attr(target_os = "none", no_main)]

// Host target: link std so the bin has a panic handler and runtime.
#[cfg(not(target_os = "none"))]
extern crate std;

#[cfg(target_os = "none")]
mod boot {
    use core::panic::PanicInfo;

    use ferrite_kernel::arch::x86::{
        gdt, idt, multiboot::{MultibootInfo, BOOTLOADER_MAGIC}, pic, pit, rtc, serial,
    };
    use ferrite_kernel::drivers::{keyboard, terminal};
    use ferrite_kernel::{arch, fs, logging, mm, process, println};

    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        println!("[KERNEL PANIC] {}", info);
        log::error!("panic: {}", info);
        arch::halt_loop();
    }

    /// Boot, in strict dependency order, with interrupts masked until the
    /// first task IRETs to user mode.
    #[no_mangle]
    pub extern "C" fn kernel_main(magic: u32, info_addr: u32) -> ! {
        terminal::clear_visible();
        println!("FerriteOS v{}", env!("CARGO_PKG_VERSION"));
        println!("=================");
        println!();

        if magic != BOOTLOADER_MAGIC {
            println!("boot: invalid multiboot magic {:#x}", magic);
            arch::halt_loop();
        }
        // SAFETY: a multiboot loader passes the address of a live info
        // structure in low memory.
        let info = unsafe { &*(info_addr as *const MultibootInfo) };
        // SAFETY: module list comes from the same loader contract.
        let Some((fs_start, fs_end)) = (unsafe { info.first_module() }) else {
            println!("boot: no filesystem module");
            arch::halt_loop();
        };

        serial::init();
        logging::init();
        log::info!("FerriteOS v{} booting", env!("CARGO_PKG_VERSION"));
        info.log_summary();

        gdt::init();

        pic::init();
        pic::enable_irq(pic::CASCADE_IRQ);
        pic::enable_irq(keyboard::KEYBOARD_IRQ);

        idt::init();

        mm::paging::init();

        // SAFETY: the module range stays mapped (it sits inside the kernel
        // 4 MiB page) and is never written.
        if let Err(err) = unsafe { fs::init(fs_start as usize, fs_end as usize) } {
            println!("boot: bad filesystem image: {}", err);
            arch::halt_loop();
        }

        rtc::init();

        pit::init();
        pic::enable_irq(pit::PIT_IRQ);

        keyboard::init();
        terminal::init();
        fs::file::init_kernel_fds();

        // Terminals 1 and 2 get parked base shells; the scheduler will run
        // them once the first IRET unmasks interrupts.
        for term in 1..terminal::NUM_TERMINALS {
            // SAFETY: boot context; the kernel address space is restored
            // before the call returns.
            if let Err(err) = unsafe { process::spawn_parked_shell(term) } {
                println!("boot: no shell for terminal {}: {}", term, err);
            }
        }

        log::info!("launching shell on terminal 0");
        // SAFETY: boot is the canonical blocking-caller of execute.
        let result = unsafe { process::execute(b"shell") };

        // A base shell's halt respawns it in place, so execute only comes
        // back if the very first launch failed.
        println!("boot: could not start shell: {:?}", result.err());
        arch::halt_loop();
    }
}

#[cfg(not(target_os = "none"))]
fn main() {}
