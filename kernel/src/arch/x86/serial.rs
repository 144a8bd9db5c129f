//! 16550 serial port (COM1), used as the log sink.
//!
//! Polling transmit only; the kernel never reads from the port.

use core::fmt;

use spin::Mutex;

const COM1_BASE: u16 = 0x3F8;

/// A 16550-compatible UART addressed by its base I/O port.
pub struct SerialPort {
    base: u16,
    initialized: bool,
}

impl SerialPort {
    const fn new(base: u16) -> Self {
        Self {
            base,
            initialized: false,
        }
    }

    /// Program 38400 baud, 8N1, FIFOs on.
    #[cfg(all(target_arch = "x86", target_os = "none"))]
    pub fn init(&mut self) {
        // SAFETY: standard 16550 register programming on a port the kernel
        // owns exclusively.
        unsafe {
            x86::io::outb(self.base + 1, 0x00); // Disable interrupts
            x86::io::outb(self.base + 3, 0x80); // DLAB on
            x86::io::outb(self.base, 0x03); // Divisor 3 (38400 baud), low
            x86::io::outb(self.base + 1, 0x00); // Divisor high
            x86::io::outb(self.base + 3, 0x03); // 8 bits, no parity, one stop
            x86::io::outb(self.base + 2, 0xC7); // FIFO on, clear, 14-byte threshold
            x86::io::outb(self.base + 4, 0x0B); // DTR + RTS + OUT2
        }
        self.initialized = true;
    }

    #[cfg(all(target_arch = "x86", target_os = "none"))]
    fn write_byte(&mut self, byte: u8) {
        if !self.initialized {
            return;
        }
        // SAFETY: LSR poll then THR write, the canonical 16550 transmit path.
        unsafe {
            while x86::io::inb(self.base + 5) & 0x20 == 0 {
                core::hint::spin_loop();
            }
            x86::io::outb(self.base, byte);
        }
    }

    #[cfg(not(all(target_arch = "x86", target_os = "none")))]
    pub fn init(&mut self) {
        self.initialized = true;
    }

    #[cfg(not(all(target_arch = "x86", target_os = "none")))]
    fn write_byte(&mut self, _byte: u8) {}
}

impl fmt::Write for SerialPort {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(byte);
        }
        Ok(())
    }
}

static COM1: Mutex<SerialPort> = Mutex::new(SerialPort::new(COM1_BASE));

/// Bring up COM1. Called once, early in boot.
pub fn init() {
    COM1.lock().init();
}

/// Write formatted text to COM1, with interrupts held off so IRQ-context
/// logging cannot deadlock against a half-finished line.
pub fn write_fmt(args: fmt::Arguments) {
    use core::fmt::Write;

    crate::arch::without_interrupts(|| {
        let _ = COM1.lock().write_fmt(args);
    });
}
