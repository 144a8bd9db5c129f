//! 8254 programmable interval timer.
//!
//! Channel 0 drives the scheduler tick through IRQ0.

/// IRQ line for channel 0.
pub const PIT_IRQ: u8 = 0;

/// Input clock of the 8254, in Hz.
pub const PIT_FREQUENCY: u32 = 1_193_180;

/// Scheduler tick rate.
pub const SCHEDULER_HZ: u32 = 50;

const PIT_CHANNEL0: u16 = 0x40;
const PIT_COMMAND: u16 = 0x43;
/// Channel 0, lobyte/hibyte access, mode 3 (square wave), binary.
const PIT_CMD_MODE3: u8 = 0x36;

/// Reload divisor for a target rate. The hardware treats 0 as 65536, so the
/// result is clamped into the programmable range.
pub fn divisor_for(hz: u32) -> u16 {
    let div = PIT_FREQUENCY / hz.max(19);
    div.min(u16::MAX as u32) as u16
}

/// Program channel 0 to square-wave mode at the scheduler rate.
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub fn init() {
    let divisor = divisor_for(SCHEDULER_HZ);
    // SAFETY: mode/command write followed by the two reload bytes, exactly
    // as the 8254 datasheet orders them.
    unsafe {
        x86::io::outb(PIT_COMMAND, PIT_CMD_MODE3);
        x86::io::outb(PIT_CHANNEL0, (divisor & 0xFF) as u8);
        x86::io::outb(PIT_CHANNEL0, (divisor >> 8) as u8);
    }
    log::info!("PIT: channel 0 at {} Hz (divisor {})", SCHEDULER_HZ, divisor);
}

#[cfg(not(all(target_arch = "x86", target_os = "none")))]
pub fn init() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_divisor_is_in_range() {
        let div = divisor_for(SCHEDULER_HZ);
        assert_eq!(div, (PIT_FREQUENCY / SCHEDULER_HZ) as u16);
        assert!(div > 0);
    }

    #[test]
    fn slow_rates_clamp_to_programmable_range() {
        assert_eq!(divisor_for(1), divisor_for(19));
        assert!(divisor_for(1) <= u16::MAX);
    }
}
