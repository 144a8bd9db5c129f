//! FerriteOS kernel library.
//!
//! A protected-mode kernel for the 32-bit x86 PC: multiboot boot, mixed
//! 4 KiB / 4 MiB paging with per-task address spaces, a trap-gate system
//! call surface, a read-only filesystem loaded as a boot module, three
//! virtual terminals, and round-robin scheduling over at most six tasks.
//!
//! The crate doubles as a host library so the unit tests run with the
//! standard cargo harness; everything that touches ports, control registers,
//! or fixed physical addresses is gated on `target_os = "none"` with inert
//! stubs elsewhere.

#![no_std]
// naked_functions is stable since Rust 1.88.0, no feature flag needed

// Host target: link std so unit tests can allocate and assert normally.
#[cfg(not(target_os = "none"))]
extern crate std;

#[macro_use]
pub mod print;

pub mod arch;
pub mod drivers;
pub mod error;
pub mod fs;
pub mod logging;
pub mod mm;
pub mod process;
pub mod sched;
pub mod syscall;

pub use error::KernelError;
