//! Architecture support.
//!
//! Only 32-bit x86 is implemented; the façade re-exports the handful of
//! primitives the rest of the kernel needs (interrupt flag control and the
//! terminal halt loops).

pub mod x86;

pub use x86::{disable_interrupts, enable_interrupts, halt_loop, without_interrupts};
