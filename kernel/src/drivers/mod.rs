//! Device drivers: the keyboard decoder and the virtual terminals.

pub mod keyboard;
pub mod terminal;
