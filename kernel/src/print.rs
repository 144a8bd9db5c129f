// Print macros for kernel output

/// Print to the visible terminal's screen.
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::drivers::terminal::_print(format_args!($($arg)*)));
}

/// Print to the visible terminal's screen, with a trailing newline.
#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}
