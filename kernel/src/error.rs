//! Kernel error types.
//!
//! Internal code paths report failures as `KernelError`; the system-call
//! boundary collapses every variant to the architectural `-1` so user
//! programs never observe the distinctions.

use core::fmt;

/// Kernel-wide error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "kernel errors must be handled, not silently discarded"]
pub enum KernelError {
    /// Named file does not exist or the name is malformed.
    InvalidFileName,
    /// File descriptor index is out of range, unused, or reserved.
    InvalidDescriptor,
    /// All non-reserved file descriptor slots are in use.
    DescriptorsExhausted,
    /// Directory entry carries a type the kernel cannot dispatch on.
    InvalidFileType,
    /// Executable header is missing the magic number or is truncated.
    NotExecutable,
    /// Program image does not fit in the task's user page.
    ImageTooLarge,
    /// Every process ID is already allocated.
    TaskLimitReached,
    /// The operation needs a running task and there is none.
    NoCurrentTask,
    /// Write attempted on a read-only target.
    ReadOnly,
    /// User-supplied pointer is null or outside the permitted range.
    InvalidAddress,
    /// User-supplied buffer cannot hold the result.
    BufferTooSmall,
    /// The calling task was started without arguments.
    NoArguments,
    /// Value is not an admissible device frequency.
    InvalidFrequency,
    /// The call is a stub that always fails (set_handler, sigreturn).
    Unsupported,
}

impl KernelError {
    /// The value delivered to user space for any failed system call.
    pub const fn as_syscall_result(self) -> i32 {
        -1
    }
}

impl From<KernelError> for i32 {
    fn from(err: KernelError) -> i32 {
        err.as_syscall_result()
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            KernelError::InvalidFileName => "named file does not exist",
            KernelError::InvalidDescriptor => "invalid file descriptor",
            KernelError::DescriptorsExhausted => "no remaining file descriptors",
            KernelError::InvalidFileType => "invalid dentry type",
            KernelError::NotExecutable => "magic number not present",
            KernelError::ImageTooLarge => "program image exceeds user page",
            KernelError::TaskLimitReached => "reached maximum number of tasks",
            KernelError::NoCurrentTask => "no task is running",
            KernelError::ReadOnly => "filesystem is read-only",
            KernelError::InvalidAddress => "address out of range",
            KernelError::BufferTooSmall => "user buffer is too small",
            KernelError::NoArguments => "task has no arguments",
            KernelError::InvalidFrequency => "frequency not supported",
            KernelError::Unsupported => "operation not supported",
        };
        f.write_str(msg)
    }
}

#[cfg(test)]
mod tests {
    use std::string::ToString;

    use super::*;

    #[test]
    fn every_error_becomes_minus_one() {
        let all = [
            KernelError::InvalidFileName,
            KernelError::InvalidDescriptor,
            KernelError::DescriptorsExhausted,
            KernelError::TaskLimitReached,
            KernelError::Unsupported,
        ];
        for err in all {
            assert_eq!(i32::from(err), -1);
        }
    }

    #[test]
    fn display_is_stable() {
        assert_eq!(
            KernelError::NotExecutable.to_string(),
            "magic number not present"
        );
    }
}
