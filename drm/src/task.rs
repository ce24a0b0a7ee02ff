//! Creator task names
//!
//! Framebuffers remember the short name of the task that created them so
//! debug dumps can attribute leaked buffers.

use core::fmt;

/// Size of a task name buffer including the terminating NUL.
pub const TASK_COMM_LEN: usize = 16;

/// Fixed-size snapshot of a task's short name.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TaskComm {
    bytes: [u8; TASK_COMM_LEN],
    len: u8,
}

impl TaskComm {
    pub const fn empty() -> Self {
        Self {
            bytes: [0; TASK_COMM_LEN],
            len: 0,
        }
    }

    /// Snapshot `name`, truncated to `TASK_COMM_LEN - 1` bytes on a
    /// character boundary.
    pub fn new(name: &str) -> Self {
        let mut end = name.len().min(TASK_COMM_LEN - 1);
        while !name.is_char_boundary(end) {
            end -= 1;
        }

        let mut bytes = [0u8; TASK_COMM_LEN];
        bytes[..end].copy_from_slice(&name.as_bytes()[..end]);
        Self {
            bytes,
            len: end as u8,
        }
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for TaskComm {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for TaskComm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for TaskComm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of the calling task's name.
pub trait CurrentTask: Send + Sync {
    fn comm(&self) -> TaskComm;
}

/// A task provider that always reports the same name.
#[derive(Debug, Clone, Copy)]
pub struct FixedTask(TaskComm);

impl FixedTask {
    pub fn new(name: &str) -> Self {
        Self(TaskComm::new(name))
    }
}

impl Default for FixedTask {
    fn default() -> Self {
        Self::new("kworker")
    }
}

impl CurrentTask for FixedTask {
    fn comm(&self) -> TaskComm {
        self.0
    }
}
