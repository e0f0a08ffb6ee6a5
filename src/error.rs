//! Error taxonomy
//!
//! Capacity failures are local and leave the registry untouched. Task faults
//! surface from the `schedule()` call that performed the resumption.
//! Resuming or re-registering a completed task is a programming error and
//! panics instead of appearing here.

use core::fmt;

use thiserror::Error;

/// Which registry rejected an insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryKind {
    Tasks,
    WaitableObjects,
    WaitForObjects,
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryKind::Tasks => write!(f, "task"),
            RegistryKind::WaitableObjects => write!(f, "waitable object"),
            RegistryKind::WaitForObjects => write!(f, "wait-for object"),
        }
    }
}

/// Unrecovered failure raised by a task body during one resumption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{message}{}", CodeSuffix(.code))]
pub struct TaskFault {
    message: &'static str,
    code: Option<i32>,
}

impl TaskFault {
    pub const fn new(message: &'static str) -> Self {
        Self {
            message,
            code: None,
        }
    }

    pub const fn with_code(message: &'static str, code: i32) -> Self {
        Self {
            message,
            code: Some(code),
        }
    }

    pub fn message(&self) -> &'static str {
        self.message
    }

    pub fn code(&self) -> Option<i32> {
        self.code
    }
}

/// ` (code N)` when a fault carries a code, nothing otherwise
struct CodeSuffix<'a>(&'a Option<i32>);

impl fmt::Display for CodeSuffix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(code) => write!(f, " (code {})", code),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    #[error("{registry} registry full (capacity {capacity})")]
    CapacityExceeded {
        registry: RegistryKind,
        capacity: usize,
    },
    #[error("task fault: {0}")]
    TaskFault(#[from] TaskFault),
}

pub type Result<T> = core::result::Result<T, Error>;
