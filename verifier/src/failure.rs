//! Failure taxonomy and process exit-code mapping.
//!
//! Failures carry a category, an optional remediation hint, and a retryable
//! flag. They travel through `anyhow` chains and are recovered at the CLI
//! boundary with `downcast_ref` to pick the exit code.

use thiserror::Error;

/// Failure category. Categories map to stable process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Bad invocation (unknown reference, invalid flag combination).
    Usage,
    /// A required external tool or file dependency is absent.
    MissingDependency,
    /// Present-but-invalid data: schema mismatches, malformed config,
    /// missing baseline outside write mode.
    ContractValidation,
    /// Role or scenario execution failed.
    Execution,
    /// Filesystem read/write failed.
    FileIo,
    /// Unclassified.
    Internal,
}

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_MISSING_DEPENDENCY: i32 = 3;
pub const EXIT_CONTRACT_VALIDATION: i32 = 4;
pub const EXIT_EXECUTION: i32 = 5;
pub const EXIT_FILE_IO: i32 = 6;
pub const EXIT_INTERNAL: i32 = 7;

impl FailureKind {
    pub fn exit_code(self) -> i32 {
        match self {
            FailureKind::Usage => EXIT_USAGE,
            FailureKind::MissingDependency => EXIT_MISSING_DEPENDENCY,
            FailureKind::ContractValidation => EXIT_CONTRACT_VALIDATION,
            FailureKind::Execution => EXIT_EXECUTION,
            FailureKind::FileIo => EXIT_FILE_IO,
            FailureKind::Internal => EXIT_INTERNAL,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Usage => "usage",
            FailureKind::MissingDependency => "missing_dependency",
            FailureKind::ContractValidation => "contract_validation",
            FailureKind::Execution => "execution",
            FailureKind::FileIo => "file_io",
            FailureKind::Internal => "internal",
        }
    }
}

/// Classified failure with optional remediation hint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    pub hint: Option<String>,
    pub retryable: bool,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            hint: None,
            retryable: false,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Usage, message)
    }

    pub fn contract_validation(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ContractValidation, message)
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Execution, message)
    }

    pub fn file_io(message: impl Into<String>) -> Self {
        Self::new(FailureKind::FileIo, message)
    }
}

/// Map an error chain to a process exit code.
///
/// Walks the chain for a [`Failure`]; anything unclassified is internal.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(failure) = cause.downcast_ref::<Failure>() {
            return failure.kind.exit_code();
        }
    }
    EXIT_INTERNAL
}

/// Find the hint attached to the first classified failure in the chain.
pub fn hint_for(err: &anyhow::Error) -> Option<&str> {
    for cause in err.chain() {
        if let Some(failure) = cause.downcast_ref::<Failure>() {
            return failure.hint.as_deref();
        }
    }
    None
}
