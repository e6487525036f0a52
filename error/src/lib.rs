/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains the error type shared by the OTP image generator crates.

--*/
use core::fmt;
use thiserror::Error;

/// Result type used by all OTP image generator library crates
pub type OtpResult<T> = Result<T, OtpError>;

/// Broad classification of an [`OtpError`]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorCategory {
    /// Bad or inconsistent input records
    Configuration,

    /// Misalignment, overlap, or lack of space
    Geometry,

    /// Codeword search exhaustion, digest overrides, invalid permutations
    Cryptographic,

    /// An invariant the generator itself is responsible for did not hold
    Internal,
}

impl ErrorCategory {
    /// Base of the numeric code range for this category
    const fn code_base(self) -> u32 {
        match self {
            ErrorCategory::Configuration => 0x0001_0000,
            ErrorCategory::Geometry => 0x0002_0000,
            ErrorCategory::Cryptographic => 0x0003_0000,
            ErrorCategory::Internal => 0x0004_0000,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration error"),
            ErrorCategory::Geometry => write!(f, "geometry error"),
            ErrorCategory::Cryptographic => write!(f, "cryptographic error"),
            ErrorCategory::Internal => write!(f, "internal error"),
        }
    }
}

/// OTP image generator error
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum OtpError {
    #[error("{context}: missing required field '{field}'")]
    MissingField { context: String, field: String },

    #[error("{context}: invalid value '{value}' for '{field}'")]
    InvalidValue {
        context: String,
        field: String,
        value: String,
    },

    #[error("duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },

    #[error("unknown {kind} '{name}'")]
    UnknownReference { kind: &'static str, name: String },

    #[error("{context}: unused fields [{}]", fields.join(", "))]
    UnusedFields { context: String, fields: Vec<String> },

    #[error("{0}")]
    InvalidConfig(String),

    #[error("{what} must be a multiple of {alignment} bytes (got {value})")]
    Misaligned {
        what: String,
        value: usize,
        alignment: usize,
    },

    #[error("not enough space for {what}: {available} bytes available, {required} bytes required")]
    InsufficientSpace {
        what: String,
        available: usize,
        required: usize,
    },

    #[error("value of {what} does not fit into {bits} bits")]
    ValueOverflow { what: String, bits: usize },

    #[error("item collision in partition {partition} at byte {offset}")]
    ItemCollision { partition: String, offset: usize },

    #[error("invalid bit permutation: {0}")]
    InvalidPermutation(String),

    #[error("partition {0} carries a hardware digest that must not be set manually")]
    DigestOverride(String),

    #[error("infeasible codeword constraints: {0}")]
    InfeasibleConstraints(String),

    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl OtpError {
    /// Shorthand for [`OtpError::MissingField`]
    pub fn missing(context: impl Into<String>, field: impl Into<String>) -> Self {
        OtpError::MissingField {
            context: context.into(),
            field: field.into(),
        }
    }

    /// Shorthand for [`OtpError::InvalidValue`]
    pub fn invalid(
        context: impl Into<String>,
        field: impl Into<String>,
        value: impl fmt::Display,
    ) -> Self {
        OtpError::InvalidValue {
            context: context.into(),
            field: field.into(),
            value: value.to_string(),
        }
    }

    /// Shorthand for [`OtpError::UnknownReference`]
    pub fn unknown(kind: &'static str, name: impl Into<String>) -> Self {
        OtpError::UnknownReference {
            kind,
            name: name.into(),
        }
    }

    /// Category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            OtpError::MissingField { .. }
            | OtpError::InvalidValue { .. }
            | OtpError::DuplicateName { .. }
            | OtpError::UnknownReference { .. }
            | OtpError::UnusedFields { .. }
            | OtpError::InvalidConfig(_) => ErrorCategory::Configuration,
            OtpError::Misaligned { .. }
            | OtpError::InsufficientSpace { .. }
            | OtpError::ValueOverflow { .. }
            | OtpError::ItemCollision { .. } => ErrorCategory::Geometry,
            OtpError::InvalidPermutation(_)
            | OtpError::DigestOverride(_)
            | OtpError::InfeasibleConstraints(_) => ErrorCategory::Cryptographic,
            OtpError::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Numeric error code. The upper half identifies the category.
    pub fn code(&self) -> u32 {
        let index = match self {
            OtpError::MissingField { .. } => 1,
            OtpError::InvalidValue { .. } => 2,
            OtpError::DuplicateName { .. } => 3,
            OtpError::UnknownReference { .. } => 4,
            OtpError::UnusedFields { .. } => 5,
            OtpError::InvalidConfig(_) => 6,
            OtpError::Misaligned { .. } => 1,
            OtpError::InsufficientSpace { .. } => 2,
            OtpError::ValueOverflow { .. } => 3,
            OtpError::ItemCollision { .. } => 4,
            OtpError::InvalidPermutation(_) => 1,
            OtpError::DigestOverride(_) => 2,
            OtpError::InfeasibleConstraints(_) => 3,
            OtpError::Internal(_) => 1,
        };
        self.category().code_base() | index
    }
}
