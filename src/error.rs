//! Typed errors raised while authoring or parsing module descriptors.
//!
//! Findings that are *reported* rather than raised (duplicate exports in a
//! loaded descriptor, provisional exports) live in [`crate::validation`].

use crate::descriptor::{ModuleName, PackageName};

/// Errors returned by [`crate::ModuleBoundary::declare_export`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoundaryError {
    #[error("package {package} is already exported by {module}")]
    DuplicateExport {
        module: ModuleName,
        package: PackageName,
    },

    #[error("package {package} does not exist in the implementation of {module}")]
    UnknownPackage {
        module: ModuleName,
        package: PackageName,
    },

    #[error("invalid {kind} name '{value}'")]
    InvalidName { kind: &'static str, value: String },

    #[error("export of {package} is restricted to an empty module set")]
    EmptyRestriction { package: PackageName },

    #[error("export of {package} may not be restricted to its own module {module}")]
    SelfRestriction {
        module: ModuleName,
        package: PackageName,
    },
}

/// Syntax error in a `module-info.java` descriptor.
///
/// Line and column are 1-based and point at the offending token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}, column {column}: {message}")]
pub struct DescriptorParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl DescriptorParseError {
    pub(crate) fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}
