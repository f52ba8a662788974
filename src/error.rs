// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Errors raised by resource managers

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::sql::SqlError;

/// Kind of object a statement targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    /// Container service
    Service,
    /// Compute pool
    ComputePool,
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service => write!(f, "Service"),
            Self::ComputePool => write!(f, "Compute pool"),
        }
    }
}

/// Resource manager error
#[derive(Debug, Error)]
pub enum ResourceError {
    /// Set or unset called without any property
    #[error("{0}")]
    NoPropertiesProvided(String),

    /// Create failed because the object is already there
    #[error("{object_type} '{name}' already exists.")]
    ObjectAlreadyExists {
        /// Kind of object
        object_type: ObjectType,
        /// Object name as given by the caller
        name: String,
    },

    /// Specification file could not be read
    #[error("Cannot read specification file {path}: {reason}")]
    SpecFile {
        /// File path
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// Backend failure
    #[error(transparent)]
    Sql(#[from] SqlError),
}
