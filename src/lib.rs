// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! snowcli library - project definitions and container services
//!
//! This crate parses `snowflake.yml` project definitions, migrates them from
//! version 1 to version 2, and manages Snowpark Container Services objects by
//! composing SQL for an injected execution backend.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bundle;
pub mod commands;
pub mod config;
pub mod conversion;
pub mod error;
pub mod logging;
pub mod output;
pub mod project;
pub mod spcs;
pub mod sql;

pub use conversion::{convert_project_definition_to_v2, ConversionError};
pub use error::{ObjectType, ResourceError};
pub use sql::{QueryResult, SqlError, SqlExecutor};
