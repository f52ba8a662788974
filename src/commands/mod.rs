// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Command implementations

pub mod completions;
pub mod compute_pool;
pub mod helpers;
pub mod service;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::output::Printer;
use crate::sql::RestExecutor;

/// State shared by commands that talk to the backend
#[derive(Debug)]
pub struct CommandContext {
    /// Loaded configuration
    pub config: Config,
    /// Connection named on the command line
    pub connection: Option<String>,
    /// Output printer
    pub printer: Printer,
}

impl CommandContext {
    /// REST executor for the selected connection
    pub fn executor(&self) -> Result<RestExecutor> {
        let (name, connection) = self.config.connection(self.connection.as_deref())?;
        tracing::debug!("Using connection {name}");
        RestExecutor::from_connection(&connection)
            .with_context(|| format!("Cannot use connection {name}"))
    }
}
