// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! SQL execution seam
//!
//! Resource managers never talk to the network themselves. They are handed
//! something that implements [`SqlExecutor`] and only build statement text.

pub mod rest;

use serde::Serialize;
use thiserror::Error;

pub use rest::RestExecutor;

/// Errors returned by an execution backend
#[derive(Debug, Error)]
pub enum SqlError {
    /// Statement was rejected by the server
    #[error("{}", format_programming(.errno, .sql_state, .message))]
    Programming {
        /// Numeric error code, e.g. 2002 for "already exists"
        errno: Option<i64>,
        /// Five character SQL state
        sql_state: Option<String>,
        /// Server message
        message: String,
    },
    /// Transport failure
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Response body did not have the expected shape
    #[error("Unexpected response from server: {0}")]
    Decode(String),
    /// Connection settings are incomplete
    #[error("Invalid connection configuration: {0}")]
    Config(String),
}

fn format_programming(errno: &Option<i64>, sql_state: &Option<String>, message: &str) -> String {
    match errno {
        Some(errno) => format!(
            "{errno:06} ({}): {message}",
            sql_state.as_deref().unwrap_or_default()
        ),
        None => message.to_string(),
    }
}

impl SqlError {
    /// Numeric error code for server-side errors
    #[must_use]
    pub fn errno(&self) -> Option<i64> {
        match self {
            Self::Programming { errno, .. } => *errno,
            _ => None,
        }
    }
}

/// Rows returned by a statement
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    /// Column names in result order
    pub columns: Vec<String>,
    /// Row values; strings or nulls as delivered by the backend
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl QueryResult {
    /// Single-column result built from strings
    #[must_use]
    pub fn from_strings<I, S>(column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: vec![column.to_string()],
            rows: values
                .into_iter()
                .map(|v| vec![serde_json::Value::String(v.into())])
                .collect(),
        }
    }

    /// First column of every row as text; nulls are skipped
    #[must_use]
    pub fn first_column_strings(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.first())
            .filter_map(|value| match value {
                serde_json::Value::Null => None,
                serde_json::Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            })
            .collect()
    }

    /// Rows as JSON objects keyed by column name
    #[must_use]
    pub fn to_records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }

    /// True when no row was returned
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Executes SQL text and returns its rows
pub trait SqlExecutor {
    /// Run a single statement
    fn execute_query(&self, query: &str) -> Result<QueryResult, SqlError>;
}

impl<T: SqlExecutor + ?Sized> SqlExecutor for &T {
    fn execute_query(&self, query: &str) -> Result<QueryResult, SqlError> {
        (**self).execute_query(query)
    }
}

impl<T: SqlExecutor + ?Sized> SqlExecutor for Box<T> {
    fn execute_query(&self, query: &str) -> Result<QueryResult, SqlError> {
        (**self).execute_query(query)
    }
}
