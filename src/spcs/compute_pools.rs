// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Compute pool manager

use super::common::{
    handle_object_already_exists, strip_empty_lines, tag_clause, to_string_literal, Tag,
};
use crate::error::{ObjectType, ResourceError};
use crate::sql::{QueryResult, SqlExecutor};

/// Parameters for `CREATE COMPUTE POOL`
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct CreateComputePool {
    /// Pool name
    pub name: String,
    /// Minimum node count
    pub min_nodes: u32,
    /// Maximum node count
    pub max_nodes: u32,
    /// Machine type, e.g. `CPU_X64_XS`
    pub instance_family: String,
    /// Resume when a service is started
    pub auto_resume: bool,
    /// Start suspended
    pub initially_suspended: bool,
    /// Idle seconds before suspension
    pub auto_suspend_secs: u32,
    /// Object tags
    pub tags: Vec<Tag>,
    /// Object comment
    pub comment: Option<String>,
    /// Add `IF NOT EXISTS`
    pub if_not_exists: bool,
}

/// Properties accepted by `alter compute pool ... set`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComputePoolProperties {
    /// `min_nodes`
    pub min_nodes: Option<u32>,
    /// `max_nodes`
    pub max_nodes: Option<u32>,
    /// `auto_resume`
    pub auto_resume: Option<bool>,
    /// `auto_suspend_secs`
    pub auto_suspend_secs: Option<u32>,
    /// `comment`
    pub comment: Option<String>,
}

/// Properties accepted by `alter compute pool ... unset`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComputePoolPropertyFlags {
    /// `auto_resume`
    pub auto_resume: bool,
    /// `auto_suspend_secs`
    pub auto_suspend_secs: bool,
    /// `comment`
    pub comment: bool,
}

/// Manages compute pools through an [`SqlExecutor`]
#[derive(Debug)]
pub struct ComputePoolManager<E> {
    executor: E,
}

impl<E: SqlExecutor> ComputePoolManager<E> {
    /// Manager submitting statements to `executor`
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    fn execute(&self, query: &str) -> Result<QueryResult, ResourceError> {
        Ok(self.executor.execute_query(query)?)
    }

    /// Create a compute pool
    pub fn create(&self, pool: &CreateComputePool) -> Result<QueryResult, ResourceError> {
        let create = if pool.if_not_exists {
            "CREATE COMPUTE POOL IF NOT EXISTS"
        } else {
            "CREATE COMPUTE POOL"
        };
        let mut query = vec![
            format!("{create} {}", pool.name),
            format!("MIN_NODES = {}", pool.min_nodes),
            format!("MAX_NODES = {}", pool.max_nodes),
            format!("INSTANCE_FAMILY = {}", pool.instance_family),
            format!("AUTO_RESUME = {}", pool.auto_resume),
            format!("INITIALLY_SUSPENDED = {}", pool.initially_suspended),
            format!("AUTO_SUSPEND_SECS = {}", pool.auto_suspend_secs),
        ];
        if let Some(comment) = &pool.comment {
            query.push(format!("COMMENT = {}", to_string_literal(comment)));
        }
        query.extend(tag_clause(&pool.tags));

        self.executor
            .execute_query(&strip_empty_lines(query))
            .map_err(|e| handle_object_already_exists(e, ObjectType::ComputePool, &pool.name))
    }

    /// Pool status
    pub fn status(&self, pool_name: &str) -> Result<QueryResult, ResourceError> {
        self.execute(&format!("call system$get_compute_pool_status('{pool_name}')"))
    }

    /// Stop every service running in the pool
    pub fn stop_all(&self, pool_name: &str) -> Result<QueryResult, ResourceError> {
        self.execute(&format!("alter compute pool {pool_name} stop all"))
    }

    /// Suspend the pool
    pub fn suspend(&self, pool_name: &str) -> Result<QueryResult, ResourceError> {
        self.execute(&format!("alter compute pool {pool_name} suspend"))
    }

    /// Resume the pool
    pub fn resume(&self, pool_name: &str) -> Result<QueryResult, ResourceError> {
        self.execute(&format!("alter compute pool {pool_name} resume"))
    }

    /// Set one or more pool properties
    pub fn set_property(
        &self,
        pool_name: &str,
        properties: &ComputePoolProperties,
    ) -> Result<QueryResult, ResourceError> {
        if *properties == ComputePoolProperties::default() {
            return Err(ResourceError::NoPropertiesProvided(format!(
                "No properties specified for compute pool '{pool_name}'. Please provide at least one property to set."
            )));
        }

        let mut query = vec![format!("alter compute pool {pool_name} set")];
        if let Some(min) = properties.min_nodes {
            query.push(format!("min_nodes = {min}"));
        }
        if let Some(max) = properties.max_nodes {
            query.push(format!("max_nodes = {max}"));
        }
        if let Some(auto_resume) = properties.auto_resume {
            query.push(format!("auto_resume = {auto_resume}"));
        }
        if let Some(secs) = properties.auto_suspend_secs {
            query.push(format!("auto_suspend_secs = {secs}"));
        }
        if let Some(comment) = &properties.comment {
            query.push(format!("comment = {}", to_string_literal(comment)));
        }

        self.execute(&strip_empty_lines(query))
    }

    /// Reset one or more pool properties to their defaults
    pub fn unset_property(
        &self,
        pool_name: &str,
        properties: ComputePoolPropertyFlags,
    ) -> Result<QueryResult, ResourceError> {
        let names: Vec<_> = [
            ("auto_resume", properties.auto_resume),
            ("auto_suspend_secs", properties.auto_suspend_secs),
            ("comment", properties.comment),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect();

        if names.is_empty() {
            return Err(ResourceError::NoPropertiesProvided(format!(
                "No properties specified for compute pool '{pool_name}'. Please provide at least one property to reset to its default value."
            )));
        }
        self.execute(&format!(
            "alter compute pool {pool_name} unset {}",
            names.join(",")
        ))
    }
}
