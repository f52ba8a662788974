// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Container service manager
//!
//! Every operation builds one statement and hands it to the injected
//! [`SqlExecutor`]. Optional clauses are emitted only when a value is given;
//! leaving a value out never clears it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::common::{
    handle_object_already_exists, read_spec_as_json, strip_empty_lines, tag_clause,
    to_string_literal, Tag,
};
use super::logs::{CancellationToken, LogStream};
use crate::error::{ObjectType, ResourceError};
use crate::sql::{QueryResult, SqlExecutor};

/// Parameters for `CREATE SERVICE`
#[derive(Debug, Clone)]
pub struct CreateService {
    /// Service name
    pub name: String,
    /// Compute pool to run in
    pub compute_pool: String,
    /// YAML specification file
    pub spec_path: PathBuf,
    /// Minimum number of instances
    pub min_instances: u32,
    /// Maximum number of instances
    pub max_instances: u32,
    /// Resume automatically when called
    pub auto_resume: bool,
    /// External access integrations
    pub external_access_integrations: Vec<String>,
    /// Warehouse for queries issued by the service
    pub query_warehouse: Option<String>,
    /// Object tags
    pub tags: Vec<Tag>,
    /// Object comment
    pub comment: Option<String>,
    /// Add `IF NOT EXISTS`
    pub if_not_exists: bool,
}

/// Parameters for `EXECUTE JOB SERVICE`
#[derive(Debug, Clone)]
pub struct ExecuteJob {
    /// Job service name
    pub name: String,
    /// Compute pool to run in
    pub compute_pool: String,
    /// YAML specification file
    pub spec_path: PathBuf,
    /// External access integrations
    pub external_access_integrations: Vec<String>,
    /// Warehouse for queries issued by the job
    pub query_warehouse: Option<String>,
    /// Object comment
    pub comment: Option<String>,
}

/// Parameters for `SYSTEM$GET_SERVICE_LOGS`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogsQuery {
    /// Service name
    pub service_name: String,
    /// Instance id, usually `0`
    pub instance_id: String,
    /// Container name from the specification
    pub container_name: String,
    /// Number of trailing lines
    pub num_lines: u32,
    /// Logs of the previously terminated container
    pub previous_logs: bool,
    /// Only lines after this timestamp; empty for no bound
    pub since_timestamp: String,
    /// Keep the leading timestamp on each line
    pub include_timestamps: bool,
}

/// Properties accepted by `alter service ... set`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceProperties {
    /// `min_instances`
    pub min_instances: Option<u32>,
    /// `max_instances`
    pub max_instances: Option<u32>,
    /// `query_warehouse`
    pub query_warehouse: Option<String>,
    /// `auto_resume`
    pub auto_resume: Option<bool>,
    /// `external_access_integrations`
    pub external_access_integrations: Option<Vec<String>>,
    /// `comment`
    pub comment: Option<String>,
}

impl ServiceProperties {
    /// True when no property is given
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Properties accepted by `alter service ... unset`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ServicePropertyFlags {
    /// `min_instances`
    pub min_instances: bool,
    /// `max_instances`
    pub max_instances: bool,
    /// `query_warehouse`
    pub query_warehouse: bool,
    /// `auto_resume`
    pub auto_resume: bool,
    /// `comment`
    pub comment: bool,
}

impl ServicePropertyFlags {
    fn names(self) -> Vec<&'static str> {
        [
            ("min_instances", self.min_instances),
            ("max_instances", self.max_instances),
            ("query_warehouse", self.query_warehouse),
            ("auto_resume", self.auto_resume),
            ("comment", self.comment),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }
}

fn integrations_list(integrations: &[String]) -> String {
    integrations.join(",")
}

/// Manages container services through an [`SqlExecutor`]
#[derive(Debug)]
pub struct ServiceManager<E> {
    executor: E,
}

impl<E: SqlExecutor> ServiceManager<E> {
    /// Manager submitting statements to `executor`
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Backend used by this manager
    pub fn executor(&self) -> &E {
        &self.executor
    }

    fn execute(&self, query: &str) -> Result<QueryResult, ResourceError> {
        Ok(self.executor.execute_query(query)?)
    }

    /// Create a long-running service
    pub fn create(&self, service: &CreateService) -> Result<QueryResult, ResourceError> {
        let spec = read_spec_as_json(&service.spec_path)?;
        let create = if service.if_not_exists {
            "CREATE SERVICE IF NOT EXISTS"
        } else {
            "CREATE SERVICE"
        };

        let mut query = vec![
            format!("{create} {}", service.name),
            format!("IN COMPUTE POOL {}", service.compute_pool),
            "FROM SPECIFICATION $$".to_string(),
            spec,
            "$$".to_string(),
            format!("MIN_INSTANCES = {}", service.min_instances),
            format!("MAX_INSTANCES = {}", service.max_instances),
            format!("AUTO_RESUME = {}", service.auto_resume),
        ];
        if !service.external_access_integrations.is_empty() {
            query.push(format!(
                "EXTERNAL_ACCESS_INTEGRATIONS = ({})",
                integrations_list(&service.external_access_integrations)
            ));
        }
        if let Some(warehouse) = &service.query_warehouse {
            query.push(format!("QUERY_WAREHOUSE = {warehouse}"));
        }
        if let Some(comment) = &service.comment {
            query.push(format!("COMMENT = {}", to_string_literal(comment)));
        }
        query.extend(tag_clause(&service.tags));

        self.executor
            .execute_query(&strip_empty_lines(query))
            .map_err(|e| handle_object_already_exists(e, ObjectType::Service, &service.name))
    }

    /// Run a job service to completion
    pub fn execute_job(&self, job: &ExecuteJob) -> Result<QueryResult, ResourceError> {
        let spec = read_spec_as_json(&job.spec_path)?;
        let mut query = vec![
            "EXECUTE JOB SERVICE".to_string(),
            format!("IN COMPUTE POOL {}", job.compute_pool),
            "FROM SPECIFICATION $$".to_string(),
            spec,
            "$$".to_string(),
            format!("NAME = {}", job.name),
        ];
        if !job.external_access_integrations.is_empty() {
            query.push(format!(
                "EXTERNAL_ACCESS_INTEGRATIONS = ({})",
                integrations_list(&job.external_access_integrations)
            ));
        }
        if let Some(warehouse) = &job.query_warehouse {
            query.push(format!("QUERY_WAREHOUSE = {warehouse}"));
        }
        if let Some(comment) = &job.comment {
            query.push(format!("COMMENT = {}", to_string_literal(comment)));
        }

        self.executor
            .execute_query(&strip_empty_lines(query))
            .map_err(|e| handle_object_already_exists(e, ObjectType::Service, &job.name))
    }

    /// Current status of every instance and container
    pub fn status(&self, service_name: &str) -> Result<QueryResult, ResourceError> {
        self.execute(&format!("CALL SYSTEM$GET_SERVICE_STATUS('{service_name}')"))
    }

    /// One batch of container logs, one entry per block returned by the backend
    pub fn logs(&self, query: &LogsQuery) -> Result<Vec<String>, ResourceError> {
        let result = self.execute(&format!(
            "call SYSTEM$GET_SERVICE_LOGS('{}', '{}', '{}', {}, {}, '{}', {});",
            query.service_name,
            query.instance_id,
            query.container_name,
            query.num_lines,
            query.previous_logs,
            query.since_timestamp,
            query.include_timestamps,
        ))?;
        Ok(result.first_column_strings())
    }

    /// Follow container logs until `cancel` fires
    ///
    /// `query.since_timestamp` is the starting cursor.
    pub fn stream_logs(
        &self,
        query: LogsQuery,
        interval: Duration,
        cancel: CancellationToken,
    ) -> LogStream<'_, E> {
        LogStream::new(self, query, interval, cancel)
    }

    /// Replace the service specification
    pub fn upgrade_spec(
        &self,
        service_name: &str,
        spec_path: &Path,
    ) -> Result<QueryResult, ResourceError> {
        let spec = read_spec_as_json(spec_path)?;
        self.execute(&format!(
            "alter service {service_name} from specification $$ {spec} $$"
        ))
    }

    /// Endpoints exposed by the service
    pub fn list_endpoints(&self, service_name: &str) -> Result<QueryResult, ResourceError> {
        self.execute(&format!("show endpoints in service {service_name}"))
    }

    /// Running instances
    pub fn list_instances(&self, service_name: &str) -> Result<QueryResult, ResourceError> {
        self.execute(&format!("show service instances in service {service_name}"))
    }

    /// Containers across all instances
    pub fn list_containers(&self, service_name: &str) -> Result<QueryResult, ResourceError> {
        self.execute(&format!("show service containers in service {service_name}"))
    }

    /// Service roles
    pub fn list_roles(&self, service_name: &str) -> Result<QueryResult, ResourceError> {
        self.execute(&format!("show roles in service {service_name}"))
    }

    /// Suspend the service
    pub fn suspend(&self, service_name: &str) -> Result<QueryResult, ResourceError> {
        self.execute(&format!("alter service {service_name} suspend"))
    }

    /// Resume the service
    pub fn resume(&self, service_name: &str) -> Result<QueryResult, ResourceError> {
        self.execute(&format!("alter service {service_name} resume"))
    }

    /// Set one or more service properties
    pub fn set_property(
        &self,
        service_name: &str,
        properties: &ServiceProperties,
    ) -> Result<QueryResult, ResourceError> {
        if properties.is_empty() {
            return Err(ResourceError::NoPropertiesProvided(format!(
                "No properties specified for service '{service_name}'. Please provide at least one property to set."
            )));
        }

        let mut query = vec![format!("alter service {service_name} set")];
        if let Some(min) = properties.min_instances {
            query.push(format!("min_instances = {min}"));
        }
        if let Some(max) = properties.max_instances {
            query.push(format!("max_instances = {max}"));
        }
        if let Some(warehouse) = &properties.query_warehouse {
            query.push(format!("query_warehouse = {warehouse}"));
        }
        if let Some(auto_resume) = properties.auto_resume {
            query.push(format!("auto_resume = {auto_resume}"));
        }
        if let Some(integrations) = &properties.external_access_integrations {
            query.push(format!(
                "external_access_integrations = ({})",
                integrations_list(integrations)
            ));
        }
        if let Some(comment) = &properties.comment {
            query.push(format!("comment = {}", to_string_literal(comment)));
        }

        self.execute(&strip_empty_lines(query))
    }

    /// Reset one or more service properties to their defaults
    pub fn unset_property(
        &self,
        service_name: &str,
        properties: ServicePropertyFlags,
    ) -> Result<QueryResult, ResourceError> {
        let names = properties.names();
        if names.is_empty() {
            return Err(ResourceError::NoPropertiesProvided(format!(
                "No properties specified for service '{service_name}'. Please provide at least one property to reset to its default value."
            )));
        }
        self.execute(&format!(
            "alter service {service_name} unset {}",
            names.join(",")
        ))
    }
}
