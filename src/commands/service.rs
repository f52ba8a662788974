// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Container service commands

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Subcommand};

use super::CommandContext;
use crate::spcs::{
    CancellationToken, CreateService, ExecuteJob, LogsQuery, ServiceManager, ServiceProperties,
    ServicePropertyFlags, Tag,
};

/// `snow spcs service` subcommands
#[derive(Debug, Subcommand)]
pub enum ServiceCommand {
    /// Create a new service in a compute pool
    Create {
        /// Service name
        name: String,
        /// Compute pool to run the service in
        #[arg(long)]
        compute_pool: String,
        /// Path to the YAML service specification
        #[arg(long)]
        spec_path: PathBuf,
        /// Minimum number of instances
        #[arg(long, default_value_t = 1)]
        min_instances: u32,
        /// Maximum number of instances (defaults to --min-instances)
        #[arg(long)]
        max_instances: Option<u32>,
        /// Resume the service when a function or endpoint is called
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        auto_resume: bool,
        /// External access integration, repeatable
        #[arg(long = "eai-name")]
        external_access_integrations: Vec<String>,
        /// Warehouse for queries issued by the service
        #[arg(long)]
        query_warehouse: Option<String>,
        /// Tag as name=value, repeatable
        #[arg(long = "tag")]
        tags: Vec<Tag>,
        /// Comment for the service
        #[arg(long)]
        comment: Option<String>,
        /// Do nothing if the service already exists
        #[arg(long)]
        if_not_exists: bool,
    },

    /// Run a job service to completion
    ExecuteJob {
        /// Job service name
        name: String,
        /// Compute pool to run the job in
        #[arg(long)]
        compute_pool: String,
        /// Path to the YAML job specification
        #[arg(long)]
        spec_path: PathBuf,
        /// External access integration, repeatable
        #[arg(long = "eai-name")]
        external_access_integrations: Vec<String>,
        /// Warehouse for queries issued by the job
        #[arg(long)]
        query_warehouse: Option<String>,
        /// Comment for the job
        #[arg(long)]
        comment: Option<String>,
    },

    /// Status of the service instances and containers
    Status {
        /// Service name
        name: String,
    },

    /// Container logs
    Logs {
        /// Service name
        name: String,
        /// Container name
        #[arg(long)]
        container_name: String,
        /// Instance id
        #[arg(long)]
        instance_id: String,
        /// Number of trailing lines
        #[arg(long, default_value_t = 500)]
        num_lines: u32,
        /// Logs of the previous container run
        #[arg(long)]
        previous_logs: bool,
        /// Only lines after this timestamp
        #[arg(long, default_value = "")]
        since: String,
        /// Keep timestamps on each line
        #[arg(long)]
        include_timestamps: bool,
        /// Keep polling for new lines until interrupted
        #[arg(long, conflicts_with = "previous_logs")]
        follow: bool,
        /// Seconds between polls in follow mode
        #[arg(long, default_value_t = 2)]
        follow_interval: u64,
    },

    /// Replace the service specification
    Upgrade {
        /// Service name
        name: String,
        /// Path to the YAML service specification
        #[arg(long)]
        spec_path: PathBuf,
    },

    /// Endpoints exposed by the service
    ListEndpoints {
        /// Service name
        name: String,
    },

    /// Service instances
    ListInstances {
        /// Service name
        name: String,
    },

    /// Service containers
    ListContainers {
        /// Service name
        name: String,
    },

    /// Service roles
    ListRoles {
        /// Service name
        name: String,
    },

    /// Suspend the service
    Suspend {
        /// Service name
        name: String,
    },

    /// Resume the service
    Resume {
        /// Service name
        name: String,
    },

    /// Set service properties
    Set {
        /// Service name
        name: String,
        /// Minimum number of instances
        #[arg(long)]
        min_instances: Option<u32>,
        /// Maximum number of instances
        #[arg(long)]
        max_instances: Option<u32>,
        /// Warehouse for queries issued by the service
        #[arg(long)]
        query_warehouse: Option<String>,
        /// Resume automatically when called
        #[arg(long)]
        auto_resume: Option<bool>,
        /// External access integrations, comma separated
        #[arg(long = "eai-name", value_delimiter = ',')]
        external_access_integrations: Option<Vec<String>>,
        /// Comment for the service
        #[arg(long)]
        comment: Option<String>,
    },

    /// Reset service properties to their defaults
    #[allow(clippy::struct_excessive_bools)]
    Unset {
        /// Service name
        name: String,
        /// Reset min_instances
        #[arg(long)]
        min_instances: bool,
        /// Reset max_instances
        #[arg(long)]
        max_instances: bool,
        /// Reset query_warehouse
        #[arg(long)]
        query_warehouse: bool,
        /// Reset auto_resume
        #[arg(long)]
        auto_resume: bool,
        /// Reset comment
        #[arg(long)]
        comment: bool,
    },
}

/// Token cancelled by Ctrl-C
fn cancel_on_ctrl_c() -> Result<CancellationToken> {
    let token = CancellationToken::new();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start signal handler")?;

    let signal_token = token.clone();
    thread::spawn(move || {
        runtime.block_on(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::debug!("Interrupt received, stopping log stream");
                signal_token.cancel();
            }
        });
    });
    Ok(token)
}

/// Run a service subcommand
#[allow(clippy::too_many_lines)]
pub fn run(command: ServiceCommand, ctx: &CommandContext) -> Result<()> {
    let manager = ServiceManager::new(ctx.executor()?);
    let printer = &ctx.printer;

    match command {
        ServiceCommand::Create {
            name,
            compute_pool,
            spec_path,
            min_instances,
            max_instances,
            auto_resume,
            external_access_integrations,
            query_warehouse,
            tags,
            comment,
            if_not_exists,
        } => {
            let service = CreateService {
                name,
                compute_pool,
                spec_path,
                min_instances,
                max_instances: max_instances.unwrap_or(min_instances),
                auto_resume,
                external_access_integrations,
                query_warehouse,
                tags,
                comment,
                if_not_exists,
            };
            printer.print(&manager.create(&service)?)
        }
        ServiceCommand::ExecuteJob {
            name,
            compute_pool,
            spec_path,
            external_access_integrations,
            query_warehouse,
            comment,
        } => {
            let job = ExecuteJob {
                name,
                compute_pool,
                spec_path,
                external_access_integrations,
                query_warehouse,
                comment,
            };
            printer.print(&manager.execute_job(&job)?)
        }
        ServiceCommand::Status { name } => printer.print(&manager.status(&name)?),
        ServiceCommand::Logs {
            name,
            container_name,
            instance_id,
            num_lines,
            previous_logs,
            since,
            include_timestamps,
            follow,
            follow_interval,
        } => {
            let query = LogsQuery {
                service_name: name,
                instance_id,
                container_name,
                num_lines,
                previous_logs,
                since_timestamp: since,
                include_timestamps,
            };

            if follow {
                let cancel = cancel_on_ctrl_c()?;
                let interval = Duration::from_secs(follow_interval);
                for line in manager.stream_logs(query, interval, cancel) {
                    println!("{}", line?);
                }
            } else {
                for block in manager.logs(&query)? {
                    println!("{block}");
                }
            }
            Ok(())
        }
        ServiceCommand::Upgrade { name, spec_path } => {
            printer.print(&manager.upgrade_spec(&name, &spec_path)?)
        }
        ServiceCommand::ListEndpoints { name } => printer.print(&manager.list_endpoints(&name)?),
        ServiceCommand::ListInstances { name } => printer.print(&manager.list_instances(&name)?),
        ServiceCommand::ListContainers { name } => {
            printer.print(&manager.list_containers(&name)?)
        }
        ServiceCommand::ListRoles { name } => printer.print(&manager.list_roles(&name)?),
        ServiceCommand::Suspend { name } => printer.print(&manager.suspend(&name)?),
        ServiceCommand::Resume { name } => printer.print(&manager.resume(&name)?),
        ServiceCommand::Set {
            name,
            min_instances,
            max_instances,
            query_warehouse,
            auto_resume,
            external_access_integrations,
            comment,
        } => {
            let properties = ServiceProperties {
                min_instances,
                max_instances,
                query_warehouse,
                auto_resume,
                external_access_integrations,
                comment,
            };
            printer.print(&manager.set_property(&name, &properties)?)
        }
        ServiceCommand::Unset {
            name,
            min_instances,
            max_instances,
            query_warehouse,
            auto_resume,
            comment,
        } => {
            let flags = ServicePropertyFlags {
                min_instances,
                max_instances,
                query_warehouse,
                auto_resume,
                comment,
            };
            printer.print(&manager.unset_property(&name, flags)?)
        }
    }
}
