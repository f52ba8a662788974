// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Compute pool commands

use anyhow::Result;
use clap::{ArgAction, Subcommand};

use super::CommandContext;
use crate::spcs::{
    ComputePoolManager, ComputePoolProperties, ComputePoolPropertyFlags, CreateComputePool, Tag,
};

/// `snow spcs compute-pool` subcommands
#[derive(Debug, Subcommand)]
pub enum ComputePoolCommand {
    /// Create a compute pool
    Create {
        /// Pool name
        name: String,
        /// Machine type, e.g. CPU_X64_XS
        #[arg(long)]
        family: String,
        /// Minimum number of nodes
        #[arg(long, default_value_t = 1)]
        min_nodes: u32,
        /// Maximum number of nodes (defaults to --min-nodes)
        #[arg(long)]
        max_nodes: Option<u32>,
        /// Resume when a service or job is submitted
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        auto_resume: bool,
        /// Create the pool in a suspended state
        #[arg(long)]
        init_suspend: bool,
        /// Idle seconds before the pool suspends
        #[arg(long, default_value_t = 3600)]
        auto_suspend_secs: u32,
        /// Tag as name=value, repeatable
        #[arg(long = "tag")]
        tags: Vec<Tag>,
        /// Comment for the pool
        #[arg(long)]
        comment: Option<String>,
        /// Do nothing if the pool already exists
        #[arg(long)]
        if_not_exists: bool,
    },

    /// Pool status
    Status {
        /// Pool name
        name: String,
    },

    /// Stop every service in the pool
    StopAll {
        /// Pool name
        name: String,
    },

    /// Suspend the pool
    Suspend {
        /// Pool name
        name: String,
    },

    /// Resume the pool
    Resume {
        /// Pool name
        name: String,
    },

    /// Set pool properties
    Set {
        /// Pool name
        name: String,
        /// Minimum number of nodes
        #[arg(long)]
        min_nodes: Option<u32>,
        /// Maximum number of nodes
        #[arg(long)]
        max_nodes: Option<u32>,
        /// Resume automatically
        #[arg(long)]
        auto_resume: Option<bool>,
        /// Idle seconds before the pool suspends
        #[arg(long)]
        auto_suspend_secs: Option<u32>,
        /// Comment for the pool
        #[arg(long)]
        comment: Option<String>,
    },

    /// Reset pool properties to their defaults
    Unset {
        /// Pool name
        name: String,
        /// Reset auto_resume
        #[arg(long)]
        auto_resume: bool,
        /// Reset auto_suspend_secs
        #[arg(long)]
        auto_suspend_secs: bool,
        /// Reset comment
        #[arg(long)]
        comment: bool,
    },
}

/// Run a compute-pool subcommand
pub fn run(command: ComputePoolCommand, ctx: &CommandContext) -> Result<()> {
    let manager = ComputePoolManager::new(ctx.executor()?);
    let printer = &ctx.printer;

    let result = match command {
        ComputePoolCommand::Create {
            name,
            family,
            min_nodes,
            max_nodes,
            auto_resume,
            init_suspend,
            auto_suspend_secs,
            tags,
            comment,
            if_not_exists,
        } => manager.create(&CreateComputePool {
            name,
            min_nodes,
            max_nodes: max_nodes.unwrap_or(min_nodes),
            instance_family: family,
            auto_resume,
            initially_suspended: init_suspend,
            auto_suspend_secs,
            tags,
            comment,
            if_not_exists,
        })?,
        ComputePoolCommand::Status { name } => manager.status(&name)?,
        ComputePoolCommand::StopAll { name } => manager.stop_all(&name)?,
        ComputePoolCommand::Suspend { name } => manager.suspend(&name)?,
        ComputePoolCommand::Resume { name } => manager.resume(&name)?,
        ComputePoolCommand::Set {
            name,
            min_nodes,
            max_nodes,
            auto_resume,
            auto_suspend_secs,
            comment,
        } => manager.set_property(
            &name,
            &ComputePoolProperties {
                min_nodes,
                max_nodes,
                auto_resume,
                auto_suspend_secs,
                comment,
            },
        )?,
        ComputePoolCommand::Unset {
            name,
            auto_resume,
            auto_suspend_secs,
            comment,
        } => manager.unset_property(
            &name,
            ComputePoolPropertyFlags {
                auto_resume,
                auto_suspend_secs,
                comment,
            },
        )?,
    };

    printer.print(&result)
}
