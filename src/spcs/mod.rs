// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Snowpark Container Services resource managers

pub mod common;
pub mod compute_pools;
pub mod logs;
pub mod services;

pub use common::Tag;
pub use compute_pools::{
    ComputePoolManager, ComputePoolProperties, ComputePoolPropertyFlags, CreateComputePool,
};
pub use logs::{CancellationToken, LogStream};
pub use services::{
    CreateService, ExecuteJob, LogsQuery, ServiceManager, ServiceProperties, ServicePropertyFlags,
};
