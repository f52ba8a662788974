// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Helper commands - project definition migration

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::conversion::convert_project_definition_to_v2;
use crate::output::Printer;
use crate::project::{definition_path, load_v1_unrendered, V1_BACKUP_FILENAME};

/// `snow helpers` subcommands
#[derive(Debug, Subcommand)]
pub enum HelpersCommand {
    /// Migrate snowflake.yml from definition version 1 to version 2
    #[command(name = "v1-to-v2")]
    V1ToV2 {
        /// Migrate even if the definition contains template placeholders
        #[arg(long)]
        accept_templates: bool,

        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: PathBuf,
    },
}

/// Run a helpers subcommand
pub fn run(command: HelpersCommand, printer: &Printer) -> Result<()> {
    match command {
        HelpersCommand::V1ToV2 {
            accept_templates,
            project,
        } => {
            migrate(&project, accept_templates)?;
            printer.message("Project definition migrated to version 2.")
        }
    }
}

/// Convert `snowflake.yml` in place, keeping the v1 file as `snowflake_V1.yml`
///
/// Nothing on disk changes unless the conversion succeeds.
pub fn migrate(project_root: &Path, accept_templates: bool) -> Result<()> {
    let definition = load_v1_unrendered(project_root)?;
    let migrated = convert_project_definition_to_v2(project_root, &definition, accept_templates)?;
    let yaml = serde_yaml::to_string(&migrated).context("Failed to serialize migrated definition")?;

    let current = definition_path(project_root);
    let backup = project_root.join(V1_BACKUP_FILENAME);
    fs::rename(&current, &backup)
        .with_context(|| format!("Failed to move {} to {}", current.display(), backup.display()))?;
    fs::write(&current, yaml)
        .with_context(|| format!("Failed to write {}", current.display()))?;

    tracing::info!(
        "Migrated {} to version 2, previous definition kept in {}",
        current.display(),
        backup.display()
    );
    Ok(())
}
