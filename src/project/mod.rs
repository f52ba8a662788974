// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Project definition models and loading
//!
//! A project is described by `snowflake.yml` at its root. Two schema
//! versions exist: v1 groups entities by family (`snowpark`, `streamlit`,
//! `native_app`), v2 keeps every entity in one `entities` map.

pub mod common;
pub mod v1;
pub mod v2;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use common::{is_name_a_templated_one, Artifact, Identifier, PathMapping};
pub use v1::ProjectDefinition;
pub use v2::{EntityModel, ProjectDefinitionV2};

/// File name of the project definition
pub const DEFINITION_FILENAME: &str = "snowflake.yml";
/// Where the v1 definition is kept after migration
pub const V1_BACKUP_FILENAME: &str = "snowflake_V1.yml";

/// Errors raised while reading a project definition
#[derive(Debug, Error)]
pub enum ProjectError {
    /// No definition file in the project root
    #[error("Cannot find project definition (snowflake.yml) in {}", .0.display())]
    NotFound(PathBuf),
    /// File exists but cannot be read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// File is not valid for the schema
    #[error("Invalid project definition {path}: {source}")]
    Parse {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_yaml::Error,
    },
    /// `definition_version` is missing or unknown
    #[error("Unsupported definition_version: {0}")]
    UnsupportedVersion(String),
}

/// A parsed definition of either version
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectDefinitionFile {
    /// Version 1 document
    V1(ProjectDefinition),
    /// Version 2 document
    V2(ProjectDefinitionV2),
}

impl ProjectDefinitionFile {
    /// Version tag as written in the file
    #[must_use]
    pub fn definition_version(&self) -> &str {
        match self {
            Self::V1(pd) => &pd.definition_version,
            Self::V2(pd) => &pd.definition_version,
        }
    }
}

/// Path of `snowflake.yml` under a project root
#[must_use]
pub fn definition_path(project_root: &Path) -> PathBuf {
    project_root.join(DEFINITION_FILENAME)
}

fn read_definition(project_root: &Path) -> Result<(PathBuf, String), ProjectError> {
    let path = definition_path(project_root);
    if !path.exists() {
        return Err(ProjectError::NotFound(project_root.to_path_buf()));
    }
    let content = fs::read_to_string(&path).map_err(|source| ProjectError::Io {
        path: path.clone(),
        source,
    })?;
    Ok((path, content))
}

/// Parse a definition, choosing the model from its `definition_version`
pub fn parse_project_definition(
    content: &str,
    path: &Path,
) -> Result<ProjectDefinitionFile, ProjectError> {
    let parse_error = |source| ProjectError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let raw: serde_yaml::Value = serde_yaml::from_str(content).map_err(parse_error)?;
    let version = match raw.get("definition_version") {
        Some(serde_yaml::Value::String(s)) => s.clone(),
        Some(serde_yaml::Value::Number(n)) => n.to_string(),
        Some(other) => return Err(ProjectError::UnsupportedVersion(format!("{other:?}"))),
        None => return Err(ProjectError::UnsupportedVersion("<missing>".into())),
    };

    match common::major_version(&version) {
        Some(1) => Ok(ProjectDefinitionFile::V1(
            serde_yaml::from_value(raw).map_err(parse_error)?,
        )),
        Some(2) => Ok(ProjectDefinitionFile::V2(
            serde_yaml::from_value(raw).map_err(parse_error)?,
        )),
        _ => Err(ProjectError::UnsupportedVersion(version)),
    }
}

/// Load `snowflake.yml` from a project root
pub fn load_project_definition(project_root: &Path) -> Result<ProjectDefinitionFile, ProjectError> {
    let (path, content) = read_definition(project_root)?;
    tracing::debug!("Loading project definition from {}", path.display());
    parse_project_definition(&content, &path)
}

/// Load `snowflake.yml` through the v1 model regardless of its version tag
///
/// Keys that only exist in v2 are ignored, so a v2 file still parses and the
/// caller can report that it is already migrated.
pub fn load_v1_unrendered(project_root: &Path) -> Result<ProjectDefinition, ProjectError> {
    let (path, content) = read_definition(project_root)?;
    serde_yaml::from_str(&content).map_err(|source| ProjectError::Parse { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_picks_model_by_version() {
        let dir = TempDir::new().unwrap();
        fs::write(
            definition_path(dir.path()),
            "definition_version: 1\nstreamlit:\n  name: app\n  query_warehouse: wh\n",
        )
        .unwrap();
        let pd = load_project_definition(dir.path()).unwrap();
        assert!(matches!(pd, ProjectDefinitionFile::V1(_)));
        assert_eq!(pd.definition_version(), "1");

        fs::write(definition_path(dir.path()), "definition_version: '2'\nentities: {}\n").unwrap();
        let pd = load_project_definition(dir.path()).unwrap();
        assert!(matches!(pd, ProjectDefinitionFile::V2(_)));
    }

    #[test]
    fn test_load_missing_and_unknown_version() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            load_project_definition(dir.path()),
            Err(ProjectError::NotFound(_))
        ));

        fs::write(definition_path(dir.path()), "definition_version: 7\n").unwrap();
        assert!(matches!(
            load_project_definition(dir.path()),
            Err(ProjectError::UnsupportedVersion(v)) if v == "7"
        ));
    }

    #[test]
    fn test_v1_model_accepts_v2_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            definition_path(dir.path()),
            "definition_version: 2\nentities:\n  x:\n    type: function\n",
        )
        .unwrap();
        let pd = load_v1_unrendered(dir.path()).unwrap();
        assert!(pd.meets_version_requirement(2));
    }
}
