// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Artifact bundling - resolves declared artifacts into deploy-root paths
//!
//! The bundle is computed in memory: every concrete source file is paired
//! with the destination it would occupy under the deploy root. Nothing is
//! copied.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use globset::GlobBuilder;
use thiserror::Error;
use walkdir::WalkDir;

use crate::project::Artifact;

/// Errors raised while resolving artifacts
#[derive(Debug, Error)]
pub enum BundleError {
    /// Non-glob source does not exist
    #[error("Source path {0} does not exist")]
    SourceNotFound(PathBuf),
    /// Glob matched no file
    #[error("No match was found for the specified source in the project directory: {0}")]
    NoMatches(String),
    /// Glob source with a non-directory destination
    #[error("The specified destination path {dest} for source {src} must be a directory, ending with '/'")]
    DestinationNotDirectory {
        /// Source glob
        src: String,
        /// Offending destination
        dest: String,
    },
    /// Path leaves the project or deploy root
    #[error("Path {0} must be relative and stay inside its root")]
    OutsideRoot(String),
    /// Two sources resolve to the same destination
    #[error("Multiple file or directories were mapped to one output destination: {dest} ({first} and {second})")]
    Conflict {
        /// Shared destination
        dest: PathBuf,
        /// Source registered first
        first: PathBuf,
        /// Source registered second
        second: PathBuf,
    },
    /// Invalid glob pattern
    #[error("Invalid artifact pattern: {0}")]
    Pattern(#[from] globset::Error),
    /// Directory walk failed
    #[error("Failed to walk project directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Resolved bundle: destination path -> project-relative source path
#[derive(Debug, Clone)]
pub struct BundleMap {
    project_root: PathBuf,
    deploy_root: PathBuf,
    mappings: BTreeMap<PathBuf, PathBuf>,
}

/// Resolve `artifacts` against `project_root`
///
/// `deploy_root` is skipped while matching globs so that previous deploy
/// output never feeds back into the bundle.
pub fn build_bundle(
    project_root: &Path,
    deploy_root: &Path,
    artifacts: &[Artifact],
) -> Result<BundleMap, BundleError> {
    let mut bundle = BundleMap {
        project_root: project_root.to_path_buf(),
        deploy_root: project_root.join(deploy_root),
        mappings: BTreeMap::new(),
    };

    for artifact in artifacts {
        if is_glob(artifact.src()) {
            bundle.add_glob(artifact.src(), artifact.dest())?;
        } else {
            bundle.add_path(artifact.src(), artifact.dest())?;
        }
    }

    tracing::debug!("Bundle resolved {} file(s)", bundle.mappings.len());
    Ok(bundle)
}

impl BundleMap {
    /// Project-relative source of the file deployed at `dest`
    #[must_use]
    pub fn to_project_path(&self, dest: &Path) -> Option<PathBuf> {
        let dest = normalize(&dest.to_string_lossy()).ok()?;
        self.mappings.get(&dest).cloned()
    }

    /// Absolute deploy-root location of a destination path
    #[must_use]
    pub fn to_deploy_path(&self, dest: &Path) -> PathBuf {
        self.deploy_root.join(dest)
    }

    /// Iterate over `(source, destination)` pairs ordered by destination
    pub fn iter(&self) -> impl Iterator<Item = (&Path, &Path)> {
        self.mappings
            .iter()
            .map(|(dest, src)| (src.as_path(), dest.as_path()))
    }

    /// Number of bundled files
    #[must_use]
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// True when nothing was bundled
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    fn add_path(&mut self, src: &str, dest: Option<&str>) -> Result<(), BundleError> {
        let src_rel = normalize(src)?;
        if !self.project_root.join(&src_rel).exists() {
            return Err(BundleError::SourceNotFound(PathBuf::from(src)));
        }

        let dest_rel = match dest {
            None => src_rel.clone(),
            Some(d) if is_directory_destination(d) => {
                let base = src_rel.file_name().map(PathBuf::from).unwrap_or_default();
                normalize(d)?.join(base)
            }
            Some(d) => normalize(d)?,
        };

        self.add_tree(&src_rel, &dest_rel)
    }

    fn add_glob(&mut self, pattern: &str, dest: Option<&str>) -> Result<(), BundleError> {
        let dest_dir = match dest {
            Some(d) if !is_directory_destination(d) => {
                return Err(BundleError::DestinationNotDirectory {
                    src: pattern.to_string(),
                    dest: d.to_string(),
                });
            }
            Some(d) => Some(normalize(d)?),
            None => None,
        };

        let normalized = pattern.trim_start_matches("./");
        let matcher = GlobBuilder::new(normalized)
            .literal_separator(true)
            .build()?
            .compile_matcher();

        let root = self.project_root.clone();
        let mut matched = false;
        let mut walker = WalkDir::new(&root).min_depth(1).sort_by_file_name().into_iter();

        while let Some(entry) = walker.next() {
            let entry = entry?;
            let is_dir = entry.file_type().is_dir();
            if is_dir && entry.path().starts_with(&self.deploy_root) {
                walker.skip_current_dir();
                continue;
            }

            let Ok(rel) = entry.path().strip_prefix(&root) else {
                continue;
            };
            if !matcher.is_match(rel) {
                continue;
            }

            matched = true;
            let rel = rel.to_path_buf();
            let dest_rel = match &dest_dir {
                Some(dir) => dir.join(rel.file_name().unwrap_or_default()),
                None => rel.clone(),
            };
            self.add_tree(&rel, &dest_rel)?;

            if is_dir {
                walker.skip_current_dir();
            }
        }

        if matched {
            Ok(())
        } else {
            Err(BundleError::NoMatches(pattern.to_string()))
        }
    }

    fn add_tree(&mut self, src_rel: &Path, dest_rel: &Path) -> Result<(), BundleError> {
        let src_abs = self.project_root.join(src_rel);
        if !src_abs.is_dir() {
            return self.insert(src_rel.to_path_buf(), dest_rel.to_path_buf());
        }

        for entry in WalkDir::new(&src_abs).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }
            if let Ok(inner) = entry.path().strip_prefix(&src_abs) {
                self.insert(src_rel.join(inner), dest_rel.join(inner))?;
            }
        }
        Ok(())
    }

    fn insert(&mut self, src: PathBuf, dest: PathBuf) -> Result<(), BundleError> {
        match self.mappings.get(&dest) {
            Some(existing) if *existing != src => Err(BundleError::Conflict {
                dest,
                first: existing.clone(),
                second: src,
            }),
            Some(_) => Ok(()),
            None => {
                self.mappings.insert(dest, src);
                Ok(())
            }
        }
    }
}

/// Render a relative path with forward slashes
#[must_use]
pub fn to_posix(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_glob(src: &str) -> bool {
    src.contains(['*', '?', '[', '{'])
}

fn is_directory_destination(dest: &str) -> bool {
    dest.ends_with('/') || dest == "." || dest == "./"
}

fn normalize(raw: &str) -> Result<PathBuf, BundleError> {
    let mut out = PathBuf::new();
    for component in Path::new(raw).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(BundleError::OutsideRoot(raw.to_string()));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("app/ui")).unwrap();
        fs::create_dir_all(root.join("output/deploy/app")).unwrap();
        fs::write(root.join("app/manifest.yml"), "manifest_version: 1\n").unwrap();
        fs::write(root.join("app/setup.sql"), "select 1;\n").unwrap();
        fs::write(root.join("app/ui/main.py"), "print()\n").unwrap();
        fs::write(root.join("output/deploy/app/manifest.yml"), "stale\n").unwrap();
        fs::write(root.join("README.md"), "# readme\n").unwrap();
        dir
    }

    fn deploy_root() -> PathBuf {
        PathBuf::from("output/deploy/")
    }

    #[test]
    fn test_glob_into_directory() {
        let dir = project();
        let artifacts = vec![Artifact::Mapping(crate::project::PathMapping {
            src: "app/*".into(),
            dest: Some("./".into()),
        })];

        let bundle = build_bundle(dir.path(), &deploy_root(), &artifacts).unwrap();

        assert_eq!(
            bundle.to_project_path(Path::new("manifest.yml")),
            Some(PathBuf::from("app/manifest.yml"))
        );
        assert_eq!(
            bundle.to_project_path(Path::new("ui/main.py")),
            Some(PathBuf::from("app/ui/main.py"))
        );
        assert_eq!(bundle.len(), 3);
    }

    #[test]
    fn test_plain_paths_keep_relative_location() {
        let dir = project();
        let artifacts = vec![Artifact::from("README.md"), Artifact::from("app")];

        let bundle = build_bundle(dir.path(), &deploy_root(), &artifacts).unwrap();

        assert!(bundle.to_project_path(Path::new("manifest.yml")).is_none());
        assert_eq!(
            bundle.to_project_path(Path::new("app/manifest.yml")),
            Some(PathBuf::from("app/manifest.yml"))
        );
        assert_eq!(
            bundle.to_project_path(Path::new("README.md")),
            Some(PathBuf::from("README.md"))
        );
    }

    #[test]
    fn test_deploy_root_is_not_matched() {
        let dir = project();
        let artifacts = vec![Artifact::from("**/manifest.yml")];

        let bundle = build_bundle(dir.path(), &deploy_root(), &artifacts).unwrap();

        assert_eq!(bundle.len(), 1);
        assert!(bundle
            .to_project_path(Path::new("app/manifest.yml"))
            .is_some());
    }

    #[test]
    fn test_conflicting_destinations() {
        let dir = project();
        let artifacts = vec![
            Artifact::Mapping(crate::project::PathMapping {
                src: "README.md".into(),
                dest: Some("manifest.yml".into()),
            }),
            Artifact::Mapping(crate::project::PathMapping {
                src: "app/manifest.yml".into(),
                dest: Some("manifest.yml".into()),
            }),
        ];

        let err = build_bundle(dir.path(), &deploy_root(), &artifacts).unwrap_err();
        assert!(matches!(err, BundleError::Conflict { .. }));
    }

    #[test]
    fn test_missing_sources() {
        let dir = project();

        let err = build_bundle(dir.path(), &deploy_root(), &[Artifact::from("nope.sql")])
            .unwrap_err();
        assert!(matches!(err, BundleError::SourceNotFound(_)));

        let err = build_bundle(dir.path(), &deploy_root(), &[Artifact::from("*.java")])
            .unwrap_err();
        assert!(matches!(err, BundleError::NoMatches(_)));
    }

    #[test]
    fn test_glob_requires_directory_destination() {
        let dir = project();
        let artifacts = vec![Artifact::Mapping(crate::project::PathMapping {
            src: "app/*.sql".into(),
            dest: Some("setup.sql".into()),
        })];

        let err = build_bundle(dir.path(), &deploy_root(), &artifacts).unwrap_err();
        assert!(matches!(err, BundleError::DestinationNotDirectory { .. }));
    }

    #[test]
    fn test_to_posix() {
        assert_eq!(to_posix(Path::new("app/manifest.yml")), "app/manifest.yml");
    }
}
