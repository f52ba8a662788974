// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Version 1 project definition: one section per entity family

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::common::{
    deserialize_runtime, deserialize_version, major_version, Artifact, EnvMap, PostDeployHook,
    Signature,
};

/// Root of a v1 `snowflake.yml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDefinition {
    /// Schema version tag, `"1"` or `"1.1"` for this model
    #[serde(deserialize_with = "deserialize_version")]
    pub definition_version: String,
    /// Procedures and functions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snowpark: Option<Snowpark>,
    /// Dashboard application
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streamlit: Option<Streamlit>,
    /// Packaged application
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_app: Option<NativeApp>,
    /// Environment variables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<EnvMap>,
}

impl ProjectDefinition {
    /// True when the version tag is at least `required`
    #[must_use]
    pub fn meets_version_requirement(&self, required: u32) -> bool {
        major_version(&self.definition_version).is_some_and(|major| major >= required)
    }
}

/// `snowpark` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snowpark {
    /// Project name, used as the artifact destination
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    /// Stage the code is uploaded to
    pub stage_name: String,
    /// Folder holding the code
    pub src: String,
    /// Declared functions
    #[serde(default)]
    pub functions: Vec<FunctionSchema>,
    /// Declared procedures
    #[serde(default)]
    pub procedures: Vec<ProcedureSchema>,
}

/// Fields common to functions and procedures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallableSchema {
    /// Object name, possibly a template
    pub name: String,
    /// Target database
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Target schema
    #[serde(rename = "schema", default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    /// Handler inside the source module
    pub handler: String,
    /// Result type
    pub returns: String,
    /// Argument list
    pub signature: Signature,
    /// Language runtime version
    #[serde(
        default,
        deserialize_with = "deserialize_runtime",
        skip_serializing_if = "Option::is_none"
    )]
    pub runtime: Option<String>,
    /// External access integrations
    #[serde(default)]
    pub external_access_integrations: Vec<String>,
    /// Secret variable bindings
    #[serde(default)]
    pub secrets: IndexMap<String, String>,
    /// Staged imports
    #[serde(default)]
    pub imports: Vec<String>,
}

/// Function declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    /// Shared callable fields
    #[serde(flatten)]
    pub callable: CallableSchema,
}

/// Procedure declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureSchema {
    /// Shared callable fields
    #[serde(flatten)]
    pub callable: CallableSchema,
    /// Run with the caller's privileges instead of the owner's
    #[serde(default)]
    pub execute_as_caller: bool,
}

fn default_streamlit_stage() -> String {
    "streamlit".into()
}

fn default_main_file() -> String {
    "streamlit_app.py".into()
}

/// `streamlit` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Streamlit {
    /// App name, possibly a template
    pub name: String,
    /// Target database
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Target schema
    #[serde(rename = "schema", default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    /// Stage the app files are uploaded to
    #[serde(default = "default_streamlit_stage")]
    pub stage: String,
    /// Warehouse running the app queries
    pub query_warehouse: String,
    /// Entry point
    #[serde(default = "default_main_file")]
    pub main_file: String,
    /// Conda environment file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_file: Option<String>,
    /// Directory with extra pages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages_dir: Option<String>,
    /// Other files uploaded with the app
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_source_files: Option<Vec<String>>,
    /// Display title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

pub(super) fn default_source_stage() -> String {
    "app_src.stage".into()
}

pub(super) fn default_scratch_stage() -> String {
    "app_src.stage_snowflake_cli_scratch".into()
}

pub(super) fn default_bundle_root() -> String {
    "output/bundle/".into()
}

pub(super) fn default_deploy_root() -> String {
    "output/deploy/".into()
}

pub(super) fn default_generated_root() -> String {
    "__generated/".into()
}

pub(super) fn default_distribution() -> String {
    "internal".into()
}

/// `native_app` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeApp {
    /// Project name, base for default object names
    pub name: String,
    /// Files bundled into the application package
    pub artifacts: Vec<Artifact>,
    /// Stage files are uploaded to
    #[serde(default = "default_source_stage")]
    pub source_stage: String,
    /// Scratch stage used during deploys
    #[serde(default = "default_scratch_stage")]
    pub scratch_stage: String,
    /// Where the bundle is assembled
    #[serde(default = "default_bundle_root")]
    pub bundle_root: String,
    /// Where deployable files are written
    #[serde(default = "default_deploy_root")]
    pub deploy_root: String,
    /// Generated files, relative to the deploy root
    #[serde(default = "default_generated_root")]
    pub generated_root: String,
    /// Application package settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<Package>,
    /// Application settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<Application>,
}

/// `native_app.package` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    /// Legacy package scripts (not representable in v2)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scripts: Vec<String>,
    /// Role owning the package
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Package name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Warehouse for package scripts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<String>,
    /// `internal` or `external`
    #[serde(default = "default_distribution")]
    pub distribution: String,
    /// Hooks run after deploy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_deploy: Option<Vec<PostDeployHook>>,
}

/// `native_app.application` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    /// Role owning the application
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Application name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Warehouse for setup scripts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<String>,
    /// Debug mode flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
    /// Hooks run after deploy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_deploy: Option<Vec<PostDeployHook>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let pd: ProjectDefinition = serde_yaml::from_str(
            r#"
definition_version: 1
snowpark:
  stage_name: dev_deployment
  src: app/
  procedures:
    - name: hello_procedure
      handler: procedures.hello_procedure
      signature:
        - name: name
          type: string
      returns: string
      runtime: 3.10
streamlit:
  name: dashboard
  query_warehouse: wh
native_app:
  name: myapp
  artifacts:
    - setup.sql
  package:
    role: pkg_role
"#,
        )
        .unwrap();

        assert_eq!(pd.definition_version, "1");
        let snowpark = pd.snowpark.as_ref().unwrap();
        let procedure = &snowpark.procedures[0];
        assert!(!procedure.execute_as_caller);
        assert!(procedure.callable.external_access_integrations.is_empty());
        assert!(procedure.callable.secrets.is_empty());
        assert!(procedure.callable.imports.is_empty());
        assert_eq!(procedure.callable.runtime.as_deref(), Some("3.1"));

        let streamlit = pd.streamlit.as_ref().unwrap();
        assert_eq!(streamlit.stage, "streamlit");
        assert_eq!(streamlit.main_file, "streamlit_app.py");

        let native_app = pd.native_app.as_ref().unwrap();
        assert_eq!(native_app.source_stage, "app_src.stage");
        assert_eq!(native_app.deploy_root, "output/deploy/");
        let package = native_app.package.as_ref().unwrap();
        assert_eq!(package.distribution, "internal");
        assert!(package.scripts.is_empty());
        assert!(package.warehouse.is_none());
    }

    #[test]
    fn test_version_requirement() {
        let pd: ProjectDefinition = serde_yaml::from_str("definition_version: '1.1'").unwrap();
        assert!(pd.meets_version_requirement(1));
        assert!(!pd.meets_version_requirement(2));

        let pd: ProjectDefinition = serde_yaml::from_str("definition_version: 2").unwrap();
        assert!(pd.meets_version_requirement(2));
    }
}
