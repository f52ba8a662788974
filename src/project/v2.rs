// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Version 2 project definition: a single `entities` map plus shared mixins

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::common::{
    deserialize_runtime, deserialize_version, major_version, Artifact, EnvMap, Identifier,
    PostDeployHook, Signature,
};
use super::v1::{
    default_bundle_root, default_deploy_root, default_generated_root, default_scratch_stage,
    default_source_stage,
};

/// Problems found when checking a v2 definition for internal consistency
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DefinitionError {
    /// Version tag is not 2
    #[error("definition_version {0} is not supported by this schema, expected 2")]
    UnsupportedVersion(String),
    /// No entity with this name
    #[error("No such entity: {0}")]
    UnknownEntity(String),
    /// Entity references a mixin that is not declared
    #[error("Entity {entity} uses undefined mixin {mixin}")]
    UnknownMixin {
        /// Entity name
        entity: String,
        /// Missing mixin name
        mixin: String,
    },
    /// Application points at something that is not an application package
    #[error("Application {entity} targets {target}, which is not an application package entity")]
    InvalidTarget {
        /// Application entity name
        entity: String,
        /// Referenced target
        target: String,
    },
    /// Required field missing even after mixins are applied
    #[error("Entity {entity} is missing required field {field}")]
    MissingField {
        /// Entity name
        entity: String,
        /// Field name
        field: &'static str,
    },
}

/// Root of a v2 `snowflake.yml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDefinitionV2 {
    /// Always `"2"`
    #[serde(deserialize_with = "deserialize_version")]
    pub definition_version: String,
    /// All entities, keyed by entity name
    #[serde(default)]
    pub entities: IndexMap<String, EntityModel>,
    /// Shared field defaults referenced through `meta.use_mixins`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mixins: Option<IndexMap<String, Mixin>>,
    /// Environment variables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<EnvMap>,
}

/// Reusable defaults for entity fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mixin {
    /// Stage shared by the referencing entities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// Artifacts shared by the referencing entities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Vec<Artifact>>,
}

/// Metadata common to every entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMeta {
    /// Mixins applied to this entity, earlier names take precedence
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub use_mixins: Vec<String>,
    /// Role used when deploying
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Warehouse used when deploying
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<String>,
    /// Hooks run after deploy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_deploy: Option<Vec<PostDeployHook>>,
}

impl EntityMeta {
    /// True when no field is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.use_mixins.is_empty()
            && self.role.is_none()
            && self.warehouse.is_none()
            && self.post_deploy.is_none()
    }
}

/// Entity, discriminated by its `type` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EntityModel {
    /// Stored procedure
    #[serde(rename = "procedure")]
    Procedure(ProcedureEntityModel),
    /// User-defined function
    #[serde(rename = "function")]
    Function(FunctionEntityModel),
    /// Dashboard app
    #[serde(rename = "streamlit")]
    Streamlit(StreamlitEntityModel),
    /// Application package
    #[serde(rename = "application package")]
    ApplicationPackage(ApplicationPackageEntityModel),
    /// Application installed from a package
    #[serde(rename = "application")]
    Application(ApplicationEntityModel),
}

impl EntityModel {
    /// Value of the `type` discriminator
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Procedure(_) => "procedure",
            Self::Function(_) => "function",
            Self::Streamlit(_) => "streamlit",
            Self::ApplicationPackage(_) => "application package",
            Self::Application(_) => "application",
        }
    }

    /// Entity metadata, if declared
    #[must_use]
    pub fn meta(&self) -> Option<&EntityMeta> {
        match self {
            Self::Procedure(e) => e.callable.meta.as_ref(),
            Self::Function(e) => e.callable.meta.as_ref(),
            Self::Streamlit(e) => e.meta.as_ref(),
            Self::ApplicationPackage(e) => e.meta.as_ref(),
            Self::Application(e) => e.meta.as_ref(),
        }
    }

    /// Mixins referenced by this entity
    #[must_use]
    pub fn use_mixins(&self) -> &[String] {
        self.meta().map_or(&[], |meta| meta.use_mixins.as_slice())
    }

    /// Callable fields for procedures and functions
    #[must_use]
    pub fn as_callable(&self) -> Option<&SnowparkEntityModel> {
        match self {
            Self::Procedure(e) => Some(&e.callable),
            Self::Function(e) => Some(&e.callable),
            _ => None,
        }
    }
}

/// Fields shared by procedures and functions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnowparkEntityModel {
    /// Object identifier
    pub identifier: Identifier,
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
    /// Stage, usually inherited from a mixin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// Artifacts, usually inherited from a mixin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Vec<Artifact>>,
    /// Metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<EntityMeta>,
}

/// `type: procedure`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureEntityModel {
    /// Shared callable fields
    #[serde(flatten)]
    pub callable: SnowparkEntityModel,
    /// Run with the caller's privileges instead of the owner's
    #[serde(default)]
    pub execute_as_caller: bool,
}

/// `type: function`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionEntityModel {
    /// Shared callable fields
    #[serde(flatten)]
    pub callable: SnowparkEntityModel,
}

/// `type: streamlit`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamlitEntityModel {
    /// Object identifier
    pub identifier: Identifier,
    /// Display title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Warehouse running the app queries
    pub query_warehouse: String,
    /// Entry point
    pub main_file: String,
    /// Directory with extra pages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages_dir: Option<String>,
    /// Stage the app files are uploaded to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// Files uploaded with the app
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    /// Metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<EntityMeta>,
}

/// `type: application package`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationPackageEntityModel {
    /// Package identifier
    pub identifier: Identifier,
    /// Project-relative path of `manifest.yml`
    pub manifest: String,
    /// Files bundled into the package
    pub artifacts: Vec<Artifact>,
    /// Where the bundle is assembled
    #[serde(default = "default_bundle_root")]
    pub bundle_root: String,
    /// Generated files, relative to the deploy root
    #[serde(default = "default_generated_root")]
    pub generated_root: String,
    /// Where deployable files are written
    #[serde(default = "default_deploy_root")]
    pub deploy_root: String,
    /// Stage files are uploaded to
    #[serde(default = "default_source_stage")]
    pub stage: String,
    /// Scratch stage used during deploys
    #[serde(default = "default_scratch_stage")]
    pub scratch_stage: String,
    /// `internal` or `external`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<String>,
    /// Metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<EntityMeta>,
}

/// Reference to another entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetField {
    /// Name of the referenced entity
    pub target: String,
}

/// `type: application`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationEntityModel {
    /// Application identifier
    pub identifier: Identifier,
    /// Package the application is installed from
    #[serde(rename = "from")]
    pub from_package: TargetField,
    /// Metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<EntityMeta>,
}

impl ProjectDefinitionV2 {
    /// Empty definition tagged with version 2
    #[must_use]
    pub fn new() -> Self {
        Self {
            definition_version: "2".into(),
            entities: IndexMap::new(),
            mixins: None,
            env: None,
        }
    }

    fn mixin(&self, name: &str) -> Option<&Mixin> {
        self.mixins.as_ref().and_then(|mixins| mixins.get(name))
    }

    /// Entity with mixin defaults filled in; explicit entity values win
    pub fn resolve_entity(&self, name: &str) -> Result<EntityModel, DefinitionError> {
        let entity = self
            .entities
            .get(name)
            .ok_or_else(|| DefinitionError::UnknownEntity(name.to_string()))?;

        let mut mixins = Vec::new();
        for mixin_name in entity.use_mixins() {
            let mixin = self.mixin(mixin_name).ok_or_else(|| DefinitionError::UnknownMixin {
                entity: name.to_string(),
                mixin: mixin_name.clone(),
            })?;
            mixins.push(mixin);
        }
        let first_stage = || mixins.iter().find_map(|m| m.stage.clone());
        let first_artifacts = || mixins.iter().find_map(|m| m.artifacts.clone());

        let mut resolved = entity.clone();
        match &mut resolved {
            EntityModel::Procedure(ProcedureEntityModel { callable, .. })
            | EntityModel::Function(FunctionEntityModel { callable }) => {
                if callable.stage.is_none() {
                    callable.stage = first_stage();
                }
                if callable.artifacts.is_none() {
                    callable.artifacts = first_artifacts();
                }
            }
            EntityModel::Streamlit(streamlit) => {
                if streamlit.stage.is_none() {
                    streamlit.stage = first_stage();
                }
                if streamlit.artifacts.is_empty() {
                    streamlit.artifacts = first_artifacts().unwrap_or_default();
                }
            }
            EntityModel::ApplicationPackage(_) | EntityModel::Application(_) => {}
        }
        Ok(resolved)
    }

    /// Check cross-entity references and required inherited fields
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if major_version(&self.definition_version) != Some(2) {
            return Err(DefinitionError::UnsupportedVersion(
                self.definition_version.clone(),
            ));
        }

        for (name, entity) in &self.entities {
            let resolved = self.resolve_entity(name)?;

            if let Some(callable) = resolved.as_callable() {
                if callable.stage.is_none() {
                    return Err(DefinitionError::MissingField {
                        entity: name.clone(),
                        field: "stage",
                    });
                }
                if callable.artifacts.is_none() {
                    return Err(DefinitionError::MissingField {
                        entity: name.clone(),
                        field: "artifacts",
                    });
                }
            }

            if let EntityModel::Application(app) = entity {
                let target = &app.from_package.target;
                if !matches!(
                    self.entities.get(target),
                    Some(EntityModel::ApplicationPackage(_))
                ) {
                    return Err(DefinitionError::InvalidTarget {
                        entity: name.clone(),
                        target: target.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl Default for ProjectDefinitionV2 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFINITION: &str = r#"
definition_version: "2"
mixins:
  snowpark_shared:
    stage: "@dev"
    artifacts:
      - src: app/
        dest: my_project
entities:
  hello_procedure:
    type: procedure
    identifier:
      name: hello_procedure
    handler: procedures.hello_procedure
    signature: ""
    returns: string
    runtime: 3.9
    execute_as_caller: true
    meta:
      use_mixins:
        - snowpark_shared
  hello_function:
    type: function
    identifier:
      name: hello_function
    handler: functions.hello_function
    signature:
      - name: name
        type: string
    returns: string
    stage: "@override"
    meta:
      use_mixins:
        - snowpark_shared
  pkg:
    type: application package
    identifier: myapp_pkg
    manifest: app/manifest.yml
    artifacts:
      - src: app/*
        dest: ./
  app:
    type: application
    identifier: myapp
    from:
      target: pkg
"#;

    #[test]
    fn test_parse_tagged_entities() {
        let pd: ProjectDefinitionV2 = serde_yaml::from_str(DEFINITION).unwrap();

        assert_eq!(pd.entities.len(), 4);
        let types: Vec<_> = pd.entities.values().map(EntityModel::type_name).collect();
        assert_eq!(
            types,
            vec!["procedure", "function", "application package", "application"]
        );

        let EntityModel::Procedure(procedure) = &pd.entities["hello_procedure"] else {
            panic!("expected a procedure");
        };
        assert!(procedure.execute_as_caller);
        assert_eq!(procedure.callable.runtime.as_deref(), Some("3.9"));
        assert!(procedure.callable.secrets.is_empty());

        let EntityModel::ApplicationPackage(pkg) = &pd.entities["pkg"] else {
            panic!("expected a package");
        };
        assert_eq!(pkg.stage, "app_src.stage");
        assert!(pkg.distribution.is_none());
    }

    #[test]
    fn test_resolve_entity_applies_mixins() {
        let pd: ProjectDefinitionV2 = serde_yaml::from_str(DEFINITION).unwrap();

        let procedure = pd.resolve_entity("hello_procedure").unwrap();
        let callable = procedure.as_callable().unwrap();
        assert_eq!(callable.stage.as_deref(), Some("@dev"));
        assert_eq!(callable.artifacts.as_ref().unwrap()[0].dest(), Some("my_project"));

        let function = pd.resolve_entity("hello_function").unwrap();
        assert_eq!(function.as_callable().unwrap().stage.as_deref(), Some("@override"));

        assert!(pd.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_mixin() {
        let mut pd: ProjectDefinitionV2 = serde_yaml::from_str(DEFINITION).unwrap();
        pd.mixins = None;

        assert_eq!(
            pd.validate(),
            Err(DefinitionError::UnknownMixin {
                entity: "hello_procedure".into(),
                mixin: "snowpark_shared".into(),
            })
        );
    }

    #[test]
    fn test_validate_rejects_bad_target() {
        let mut pd: ProjectDefinitionV2 = serde_yaml::from_str(DEFINITION).unwrap();
        pd.entities.shift_remove("pkg");

        assert!(matches!(
            pd.validate(),
            Err(DefinitionError::InvalidTarget { .. })
        ));
    }

    #[test]
    fn test_serialized_type_tag() {
        let pd: ProjectDefinitionV2 = serde_yaml::from_str(DEFINITION).unwrap();
        let yaml = serde_yaml::to_string(&pd).unwrap();

        assert!(yaml.contains("type: application package"));
        assert!(yaml.contains("from:\n      target: pkg"));
        let reparsed: ProjectDefinitionV2 = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(reparsed, pd);
    }
}
