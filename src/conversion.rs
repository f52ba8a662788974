// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Conversion of v1 project definitions into the v2 schema
//!
//! Each v1 family is converted on its own, then the three entity maps are
//! checked for name collisions and merged (snowpark, streamlit, native app).
//! The result is returned to the caller; nothing is written here.

use std::path::Path;

use indexmap::IndexMap;
use thiserror::Error;
use tracing::warn;

use crate::bundle::{build_bundle, to_posix, BundleError};
use crate::project::common::{
    is_name_a_templated_one, Artifact, EnvMap, Identifier, PathMapping, PostDeployHook,
    QualifiedIdentifier, PROJECT_TEMPLATE_VARIABLE_OPENING,
};
use crate::project::v1::{CallableSchema, NativeApp, ProjectDefinition, Snowpark, Streamlit};
use crate::project::v2::{
    ApplicationEntityModel, ApplicationPackageEntityModel, EntityMeta, EntityModel,
    FunctionEntityModel, Mixin, ProcedureEntityModel, ProjectDefinitionV2, SnowparkEntityModel,
    StreamlitEntityModel, TargetField,
};

/// Mixin holding the stage and artifacts shared by all callables
pub const SNOWPARK_SHARED_MIXIN: &str = "snowpark_shared";
/// Conventional environment file picked up when none is declared
pub const DEFAULT_ENV_FILE: &str = "environment.yml";
/// Conventional pages directory picked up when none is declared
pub const DEFAULT_PAGES_DIR: &str = "pages";
/// Entity name used for a templated streamlit name
pub const STREAMLIT_TEMPLATED_NAME: &str = "streamlit_entity_1";
/// Entity name of the converted application package
pub const PACKAGE_ENTITY_NAME: &str = "pkg";
/// Entity name of the converted application
pub const APPLICATION_ENTITY_NAME: &str = "app";

const MANIFEST_FILENAME: &str = "manifest.yml";

/// Reasons a migration is refused
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Input is already v2
    #[error("Project definition is already at version 2.")]
    AlreadyMigrated,
    /// Template placeholders present and not accepted
    #[error(
        "Project definition contains templates. They may not be migrated correctly, and require \
         manual migration. You can try again with --accept-templates option, to attempt automatic \
         migration."
    )]
    TemplatesNotAccepted,
    /// Legacy package scripts have no v2 equivalent
    #[error(
        "Your project file contains a native app definition that uses package scripts. Package \
         scripts are not supported in definition version 2 and require manual conversion to \
         post-deploy scripts."
    )]
    PackageScriptsUnsupported,
    /// Two callables end up with the same entity name
    #[error("Entity with name {0} seems to be duplicated. Please rename it and try again.")]
    DuplicateEntity(String),
    /// Two families share an entity name
    #[error("In your project, {first} and {second} entities share the same name. Please rename them and try again.")]
    NameCollision {
        /// First family
        first: &'static str,
        /// Second family
        second: &'static str,
    },
    /// Declared streamlit file does not exist
    #[error("Provided file {0} does not exist")]
    MissingStreamlitFile(String),
    /// Bundling the native app artifacts failed
    #[error("{0}\nCould not bundle Native App artifacts, unable to perform migration")]
    BundleFailed(#[source] BundleError),
    /// No artifact deploys to `manifest.yml`
    #[error(
        "manifest.yml file not found in any Native App artifact sources, unable to perform migration"
    )]
    ManifestNotFound,
    /// Definition could not be rendered for inspection
    #[error("Failed to inspect project definition: {0}")]
    Inspect(#[from] serde_yaml::Error),
}

/// Entities keyed by name, in insertion order
pub type EntityMap = IndexMap<String, EntityModel>;

/// Convert a v1 definition rooted at `project_root` into a v2 definition
///
/// With `accept_templates` a definition containing template placeholders is
/// converted on a best-effort basis and a warning is logged.
pub fn convert_project_definition_to_v2(
    project_root: &Path,
    pd: &ProjectDefinition,
    accept_templates: bool,
) -> Result<ProjectDefinitionV2, ConversionError> {
    check_requirements(pd, accept_templates)?;

    let (mixins, snowpark_entities) = match &pd.snowpark {
        Some(snowpark) => {
            let (mixin, entities) = convert_snowpark_to_v2(snowpark)?;
            let mut mixins = IndexMap::new();
            mixins.insert(SNOWPARK_SHARED_MIXIN.to_string(), mixin);
            (Some(mixins), entities)
        }
        None => (None, EntityMap::new()),
    };
    let streamlit_entities = match &pd.streamlit {
        Some(streamlit) => convert_streamlit_to_v2(project_root, streamlit)?,
        None => EntityMap::new(),
    };
    let native_app_entities = match &pd.native_app {
        Some(native_app) => convert_native_app_to_v2(project_root, native_app)?,
        None => EntityMap::new(),
    };

    Ok(ProjectDefinitionV2 {
        definition_version: "2".into(),
        entities: merge_entities(snowpark_entities, streamlit_entities, native_app_entities)?,
        mixins,
        env: convert_envs_to_v2(pd),
    })
}

fn check_requirements(pd: &ProjectDefinition, accept_templates: bool) -> Result<(), ConversionError> {
    if pd.meets_version_requirement(2) {
        return Err(ConversionError::AlreadyMigrated);
    }

    if serde_yaml::to_string(pd)?.contains(PROJECT_TEMPLATE_VARIABLE_OPENING) {
        if !accept_templates {
            return Err(ConversionError::TemplatesNotAccepted);
        }
        warn!("Your V1 definition contains templates. We cannot guarantee the correctness of the migration.");
    }

    let uses_scripts = pd
        .native_app
        .as_ref()
        .and_then(|app| app.package.as_ref())
        .is_some_and(|package| !package.scripts.is_empty());
    if uses_scripts {
        return Err(ConversionError::PackageScriptsUnsupported);
    }
    Ok(())
}

/// Convert the `snowpark` section into the shared mixin and callable entities
pub fn convert_snowpark_to_v2(snowpark: &Snowpark) -> Result<(Mixin, EntityMap), ConversionError> {
    let mixin = Mixin {
        stage: Some(snowpark.stage_name.clone()),
        artifacts: Some(vec![Artifact::Mapping(PathMapping {
            src: snowpark.src.clone(),
            dest: snowpark.project_name.clone().filter(|name| !name.is_empty()),
        })]),
    };

    let procedures = snowpark
        .procedures
        .iter()
        .map(|p| (&p.callable, Some(p.execute_as_caller)));
    let functions = snowpark.functions.iter().map(|f| (&f.callable, None));

    let mut entities = EntityMap::new();
    for (index, (callable, execute_as_caller)) in procedures.chain(functions).enumerate() {
        let entity_name = if is_name_a_templated_one(&callable.name) {
            format!("snowpark_entity_{index}")
        } else {
            callable.name.clone()
        };

        if entities.contains_key(&entity_name) {
            return Err(ConversionError::DuplicateEntity(entity_name));
        }

        let model = callable_to_v2(callable);
        let entity = match execute_as_caller {
            Some(execute_as_caller) => EntityModel::Procedure(ProcedureEntityModel {
                callable: model,
                execute_as_caller,
            }),
            None => EntityModel::Function(FunctionEntityModel { callable: model }),
        };
        entities.insert(entity_name, entity);
    }

    Ok((mixin, entities))
}

fn callable_to_v2(callable: &CallableSchema) -> SnowparkEntityModel {
    SnowparkEntityModel {
        identifier: Identifier::Qualified(QualifiedIdentifier {
            name: callable.name.clone(),
            database: callable.database.clone(),
            schema: callable.schema_name.clone(),
        }),
        handler: callable.handler.clone(),
        returns: callable.returns.clone(),
        signature: callable.signature.clone(),
        runtime: callable.runtime.clone(),
        external_access_integrations: callable.external_access_integrations.clone(),
        secrets: callable.secrets.clone(),
        imports: callable.imports.clone(),
        stage: None,
        artifacts: None,
        meta: Some(EntityMeta {
            use_mixins: vec![SNOWPARK_SHARED_MIXIN.to_string()],
            ..EntityMeta::default()
        }),
    }
}

/// Convert the `streamlit` section into a single streamlit entity
pub fn convert_streamlit_to_v2(
    project_root: &Path,
    streamlit: &Streamlit,
) -> Result<EntityMap, ConversionError> {
    let environment_file =
        resolve_streamlit_file(project_root, streamlit.env_file.as_deref(), DEFAULT_ENV_FILE)?;
    let pages_dir =
        resolve_streamlit_file(project_root, streamlit.pages_dir.as_deref(), DEFAULT_PAGES_DIR)?;

    let mut artifacts: Vec<Artifact> = [Some(streamlit.main_file.clone()), environment_file, pages_dir.clone()]
        .into_iter()
        .flatten()
        .map(Artifact::Path)
        .collect();
    if let Some(extra) = &streamlit.additional_source_files {
        artifacts.extend(extra.iter().cloned().map(Artifact::Path));
    }

    let name = if is_name_a_templated_one(&streamlit.name) {
        STREAMLIT_TEMPLATED_NAME.to_string()
    } else {
        streamlit.name.clone()
    };

    let entity = EntityModel::Streamlit(StreamlitEntityModel {
        identifier: Identifier::Qualified(QualifiedIdentifier {
            name: streamlit.name.clone(),
            database: streamlit.database.clone(),
            schema: streamlit.schema_name.clone(),
        }),
        title: streamlit.title.clone(),
        query_warehouse: streamlit.query_warehouse.clone(),
        main_file: streamlit.main_file.clone(),
        pages_dir,
        stage: Some(streamlit.stage.clone()),
        artifacts,
        meta: None,
    });

    let mut entities = EntityMap::new();
    entities.insert(name, entity);
    Ok(entities)
}

/// Explicit files must exist; otherwise fall back to the conventional path when present
fn resolve_streamlit_file(
    project_root: &Path,
    declared: Option<&str>,
    default: &str,
) -> Result<Option<String>, ConversionError> {
    match declared {
        Some(file) if !project_root.join(file).exists() => {
            Err(ConversionError::MissingStreamlitFile(file.to_string()))
        }
        Some(file) => Ok(Some(file.to_string())),
        None if project_root.join(default).exists() => Ok(Some(default.to_string())),
        None => Ok(None),
    }
}

fn make_meta(
    role: Option<&String>,
    warehouse: Option<&String>,
    post_deploy: Option<&Vec<PostDeployHook>>,
) -> Option<EntityMeta> {
    let meta = EntityMeta {
        use_mixins: Vec::new(),
        role: role.filter(|r| !r.is_empty()).cloned(),
        warehouse: warehouse.filter(|w| !w.is_empty()).cloned(),
        post_deploy: post_deploy.filter(|hooks| !hooks.is_empty()).cloned(),
    };
    (!meta.is_empty()).then_some(meta)
}

fn find_manifest(project_root: &Path, native_app: &NativeApp) -> Result<String, ConversionError> {
    let bundle = build_bundle(
        project_root,
        Path::new(&native_app.deploy_root),
        &native_app.artifacts,
    )
    .map_err(ConversionError::BundleFailed)?;

    bundle
        .to_project_path(Path::new(MANIFEST_FILENAME))
        .map(|path| to_posix(&path))
        .ok_or(ConversionError::ManifestNotFound)
}

/// Convert the `native_app` section into a package entity and an application entity
pub fn convert_native_app_to_v2(
    project_root: &Path,
    native_app: &NativeApp,
) -> Result<EntityMap, ConversionError> {
    let package_section = native_app.package.as_ref();
    let application_section = native_app.application.as_ref();

    let package_identifier = package_section
        .and_then(|p| p.name.clone())
        .unwrap_or_else(|| format!("{}_pkg", native_app.name));

    let package = ApplicationPackageEntityModel {
        identifier: Identifier::Name(package_identifier),
        manifest: find_manifest(project_root, native_app)?,
        artifacts: native_app.artifacts.clone(),
        bundle_root: native_app.bundle_root.clone(),
        generated_root: native_app.generated_root.clone(),
        deploy_root: native_app.deploy_root.clone(),
        stage: native_app.source_stage.clone(),
        scratch_stage: native_app.scratch_stage.clone(),
        distribution: package_section.map(|p| p.distribution.clone()),
        meta: package_section
            .and_then(|p| make_meta(p.role.as_ref(), p.warehouse.as_ref(), p.post_deploy.as_ref())),
    };

    let application = ApplicationEntityModel {
        identifier: Identifier::Name(
            application_section
                .and_then(|a| a.name.clone())
                .unwrap_or_else(|| native_app.name.clone()),
        ),
        from_package: TargetField {
            target: PACKAGE_ENTITY_NAME.to_string(),
        },
        meta: application_section
            .and_then(|a| make_meta(a.role.as_ref(), a.warehouse.as_ref(), a.post_deploy.as_ref())),
    };

    let mut entities = EntityMap::new();
    entities.insert(
        PACKAGE_ENTITY_NAME.to_string(),
        EntityModel::ApplicationPackage(package),
    );
    entities.insert(
        APPLICATION_ENTITY_NAME.to_string(),
        EntityModel::Application(application),
    );
    Ok(entities)
}

/// Copy environment variables; `None` when the v1 file declares none
#[must_use]
pub fn convert_envs_to_v2(pd: &ProjectDefinition) -> Option<EnvMap> {
    pd.env.as_ref().filter(|env| !env.is_empty()).cloned()
}

/// Fail on any name shared between two families, then merge in family order
pub fn merge_entities(
    snowpark: EntityMap,
    streamlit: EntityMap,
    native_app: EntityMap,
) -> Result<EntityMap, ConversionError> {
    let pairs: [(&'static str, &EntityMap, &'static str, &EntityMap); 3] = [
        ("streamlit", &streamlit, "snowpark", &snowpark),
        ("streamlit", &streamlit, "native app", &native_app),
        ("native app", &native_app, "snowpark", &snowpark),
    ];
    for (first, first_entities, second, second_entities) in pairs {
        if first_entities.keys().any(|name| second_entities.contains_key(name)) {
            return Err(ConversionError::NameCollision { first, second });
        }
    }

    let mut merged = snowpark;
    merged.extend(streamlit);
    merged.extend(native_app);
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_v1(yaml: &str) -> ProjectDefinition {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn convert(yaml: &str) -> Result<ProjectDefinitionV2, ConversionError> {
        convert_project_definition_to_v2(Path::new("."), &parse_v1(yaml), false)
    }

    const SNOWPARK: &str = r#"
definition_version: 1
snowpark:
  stage_name: "@mystage"
  src: "src/"
  procedures:
    - name: get_data
      handler: app.get_data
      signature: ""
      returns: string
    - name: "<% ctx.env.PROC %>"
      handler: app.templated
      signature: ""
      returns: string
      execute_as_caller: true
  functions:
    - name: hello
      handler: app.hello
      signature: ""
      returns: string
      database: db
      schema: public
    - name: "<% ctx.env.FN %>"
      handler: app.templated_fn
      signature: ""
      returns: string
"#;

    #[test]
    fn test_single_procedure_example() {
        let pd = convert(
            r#"
definition_version: 1
snowpark:
  stage_name: "@mystage"
  src: "src/"
  procedures:
    - name: get_data
      handler: app.get_data
      signature: ""
      returns: string
"#,
        )
        .unwrap();

        assert_eq!(pd.definition_version, "2");
        let mixins = pd.mixins.as_ref().unwrap();
        assert_eq!(mixins.len(), 1);
        let mixin = &mixins[SNOWPARK_SHARED_MIXIN];
        assert_eq!(mixin.stage.as_deref(), Some("@mystage"));
        assert_eq!(
            mixin.artifacts,
            Some(vec![Artifact::Mapping(PathMapping {
                src: "src/".into(),
                dest: None,
            })])
        );

        assert_eq!(pd.entities.len(), 1);
        let entity = &pd.entities["get_data"];
        assert_eq!(entity.type_name(), "procedure");
        assert_eq!(entity.use_mixins(), [SNOWPARK_SHARED_MIXIN.to_string()]);
        let callable = entity.as_callable().unwrap();
        assert!(callable.stage.is_none());
        assert!(callable.artifacts.is_none());
        assert!(pd.env.is_none());
        assert!(pd.validate().is_ok());
    }

    #[test]
    fn test_templated_callables_are_renamed_by_position() {
        let pd = convert_project_definition_to_v2(Path::new("."), &parse_v1(SNOWPARK), true).unwrap();

        let names: Vec<_> = pd.entities.keys().cloned().collect();
        assert_eq!(
            names,
            vec!["get_data", "snowpark_entity_1", "hello", "snowpark_entity_3"]
        );
        let EntityModel::Procedure(templated) = &pd.entities["snowpark_entity_1"] else {
            panic!("expected a procedure");
        };
        assert!(templated.execute_as_caller);
        assert_eq!(
            templated.callable.identifier.name(),
            "<% ctx.env.PROC %>"
        );
        assert_eq!(pd.entities["snowpark_entity_3"].type_name(), "function");
        assert_eq!(
            pd.entities["hello"].as_callable().unwrap().identifier,
            Identifier::Qualified(QualifiedIdentifier {
                name: "hello".into(),
                database: Some("db".into()),
                schema: Some("public".into()),
            })
        );
    }

    #[test]
    fn test_templates_require_opt_in() {
        assert!(matches!(
            convert(SNOWPARK),
            Err(ConversionError::TemplatesNotAccepted)
        ));
    }

    #[test]
    fn test_already_migrated() {
        assert!(matches!(
            convert("definition_version: 2\n"),
            Err(ConversionError::AlreadyMigrated)
        ));
    }

    #[test]
    fn test_duplicate_callable_names() {
        let err = convert(
            r#"
definition_version: 1
snowpark:
  stage_name: dev
  src: app/
  procedures:
    - name: same
      handler: a.b
      signature: ""
      returns: string
  functions:
    - name: same
      handler: a.c
      signature: ""
      returns: string
"#,
        )
        .unwrap_err();

        assert!(matches!(err, ConversionError::DuplicateEntity(name) if name == "same"));
    }

    #[test]
    fn test_project_name_becomes_destination() {
        let pd = convert(
            "definition_version: 1\nsnowpark:\n  project_name: my_project\n  stage_name: dev\n  src: app/\n",
        )
        .unwrap();

        let mixin = &pd.mixins.as_ref().unwrap()[SNOWPARK_SHARED_MIXIN];
        assert_eq!(mixin.artifacts.as_ref().unwrap()[0].dest(), Some("my_project"));
        assert!(pd.entities.is_empty());
    }

    #[test]
    fn test_env_copied() {
        let pd = convert("definition_version: 1\nenv:\n  FOO: bar\n  COUNT: 3\n").unwrap();

        let env = pd.env.unwrap();
        assert_eq!(env["FOO"].as_str(), Some("bar"));
        assert_eq!(env["COUNT"].as_i64(), Some(3));
        assert!(pd.mixins.is_none());
    }

    fn entity_map(names: &[&str]) -> EntityMap {
        let template = EntityModel::Application(ApplicationEntityModel {
            identifier: Identifier::Name("x".into()),
            from_package: TargetField { target: "pkg".into() },
            meta: None,
        });
        names
            .iter()
            .map(|name| ((*name).to_string(), template.clone()))
            .collect()
    }

    #[test]
    fn test_every_family_collision_is_reported() {
        let cases = [
            (["a"], ["a"], ["z"], ("streamlit", "snowpark")),
            (["z"], ["a"], ["a"], ("streamlit", "native app")),
            (["a"], ["z"], ["a"], ("native app", "snowpark")),
        ];

        for (snowpark, streamlit, native_app, expected) in cases {
            let err = merge_entities(
                entity_map(&snowpark),
                entity_map(&streamlit),
                entity_map(&native_app),
            )
            .unwrap_err();
            match err {
                ConversionError::NameCollision { first, second } => {
                    assert_eq!((first, second), expected);
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_merge_keeps_family_order() {
        let merged = merge_entities(
            entity_map(&["s1", "s2"]),
            entity_map(&["dash"]),
            entity_map(&["pkg", "app"]),
        )
        .unwrap();

        let names: Vec<_> = merged.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["s1", "s2", "dash", "pkg", "app"]);
    }
}
