// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Field types shared by both definition versions

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Opening marker of a template placeholder (`<% ctx.env.FOO %>`)
pub const PROJECT_TEMPLATE_VARIABLE_OPENING: &str = "<%";
/// Closing marker of a template placeholder
pub const PROJECT_TEMPLATE_VARIABLE_CLOSING: &str = "%>";

/// Environment variables declared in a definition, in declaration order
pub type EnvMap = IndexMap<String, serde_yaml::Value>;

/// Whether a name is produced by a template rather than written literally
#[must_use]
pub fn is_name_a_templated_one(name: &str) -> bool {
    name.contains(PROJECT_TEMPLATE_VARIABLE_OPENING)
        && name.contains(PROJECT_TEMPLATE_VARIABLE_CLOSING)
}

/// Object identifier: either a bare name or a qualified name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    /// Plain object name
    Name(String),
    /// Name with optional database and schema
    Qualified(QualifiedIdentifier),
}

impl Identifier {
    /// Object name without qualification
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Qualified(q) => &q.name,
        }
    }
}

/// Identifier with database and schema parts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualifiedIdentifier {
    /// Object name
    pub name: String,
    /// Database the object lives in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Schema the object lives in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

/// Explicit source to destination mapping for an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMapping {
    /// Source path or glob, relative to the project root
    pub src: String,
    /// Destination inside the deploy root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,
}

/// A declared artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Artifact {
    /// Bare path, deployed under the same relative path
    Path(String),
    /// Mapping with an explicit destination
    Mapping(PathMapping),
}

impl Artifact {
    /// Source path or glob
    #[must_use]
    pub fn src(&self) -> &str {
        match self {
            Self::Path(src) => src,
            Self::Mapping(m) => &m.src,
        }
    }

    /// Explicit destination, if any
    #[must_use]
    pub fn dest(&self) -> Option<&str> {
        match self {
            Self::Path(_) => None,
            Self::Mapping(m) => m.dest.as_deref(),
        }
    }
}

impl From<&str> for Artifact {
    fn from(src: &str) -> Self {
        Self::Path(src.to_string())
    }
}

/// SQL script run after an application or package is deployed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDeployHook {
    /// Path to the script, relative to the project root
    pub sql_script: String,
}

/// Single callable argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    /// Argument name
    pub name: String,
    /// SQL type of the argument
    #[serde(rename = "type")]
    pub arg_type: String,
    /// Default value expression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// Callable signature, either raw SQL text or a list of arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Signature {
    /// Signature written as a string, e.g. `""` or `"(a int)"`
    Raw(String),
    /// Structured argument list
    Arguments(Vec<Argument>),
}

/// Accepts `runtime: "3.8"` as well as `runtime: 3.8` and keeps the string form
pub(crate) fn deserialize_runtime<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RuntimeInput {
        Text(String),
        Number(f64),
    }

    Ok(Option::<RuntimeInput>::deserialize(deserializer)?.map(|input| match input {
        RuntimeInput::Text(text) => text,
        RuntimeInput::Number(number) => format!("{number:?}"),
    }))
}

/// Accepts `definition_version: 1` as well as `definition_version: "1"`
pub(crate) fn deserialize_version<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum VersionInput {
        Text(String),
        Integer(i64),
        Float(f64),
    }

    Ok(match VersionInput::deserialize(deserializer)? {
        VersionInput::Text(text) => text,
        VersionInput::Integer(number) => number.to_string(),
        VersionInput::Float(number) => number.to_string(),
    })
}

/// Major component of a version tag such as `"1"` or `"1.1"`
#[must_use]
pub fn major_version(version: &str) -> Option<u32> {
    version.trim().split('.').next()?.parse().ok()
}
