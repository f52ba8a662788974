// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Helpers shared by the service and compute-pool managers

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};

use crate::error::{ObjectType, ResourceError};
use crate::sql::SqlError;

/// Upper bound for specification files
pub const SPEC_FILE_SIZE_LIMIT_BYTES: u64 = 128 * 1024 * 1024;

/// Trim every line, drop blank ones and join the rest with `\n`
pub fn strip_empty_lines<I, S>(lines: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter_map(|line| {
            let line = line.as_ref().trim();
            (!line.is_empty()).then(|| line.to_string())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Single-quoted SQL string literal
#[must_use]
pub fn to_string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Object tag given as `name=value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Tag name
    pub name: String,
    /// Tag value
    pub value: String,
}

impl Tag {
    /// Tag value quoted for use in a `WITH TAG` clause
    #[must_use]
    pub fn value_string_literal(&self) -> String {
        to_string_literal(&self.value)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value_string_literal())
    }
}

impl FromStr for Tag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, value) = s
            .split_once('=')
            .ok_or_else(|| format!("tag '{s}' must have the form name=value"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("tag '{s}' has an empty name"));
        }
        Ok(Self {
            name: name.to_string(),
            value: value.to_string(),
        })
    }
}

/// `WITH TAG (a='x',b='y')`
pub(crate) fn tag_clause(tags: &[Tag]) -> Option<String> {
    if tags.is_empty() {
        return None;
    }
    let list = tags.iter().map(Tag::to_string).collect::<Vec<_>>().join(",");
    Some(format!("WITH TAG ({list})"))
}

/// Map "already exists" backend failures to [`ResourceError::ObjectAlreadyExists`]
#[must_use]
pub fn handle_object_already_exists(
    err: SqlError,
    object_type: ObjectType,
    name: &str,
) -> ResourceError {
    match &err {
        SqlError::Programming { errno: Some(2002), message, .. }
            if message.contains("already exists") =>
        {
            ResourceError::ObjectAlreadyExists {
                object_type,
                name: name.to_string(),
            }
        }
        _ => ResourceError::Sql(err),
    }
}

/// Read a YAML specification file and return it as compact JSON
pub fn read_spec_as_json(path: &Path) -> Result<String, ResourceError> {
    let spec_error = |reason: String| ResourceError::SpecFile {
        path: path.to_path_buf(),
        reason,
    };

    let size = fs::metadata(path).map_err(|e| spec_error(e.to_string()))?.len();
    if size > SPEC_FILE_SIZE_LIMIT_BYTES {
        return Err(spec_error(format!(
            "file is {size} bytes, limit is {SPEC_FILE_SIZE_LIMIT_BYTES}"
        )));
    }

    let content = fs::read_to_string(path).map_err(|e| spec_error(e.to_string()))?;
    let spec: serde_json::Value =
        serde_yaml::from_str(&content).map_err(|e| spec_error(e.to_string()))?;
    serde_json::to_string(&spec).map_err(|e| spec_error(e.to_string()))
}

/// Leading timestamp token of a log line
#[must_use]
pub fn log_timestamp(line: &str) -> &str {
    line.split_once(' ').map_or(line, |(ts, _)| ts)
}

/// Leading timestamp of a log line, when it is RFC 3339
#[must_use]
pub fn parse_log_timestamp(line: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(log_timestamp(line)).ok()
}

/// Drop the leading timestamp unless timestamps were requested
#[must_use]
pub fn filter_log_timestamp(line: &str, include_timestamps: bool) -> &str {
    if include_timestamps {
        return line;
    }
    line.split_once(' ').map_or(line, |(_, rest)| rest)
}

/// Lines of `new` that were not already delivered in `prev`
///
/// `new` is sorted first; its ISO-8601 prefixes make that chronological.
/// Previous records are compared from the newest backwards and stop at the
/// first one older than the oldest new record. Each match removes one copy.
#[must_use]
pub fn new_logs_only(prev: &[String], new: &[String]) -> Vec<String> {
    let mut fresh = new.to_vec();
    fresh.sort();

    let Some(first) = fresh.first().cloned() else {
        return fresh;
    };

    for prev_line in prev.iter().rev() {
        if *prev_line < first {
            break;
        }
        if let Some(pos) = fresh.iter().position(|line| line == prev_line) {
            fresh.remove(pos);
        }
    }
    fresh
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_strip_empty_lines() {
        let query = strip_empty_lines(["  CREATE SERVICE x", "", "   ", "  IN COMPUTE POOL p  "]);
        assert_eq!(query, "CREATE SERVICE x\nIN COMPUTE POOL p");
    }

    #[test]
    fn test_tag_parsing_and_quoting() {
        let tag: Tag = "owner=it's\\mine".parse().unwrap();
        assert_eq!(tag.name, "owner");
        assert_eq!(tag.value_string_literal(), r"'it\'s\\mine'");
        assert_eq!(tag.to_string(), r"owner='it\'s\\mine'");

        assert!("novalue".parse::<Tag>().is_err());
        assert!("=x".parse::<Tag>().is_err());
        assert_eq!(
            "k=a=b".parse::<Tag>().unwrap().value,
            "a=b",
        );
    }

    #[test]
    fn test_already_exists_mapping() {
        let err = SqlError::Programming {
            errno: Some(2002),
            sql_state: Some("42710".into()),
            message: "Object 'SVC' already exists.".into(),
        };
        assert!(matches!(
            handle_object_already_exists(err, ObjectType::Service, "svc"),
            ResourceError::ObjectAlreadyExists { name, .. } if name == "svc"
        ));

        let err = SqlError::Programming {
            errno: Some(2003),
            sql_state: None,
            message: "does not exist".into(),
        };
        assert!(matches!(
            handle_object_already_exists(err, ObjectType::Service, "svc"),
            ResourceError::Sql(_)
        ));
    }

    #[test]
    fn test_filter_log_timestamp() {
        let line = "2024-10-22T01:12:29.873896187Z Count: 1";
        assert_eq!(filter_log_timestamp(line, true), line);
        assert_eq!(filter_log_timestamp(line, false), "Count: 1");
        assert_eq!(filter_log_timestamp("bare", false), "bare");
        assert_eq!(log_timestamp(line), "2024-10-22T01:12:29.873896187Z");
        assert!(parse_log_timestamp(line).is_some());
        assert!(parse_log_timestamp("not a timestamp").is_none());
    }

    #[test]
    fn test_new_logs_only_drops_overlap() {
        let prev = lines(&["2024-01-01T00:00:01Z a", "2024-01-01T00:00:02Z b"]);
        let new = lines(&["2024-01-01T00:00:03Z c", "2024-01-01T00:00:02Z b"]);

        assert_eq!(new_logs_only(&prev, &new), lines(&["2024-01-01T00:00:03Z c"]));
    }

    #[test]
    fn test_new_logs_only_keeps_same_timestamp_different_text() {
        let prev = lines(&["2024-01-01T00:00:02Z b"]);
        let new = lines(&["2024-01-01T00:00:02Z b", "2024-01-01T00:00:02Z b2"]);

        assert_eq!(new_logs_only(&prev, &new), lines(&["2024-01-01T00:00:02Z b2"]));
        assert!(new_logs_only(&prev, &[]).is_empty());
    }

    #[test]
    fn test_read_spec_as_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("spec.yml");
        fs::write(
            &path,
            "spec:\n  containers:\n    - name: echo\n      image: /db/schema/repo/echo:latest\n",
        )
        .unwrap();

        let json = read_spec_as_json(&path).unwrap();
        assert!(!json.contains('\n'));
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&json).unwrap(),
            serde_json::json!({
                "spec": {"containers": [{"name": "echo", "image": "/db/schema/repo/echo:latest"}]}
            })
        );
        assert!(matches!(
            read_spec_as_json(&dir.path().join("missing.yml")),
            Err(ResourceError::SpecFile { .. })
        ));
    }
}
