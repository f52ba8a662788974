// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Follow-mode log streaming and overlap deduplication

use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

use proptest::prelude::*;
use snowcli::spcs::common::new_logs_only;
use snowcli::spcs::{CancellationToken, LogsQuery, ServiceManager};
use snowcli::{QueryResult, ResourceError, SqlError, SqlExecutor};

/// Backend replaying one log batch per call, cancelling once the script runs out
struct ScriptedExecutor {
    batches: RefCell<VecDeque<Result<Vec<&'static str>, i64>>>,
    queries: RefCell<Vec<String>>,
    cancel: CancellationToken,
}

impl ScriptedExecutor {
    fn new(batches: Vec<Result<Vec<&'static str>, i64>>, cancel: &CancellationToken) -> Self {
        Self {
            batches: RefCell::new(batches.into()),
            queries: RefCell::new(Vec::new()),
            cancel: cancel.clone(),
        }
    }
}

impl SqlExecutor for ScriptedExecutor {
    fn execute_query(&self, query: &str) -> Result<QueryResult, SqlError> {
        self.queries.borrow_mut().push(query.to_string());
        match self.batches.borrow_mut().pop_front() {
            Some(Ok(blocks)) => Ok(QueryResult::from_strings("SYSTEM$GET_SERVICE_LOGS", blocks)),
            Some(Err(errno)) => Err(SqlError::Programming {
                errno: Some(errno),
                sql_state: None,
                message: "Service is not running".into(),
            }),
            None => {
                self.cancel.cancel();
                Ok(QueryResult::default())
            }
        }
    }
}

fn query(include_timestamps: bool) -> LogsQuery {
    LogsQuery {
        service_name: "svc".into(),
        instance_id: "0".into(),
        container_name: "main".into(),
        num_lines: 50,
        previous_logs: false,
        since_timestamp: String::new(),
        include_timestamps,
    }
}

fn since_of(query: &str) -> String {
    query.split('\'').nth(7).unwrap_or_default().to_string()
}

#[test]
fn test_follow_deduplicates_and_advances_cursor() {
    let cancel = CancellationToken::new();
    let executor = ScriptedExecutor::new(
        vec![
            Ok(vec!["2024-01-01T00:00:01Z one\n2024-01-01T00:00:02Z two\n"]),
            Ok(vec!["2024-01-01T00:00:02Z two", "2024-01-01T00:00:03Z three"]),
            Ok(vec!["2024-01-01T00:00:03Z three"]),
            Ok(vec!["  ", "2024-01-01T00:00:04Z four"]),
        ],
        &cancel,
    );
    let manager = ServiceManager::new(&executor);

    let lines: Vec<String> = manager
        .stream_logs(query(false), Duration::ZERO, cancel.clone())
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(lines, vec!["one", "two", "three", "four"]);

    let queries = executor.queries.borrow();
    let cursors: Vec<String> = queries.iter().map(|q| since_of(q)).collect();
    assert_eq!(
        cursors,
        vec![
            "",
            "2024-01-01T00:00:02Z",
            "2024-01-01T00:00:03Z",
            "2024-01-01T00:00:03Z",
            "2024-01-01T00:00:04Z",
        ]
    );
    assert!(queries.iter().all(|q| q.ends_with(", true);")));
}

#[test]
fn test_follow_can_keep_timestamps() {
    let cancel = CancellationToken::new();
    let executor = ScriptedExecutor::new(vec![Ok(vec!["2024-01-01T00:00:01Z one"])], &cancel);
    let manager = ServiceManager::new(&executor);

    let lines: Vec<String> = manager
        .stream_logs(query(true), Duration::ZERO, cancel.clone())
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(lines, vec!["2024-01-01T00:00:01Z one"]);
}

#[test]
fn test_cancelled_stream_never_polls() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let executor = ScriptedExecutor::new(vec![Ok(vec!["2024-01-01T00:00:01Z one"])], &cancel);
    let manager = ServiceManager::new(&executor);

    assert_eq!(
        manager
            .stream_logs(query(false), Duration::from_secs(60), cancel.clone())
            .count(),
        0
    );
    assert!(executor.queries.borrow().is_empty());
}

#[test]
fn test_backend_error_ends_stream() {
    let cancel = CancellationToken::new();
    let executor = ScriptedExecutor::new(
        vec![Ok(vec!["2024-01-01T00:00:01Z one"]), Err(3001), Ok(vec!["2024-01-01T00:00:02Z two"])],
        &cancel,
    );
    let manager = ServiceManager::new(&executor);

    let items: Vec<_> = manager
        .stream_logs(query(false), Duration::ZERO, cancel.clone())
        .collect();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_deref().ok(), Some("one"));
    assert!(matches!(items[1], Err(ResourceError::Sql(_))));
    assert_eq!(executor.queries.borrow().len(), 2);
}

fn timestamped(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("2024-01-01T00:{:02}:{:02}Z line {i}", i / 60, i % 60))
        .collect()
}

proptest! {
    #[test]
    fn overlapping_batches_yield_each_line_once(
        count in 1usize..120,
        split in 0usize..120,
        overlap in 0usize..120,
    ) {
        let lines = timestamped(count);
        let k = split % (count + 1);
        let j = k - overlap.min(k);

        let prev = lines[..k].to_vec();
        let mut new: Vec<String> = lines[j..].to_vec();
        new.reverse();

        let fresh = new_logs_only(&prev, &new);

        prop_assert_eq!(&fresh[..], &lines[k..]);
        let mut merged = prev.clone();
        merged.extend(fresh);
        prop_assert_eq!(merged, lines);
    }
}
