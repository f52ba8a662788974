// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Follow-mode log streaming

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::common::{filter_log_timestamp, log_timestamp, new_logs_only, parse_log_timestamp};
use super::services::{LogsQuery, ServiceManager};
use crate::error::ResourceError;
use crate::sql::SqlExecutor;

const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Shared flag that stops a running [`LogStream`]
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Token that has not fired
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once [`cancel`](Self::cancel) was called on any clone
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sleep for `duration`, waking early on cancellation. Returns false when cancelled.
fn sleep_unless_cancelled(duration: Duration, cancel: &CancellationToken) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
}

/// Iterator over log lines of a running container
///
/// Each poll asks for lines since the last delivered timestamp, drops lines
/// already delivered by the previous poll and then sleeps for the interval.
/// The iterator ends after cancellation or the first backend error.
pub struct LogStream<'a, E> {
    manager: &'a ServiceManager<E>,
    query: LogsQuery,
    include_timestamps: bool,
    interval: Duration,
    cancel: CancellationToken,
    previous: Vec<String>,
    pending: VecDeque<String>,
    polled: bool,
    finished: bool,
}

impl<'a, E: SqlExecutor> LogStream<'a, E> {
    pub(crate) fn new(
        manager: &'a ServiceManager<E>,
        query: LogsQuery,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let include_timestamps = query.include_timestamps;
        Self {
            manager,
            query: LogsQuery {
                include_timestamps: true,
                ..query
            },
            include_timestamps,
            interval,
            cancel,
            previous: Vec::new(),
            pending: VecDeque::new(),
            polled: false,
            finished: false,
        }
    }

    /// Timestamp the next poll starts from
    #[must_use]
    pub fn cursor(&self) -> &str {
        &self.query.since_timestamp
    }

    fn poll(&mut self) -> Result<(), ResourceError> {
        let blocks = self.manager.logs(&self.query)?;
        let records: Vec<String> = blocks
            .iter()
            .flat_map(|block| block.split('\n'))
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect();
        if records.is_empty() {
            return Ok(());
        }

        let fresh = new_logs_only(&self.previous, &records);
        let Some(last) = fresh.last() else {
            tracing::debug!("No new log lines since {}", self.query.since_timestamp);
            return Ok(());
        };

        if parse_log_timestamp(last).is_some() {
            self.query.since_timestamp = log_timestamp(last).to_string();
        } else {
            tracing::warn!("Log line without a timestamp, keeping cursor: {last}");
        }
        self.pending.extend(fresh.iter().cloned());
        self.previous = fresh;
        Ok(())
    }
}

impl<E: SqlExecutor> Iterator for LogStream<'_, E> {
    type Item = Result<String, ResourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Some(Ok(
                    filter_log_timestamp(&line, self.include_timestamps).to_string()
                ));
            }
            if self.finished || self.cancel.is_cancelled() {
                return None;
            }
            if self.polled && !sleep_unless_cancelled(self.interval, &self.cancel) {
                return None;
            }
            self.polled = true;

            if let Err(err) = self.poll() {
                self.finished = true;
                return Some(Err(err));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_sleep_returns_early_when_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let started = Instant::now();
        assert!(!sleep_unless_cancelled(Duration::from_secs(30), &token));
        assert!(started.elapsed() < Duration::from_secs(1));

        assert!(sleep_unless_cancelled(Duration::ZERO, &CancellationToken::new()));
    }
}
