// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! SQL REST API backend

use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

use super::{QueryResult, SqlError, SqlExecutor};
use crate::config::ConnectionConfig;

const STATEMENTS_PATH: &str = "/api/v2/statements";
const STATEMENT_TIMEOUT_SECS: u64 = 600;
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Executes statements through `POST /api/v2/statements`
#[derive(Debug, Clone)]
pub struct RestExecutor {
    client: Client,
    base_url: String,
    token: String,
    token_type: Option<String>,
    connection: ConnectionConfig,
}

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    sql_state: Option<String>,
    #[serde(default)]
    statement_handle: Option<String>,
    #[serde(default)]
    result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    #[serde(default)]
    row_type: Vec<RowType>,
    #[serde(default)]
    partition_info: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RowType {
    name: String,
}

/// Base URL for a connection: explicit host, else `<account>.snowflakecomputing.com`
fn base_url(connection: &ConnectionConfig) -> Result<String, SqlError> {
    match (&connection.host, &connection.account) {
        (Some(host), _) if host.starts_with("http://") || host.starts_with("https://") => {
            Ok(host.trim_end_matches('/').to_string())
        }
        (Some(host), _) => Ok(format!("https://{}", host.trim_end_matches('/'))),
        (None, Some(account)) => Ok(format!("https://{account}.snowflakecomputing.com")),
        (None, None) => Err(SqlError::Config(
            "either 'host' or 'account' must be set".into(),
        )),
    }
}

impl RestExecutor {
    /// Build an executor from a configured connection
    pub fn from_connection(connection: &ConnectionConfig) -> Result<Self, SqlError> {
        let token = connection
            .token
            .clone()
            .ok_or_else(|| SqlError::Config("'token' must be set".into()))?;
        let base_url = base_url(connection)?;

        let client = Client::builder()
            .user_agent(concat!("snowcli/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(STATEMENT_TIMEOUT_SECS + 30))
            .build()?;

        Ok(Self {
            client,
            base_url,
            token,
            token_type: connection.authenticator.clone(),
            connection: connection.clone(),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json");
        match &self.token_type {
            Some(token_type) => request.header("X-Snowflake-Authorization-Token-Type", token_type),
            None => request,
        }
    }

    fn statement_url(&self, handle: &str) -> String {
        format!("{}{STATEMENTS_PATH}/{handle}", self.base_url)
    }

    fn get(&self, url: &str) -> Result<(u16, StatementResponse), SqlError> {
        let response = self.authorized(self.client.get(url)).send()?;
        read_response(response)
    }
}

fn read_response(response: Response) -> Result<(u16, StatementResponse), SqlError> {
    let status = response.status();
    let text = response.text()?;
    let body: StatementResponse = if text.trim().is_empty() {
        StatementResponse::default()
    } else {
        serde_json::from_str(&text)
            .map_err(|e| SqlError::Decode(format!("HTTP {status}: {e}")))?
    };

    if status.is_success() {
        Ok((status.as_u16(), body))
    } else {
        Err(SqlError::Programming {
            errno: body.code.as_deref().and_then(|c| c.parse().ok()),
            sql_state: body.sql_state,
            message: body.message.unwrap_or_else(|| status.to_string()),
        })
    }
}

fn into_result(body: StatementResponse) -> (QueryResult, usize) {
    let meta = body.result_set_meta_data.unwrap_or_default();
    let partitions = meta.partition_info.len();
    let result = QueryResult {
        columns: meta.row_type.into_iter().map(|r| r.name).collect(),
        rows: body.data,
    };
    (result, partitions)
}

impl SqlExecutor for RestExecutor {
    fn execute_query(&self, query: &str) -> Result<QueryResult, SqlError> {
        tracing::debug!("Executing query: {query}");

        let request = StatementRequest {
            statement: query,
            timeout: STATEMENT_TIMEOUT_SECS,
            database: self.connection.database.as_deref(),
            schema: self.connection.schema.as_deref(),
            warehouse: self.connection.warehouse.as_deref(),
            role: self.connection.role.as_deref(),
        };
        let response = self
            .authorized(self.client.post(format!("{}{STATEMENTS_PATH}", self.base_url)))
            .json(&request)
            .send()?;
        let (mut status, mut body) = read_response(response)?;

        while status == 202 {
            let handle = body
                .statement_handle
                .clone()
                .ok_or_else(|| SqlError::Decode("asynchronous response without a statement handle".into()))?;
            tracing::debug!("Statement {handle} still running");
            thread::sleep(POLL_INTERVAL);
            (status, body) = self.get(&self.statement_url(&handle))?;
        }

        let handle = body.statement_handle.clone();
        let (mut result, partitions) = into_result(body);

        if partitions > 1 {
            let handle = handle
                .ok_or_else(|| SqlError::Decode("partitioned result without a statement handle".into()))?;
            for partition in 1..partitions {
                let url = format!("{}?partition={partition}", self.statement_url(&handle));
                let (_, page) = self.get(&url)?;
                result.rows.extend(page.data);
            }
        }

        tracing::debug!("Query returned {} row(s)", result.rows.len());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url() {
        let mut connection = ConnectionConfig {
            account: Some("acme-dev".into()),
            ..Default::default()
        };
        assert_eq!(
            base_url(&connection).unwrap(),
            "https://acme-dev.snowflakecomputing.com"
        );

        connection.host = Some("localhost:8080/".into());
        assert_eq!(base_url(&connection).unwrap(), "https://localhost:8080");

        connection.host = Some("http://127.0.0.1:9000".into());
        assert_eq!(base_url(&connection).unwrap(), "http://127.0.0.1:9000");

        assert!(matches!(
            base_url(&ConnectionConfig::default()),
            Err(SqlError::Config(_))
        ));
    }

    #[test]
    fn test_token_is_required() {
        let connection = ConnectionConfig {
            account: Some("acme".into()),
            ..Default::default()
        };
        assert!(matches!(
            RestExecutor::from_connection(&connection),
            Err(SqlError::Config(_))
        ));
    }

    #[test]
    fn test_decode_result_set() {
        let body: StatementResponse = serde_json::from_str(
            r#"{
                "code": "090001",
                "statementHandle": "01b2-0000",
                "resultSetMetaData": {
                    "numRows": 2,
                    "partitionInfo": [{"rowCount": 1}, {"rowCount": 1}],
                    "rowType": [{"name": "SYSTEM$GET_SERVICE_STATUS", "type": "text"}]
                },
                "data": [["[{\"status\":\"READY\"}]"]]
            }"#,
        )
        .unwrap();

        let (result, partitions) = into_result(body);
        assert_eq!(partitions, 2);
        assert_eq!(result.columns, vec!["SYSTEM$GET_SERVICE_STATUS"]);
        assert_eq!(result.first_column_strings(), vec![r#"[{"status":"READY"}]"#]);
    }
}
