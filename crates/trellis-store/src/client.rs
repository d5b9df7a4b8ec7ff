//! Neo4j-compatible transactional HTTP client
//!
//! Every call is one auto-committed transaction posted to
//! `{base}/db/{database}/tx/commit`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use trellis_core::store::{child_properties, source_properties};
use trellis_core::{
    ChildEntity, ExtractionResult, GraphStore, Namespace, SourceKind, SourceLink, StoreError,
    TrellisConfig,
};

use crate::cypher::{self, Statement};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct CommitRequest<'a> {
    statements: [&'a Statement; 1],
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    #[serde(default)]
    results: Vec<QueryResult>,
    #[serde(default)]
    errors: Vec<QueryFailure>,
}

#[derive(Debug, Deserialize)]
struct QueryFailure {
    code: String,
    message: String,
}

/// Rows returned by one statement.
#[derive(Debug, Default, Deserialize)]
pub struct QueryResult {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub data: Vec<Row>,
}

#[derive(Debug, Deserialize)]
pub struct Row {
    pub row: Vec<Value>,
}

impl QueryResult {
    /// Column `index` of every row.
    fn column(&self, index: usize) -> impl Iterator<Item = &Value> {
        self.data.iter().filter_map(move |r| r.row.get(index))
    }

    /// The single integer a `RETURN count(..)` produced.
    fn count(&self) -> Result<usize, StoreError> {
        self.column(0)
            .next()
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .ok_or_else(|| StoreError::Protocol("expected a count in the first row".into()))
    }
}

/// Turn a configured URI into the HTTP base URL.
///
/// Bolt URIs (`bolt://`, `neo4j://`) are mapped to the default HTTP port on the
/// same host since only the HTTP API is spoken here.
pub fn http_base_url(uri: &str) -> String {
    let uri = uri.trim().trim_end_matches('/');
    let Some((scheme, rest)) = uri.split_once("://") else {
        return format!("http://{}", uri);
    };
    match scheme {
        "http" | "https" => uri.to_string(),
        "bolt" | "neo4j" | "bolt+s" | "neo4j+s" | "bolt+ssc" | "neo4j+ssc" => {
            let host = rest.split(['/', '?']).next().unwrap_or_default();
            let host = host.rsplit_once(':').map(|(h, _)| h).unwrap_or(host);
            let secure = scheme.ends_with("+s") || scheme.ends_with("+ssc");
            let url = if secure {
                format!("https://{}:7473", host)
            } else {
                format!("http://{}:7474", host)
            };
            warn!("{} is a Bolt URI; using the HTTP API at {}", uri, url);
            url
        }
        other => {
            warn!("Unknown URI scheme {}; treating {} as HTTP", other, uri);
            format!("http://{}", rest)
        }
    }
}

pub struct HttpGraphStore {
    client: reqwest::Client,
    endpoint: String,
    username: Option<String>,
    password: Option<String>,
}

impl std::fmt::Debug for HttpGraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGraphStore")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .finish()
    }
}

impl HttpGraphStore {
    pub fn new(config: &TrellisConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(config.probe_timeout())
            .build()
            .map_err(|e| StoreError::Protocol(format!("cannot build HTTP client: {}", e)))?;
        let endpoint = format!(
            "{}/db/{}/tx/commit",
            http_base_url(&config.graph_uri),
            config.database
        );
        Ok(Self {
            client,
            endpoint,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Post one statement and return its rows.
    pub async fn run(&self, statement: &Statement) -> Result<QueryResult, StoreError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(&CommitRequest { statements: [statement] });
        if let Some(user) = &self.username {
            request = request.basic_auth(user, self.password.as_ref());
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(StoreError::Unavailable(format!("authentication rejected ({})", status)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Protocol(format!("HTTP {}: {}", status, body)));
        }

        let body: CommitResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Protocol(format!("malformed response: {}", e)))?;
        if let Some(failure) = body.errors.into_iter().next() {
            return Err(StoreError::Query(format!("{}: {}", failure.code, failure.message)));
        }
        Ok(body.results.into_iter().next().unwrap_or_default())
    }
}

fn transport_error(e: reqwest::Error) -> StoreError {
    if e.is_connect() || e.is_timeout() {
        StoreError::Unavailable(e.to_string())
    } else {
        StoreError::Protocol(e.to_string())
    }
}

#[async_trait]
impl GraphStore for HttpGraphStore {
    async fn probe(&self) -> Result<(), StoreError> {
        self.run(&cypher::probe()).await.map(|_| ())
    }

    async fn remove_source(
        &self,
        ns: &Namespace,
        kind: SourceKind,
        path: &str,
    ) -> Result<usize, StoreError> {
        self.run(&cypher::remove_source(ns, kind, path)).await?.count()
    }

    async fn create_source(
        &self,
        ns: &Namespace,
        path: &str,
        result: &ExtractionResult,
    ) -> Result<(), StoreError> {
        let statement =
            cypher::create_source(ns, result.source_kind(), path, source_properties(path, result));
        self.run(&statement).await.map(|_| ())
    }

    async fn create_child(
        &self,
        ns: &Namespace,
        kind: SourceKind,
        owner: &str,
        child: &ChildEntity,
    ) -> Result<(), StoreError> {
        let statement = cypher::create_child(
            ns,
            kind,
            owner,
            child.kind,
            child_properties(kind, owner, child),
        );
        match self.run(&statement).await?.count()? {
            0 => Err(StoreError::Query(format!("no {} entity for {}", kind, owner))),
            _ => Ok(()),
        }
    }

    async fn link_source(
        &self,
        ns: &Namespace,
        kind: SourceKind,
        path: &str,
        link: &SourceLink,
    ) -> Result<(), StoreError> {
        self.run(&cypher::link(ns, kind, path, link)).await.map(|_| ())
    }

    async fn list_sources(
        &self,
        ns: &Namespace,
        kind: SourceKind,
    ) -> Result<Vec<String>, StoreError> {
        let result = self.run(&cypher::list_sources(ns, kind)).await?;
        Ok(result
            .column(0)
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect())
    }

    async fn entity_counts(&self, ns: &Namespace) -> Result<BTreeMap<String, usize>, StoreError> {
        let result = self.run(&cypher::entity_counts(ns)).await?;
        let mut counts = BTreeMap::new();
        for row in &result.data {
            match (row.row.first().and_then(Value::as_str), row.row.get(1).and_then(Value::as_u64)) {
                (Some(label), Some(count)) => {
                    counts.insert(label.to_string(), count as usize);
                }
                _ => debug!("Skipping malformed count row {:?}", row.row),
            }
        }
        Ok(counts)
    }

    async fn sweep_unowned(&self, ns: &Namespace) -> Result<usize, StoreError> {
        self.run(&cypher::sweep_unowned(ns)).await?.count()
    }
}
