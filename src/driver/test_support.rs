//! In-process Bolt peer for driver tests.
//!
//! Speaks the handshake and chunked messages through [`BoltMessageCodec`] and
//! answers a small query vocabulary:
//!
//! - `RETURN <expr> [AS <alias>]` yields one row with the literal
//! - any query containing `FAIL` fails with a syntax error
//! - any query containing `STALL` leaves the connection unanswered
//! - `dbms.components` answers the Neo4j health probe
//! - queries containing `CREATE` report `nodes-created` stats

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing_subscriber::EnvFilter;

use crate::bolt::handshake::{parse_request, HANDSHAKE_SIZE};
use crate::bolt::{
    BoltMessage, BoltMessageCodec, BoltRequest, BoltResponse, BoltVersion, FailureMessage,
    PackStreamValue, RecordMessage, SuccessMessage, ValueMap,
};

use super::bolt::ConnectionConfig;

/// Scripted server behaviour.
#[derive(Debug, Clone)]
pub(crate) struct MockBehavior {
    versions: Vec<BoltVersion>,
    reject_auth: bool,
    fail_commit: bool,
    fail_rollback: bool,
    drop_on_rollback: bool,
    stall_after_auth: bool,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            versions: BoltVersion::DEFAULT_PROPOSALS.to_vec(),
            reject_auth: false,
            fail_commit: false,
            fail_rollback: false,
            drop_on_rollback: false,
            stall_after_auth: false,
        }
    }
}

impl MockBehavior {
    /// Versions the server accepts, in its own preference order.
    pub(crate) fn with_versions(mut self, versions: &[BoltVersion]) -> Self {
        self.versions = versions.to_vec();
        self
    }

    pub(crate) fn rejecting_auth(mut self) -> Self {
        self.reject_auth = true;
        self
    }

    pub(crate) fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub(crate) fn failing_rollback(mut self) -> Self {
        self.fail_rollback = true;
        self
    }

    /// Close the socket instead of answering ROLLBACK.
    pub(crate) fn dropping_on_rollback(mut self) -> Self {
        self.drop_on_rollback = true;
        self
    }

    /// Complete authentication, then keep the socket open without reading
    /// from it or answering again.
    pub(crate) fn stalling_after_auth(mut self) -> Self {
        self.stall_after_auth = true;
        self
    }
}

/// Listening mock server. Connections are served on their own tasks.
pub(crate) struct MockServer {
    port: u16,
    requests: Arc<Mutex<Vec<BoltRequest>>>,
    sessions: Arc<Mutex<Vec<JoinHandle<()>>>>,
    acceptor: JoinHandle<()>,
}

impl MockServer {
    pub(crate) async fn start(behavior: MockBehavior) -> Self {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let sessions = Arc::new(Mutex::new(Vec::new()));
        let accepted = Arc::new(AtomicUsize::new(0));

        let acceptor = {
            let requests = Arc::clone(&requests);
            let sessions = Arc::clone(&sessions);
            tokio::spawn(async move {
                while let Ok((socket, _)) = listener.accept().await {
                    let id = accepted.fetch_add(1, Ordering::SeqCst) + 1;
                    let session = MockSession {
                        connection_id: format!("bolt-{}", id),
                        address: format!("127.0.0.1:{}", port),
                        behavior: behavior.clone(),
                        requests: Arc::clone(&requests),
                        failed: false,
                        in_transaction: false,
                        pending: None,
                        commits: 0,
                    };
                    let handle = tokio::spawn(session.serve(socket));
                    sessions.lock().push(handle);
                }
            })
        };

        Self {
            port,
            requests,
            sessions,
            acceptor,
        }
    }

    pub(crate) fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::new("127.0.0.1", self.port).with_connect_timeout(Duration::from_secs(5))
    }

    pub(crate) fn address(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    /// Every request received so far, across all connections.
    pub(crate) fn requests(&self) -> Vec<BoltRequest> {
        self.requests.lock().clone()
    }

    /// Wait until at least `n` requests were logged.
    pub(crate) async fn wait_for_requests(&self, n: usize) {
        for _ in 0..400 {
            if self.requests.lock().len() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {} requests, got {:?}", n, self.requests());
    }

    /// Drop every open connection; the listener keeps accepting.
    pub(crate) async fn disconnect_all(&self) {
        let handles: Vec<_> = self.sessions.lock().drain(..).collect();
        for handle in handles {
            handle.abort();
            let _ = handle.await;
        }
    }

    /// Stop accepting and drop every open connection.
    pub(crate) async fn shutdown(&self) {
        self.acceptor.abort();
        self.disconnect_all().await;
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.acceptor.abort();
        for handle in self.sessions.lock().iter() {
            handle.abort();
        }
    }
}

/// Route driver logs to the test harness; `RUST_LOG=graphbolt_driver=debug` to see them.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

enum Reply {
    Send(Vec<BoltResponse>),
    Close,
}

struct MockSession {
    connection_id: String,
    address: String,
    behavior: MockBehavior,
    requests: Arc<Mutex<Vec<BoltRequest>>>,
    /// Set by a FAILURE; everything but RESET is IGNORED until cleared
    failed: bool,
    in_transaction: bool,
    /// Fields and rows of the last RUN, waiting for PULL
    pending: Option<(bool, Vec<Vec<PackStreamValue>>)>,
    commits: usize,
}

impl MockSession {
    async fn serve(mut self, mut socket: TcpStream) {
        let mut preamble = [0u8; HANDSHAKE_SIZE];
        if socket.read_exact(&mut preamble).await.is_err() {
            return;
        }
        let proposals = parse_request(&preamble).unwrap_or_default();
        let agreed = proposals.into_iter().find(|v| self.behavior.versions.contains(v));
        let reply = agreed.map(BoltVersion::to_bytes).unwrap_or([0; 4]);
        if socket.write_all(&reply).await.is_err() {
            return;
        }
        let Some(version) = agreed else {
            return;
        };

        let mut framed = Framed::new(socket, BoltMessageCodec::new());
        while let Some(Ok(message)) = framed.next().await {
            let BoltMessage::Request(request) = message else {
                return;
            };
            self.requests.lock().push(request.clone());
            if matches!(&request, BoltRequest::Run(run) if run.query.contains("STALL")) {
                return hold(framed).await;
            }
            let authenticated = match &request {
                BoltRequest::Logon(_) => true,
                BoltRequest::Hello(_) => !version.supports_logon(),
                _ => false,
            };
            let reply = self.respond(request);
            let stall = authenticated && self.behavior.stall_after_auth;
            match reply {
                Reply::Send(responses) => {
                    for response in responses {
                        if framed.send(response).await.is_err() {
                            return;
                        }
                    }
                    if stall {
                        return hold(framed).await;
                    }
                }
                Reply::Close => return,
            }
        }
    }

    fn respond(&mut self, request: BoltRequest) -> Reply {
        let ignored = Reply::Send(vec![BoltResponse::Ignored]);
        match request {
            BoltRequest::Goodbye => Reply::Close,
            BoltRequest::Hello(hello) => {
                if self.behavior.reject_auth && hello.scheme().is_some() {
                    return self.unauthorized();
                }
                let meta: ValueMap = [
                    ("server", "Neo4j/5.13.0"),
                    ("connection_id", self.connection_id.as_str()),
                ]
                .into_iter()
                .collect();
                success(meta)
            }
            BoltRequest::Logon(_) if self.behavior.reject_auth => self.unauthorized(),
            BoltRequest::Logon(_) | BoltRequest::Logoff | BoltRequest::Telemetry(_) => {
                success(ValueMap::new())
            }
            BoltRequest::Reset => {
                self.failed = false;
                self.in_transaction = false;
                self.pending = None;
                success(ValueMap::new())
            }
            BoltRequest::Rollback if self.behavior.drop_on_rollback => Reply::Close,
            BoltRequest::Rollback if self.behavior.fail_rollback => self.failure(
                "Neo.DatabaseError.Transaction.TransactionRollbackFailed",
                "rollback failed",
            ),
            _ if self.failed => ignored,
            BoltRequest::Run(run) => {
                if run.query.contains("FAIL") {
                    return self.failure("Neo.ClientError.Statement.SyntaxError", "Invalid input 'FAIL'");
                }
                let (fields, rows) = evaluate(&run.query);
                self.pending = Some((run.query.contains("CREATE"), rows));
                let mut meta = ValueMap::new();
                meta.insert("fields", fields);
                meta.insert("t_first", 1i64);
                if self.in_transaction {
                    meta.insert("qid", 0i64);
                }
                success(meta)
            }
            BoltRequest::Pull(_) => {
                let (writes, rows) = self.pending.take().unwrap_or_default();
                let mut responses: Vec<BoltResponse> = rows
                    .into_iter()
                    .map(|row| BoltResponse::Record(RecordMessage::new(row)))
                    .collect();
                let mut meta = ValueMap::new();
                meta.insert("type", if writes { "w" } else { "r" });
                meta.insert("t_last", 0i64);
                meta.insert("db", "neo4j");
                if writes {
                    let stats: ValueMap = [("nodes-created", 1i64)].into_iter().collect();
                    meta.insert("stats", stats);
                }
                responses.push(BoltResponse::Success(SuccessMessage::new(meta)));
                Reply::Send(responses)
            }
            BoltRequest::Discard(_) => {
                self.pending = None;
                success(ValueMap::new())
            }
            BoltRequest::Begin(_) => {
                self.in_transaction = true;
                success(ValueMap::new())
            }
            BoltRequest::Commit if self.behavior.fail_commit => self.failure(
                "Neo.ClientError.Transaction.TransactionCommitFailed",
                "commit failed",
            ),
            BoltRequest::Commit => {
                self.in_transaction = false;
                self.commits += 1;
                let bookmark = format!("bm:{}:{}", self.connection_id, self.commits);
                success([("bookmark", bookmark)].into_iter().collect())
            }
            BoltRequest::Rollback => {
                self.in_transaction = false;
                success(ValueMap::new())
            }
            BoltRequest::Route(route) => {
                let server = |role: &str| {
                    let entry: ValueMap = [
                        ("role", PackStreamValue::from(role)),
                        ("addresses", vec![self.address.clone()].into()),
                    ]
                    .into_iter()
                    .collect();
                    PackStreamValue::from(entry)
                };
                let rt: ValueMap = [
                    ("ttl", PackStreamValue::from(300i64)),
                    ("db", route.database.unwrap_or_else(|| "neo4j".to_string()).into()),
                    ("servers", vec![server("ROUTE"), server("READ"), server("WRITE")].into()),
                ]
                .into_iter()
                .collect();
                success([("rt", rt)].into_iter().collect())
            }
        }
    }

    fn failure(&mut self, code: &str, message: &str) -> Reply {
        self.failed = true;
        Reply::Send(vec![BoltResponse::Failure(FailureMessage::new(code, message))])
    }

    fn unauthorized(&mut self) -> Reply {
        self.failure(
            "Neo.ClientError.Security.Unauthorized",
            "The client is unauthorized due to authentication failure.",
        )
    }
}

/// Keep the socket open without reading from it or writing to it.
async fn hold<T>(socket: T) {
    let _socket = socket;
    std::future::pending::<()>().await
}

fn success(meta: ValueMap) -> Reply {
    Reply::Send(vec![BoltResponse::Success(SuccessMessage::new(meta))])
}

/// Column names and rows for the supported query vocabulary.
fn evaluate(query: &str) -> (Vec<String>, Vec<Vec<PackStreamValue>>) {
    if query.contains("dbms.components") {
        return (vec!["version".into()], vec![vec!["5.13.0".into()]]);
    }
    let Some(expr) = query.trim().strip_prefix("RETURN ") else {
        return (Vec::new(), Vec::new());
    };
    let (expr, alias) = match expr.split_once(" AS ") {
        Some((expr, alias)) => (expr.trim(), alias.trim()),
        None => (expr.trim(), expr.trim()),
    };
    let value = match expr.parse::<i64>() {
        Ok(n) => PackStreamValue::Integer(n),
        Err(_) => PackStreamValue::from(expr.trim_matches('\'')),
    };
    (vec![alias.to_string()], vec![vec![value]])
}
