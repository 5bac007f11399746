//! End-to-end tests: a served control socket, a real TCP client, and a
//! scriptable driver. Each test gets its own server on an ephemeral port.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time;

use helm_ftp_server::Server;
use helm_ftp_server::driver::{ClientDriver, ServerDriver, SessionInfo};
use helm_ftp_server::error::DriverError;
use helm_ftp_server::protocol::{CommandDescriptor, CommandSet, HandlerFuture};
use helm_ftp_server::server::{ServerConfig, SessionRegistry};
use helm_ftp_server::session::ClientSession;

const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Scriptable driver: `bob`/`secret` logs in, `CWD boom` fails with an I/O
/// error, `CWD denied` is rejected. Records departures, renames, and the
/// session ids it authenticated.
#[derive(Default)]
struct TestDriver {
    left: AtomicUsize,
    authenticated_ids: Mutex<Vec<u32>>,
    renames: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl ServerDriver for TestDriver {
    async fn welcome_user(&self, _session: &SessionInfo) -> Result<String, DriverError> {
        Ok("helm test server".to_string())
    }

    async fn authenticate_user(
        &self,
        session: &SessionInfo,
        user: &str,
        password: &str,
    ) -> Result<Arc<dyn ClientDriver>, DriverError> {
        if user == "bob" && password == "secret" {
            self.authenticated_ids.lock().unwrap().push(session.id);
            Ok(Arc::new(TestClientDriver {
                renames: Arc::clone(&self.renames),
            }))
        } else {
            Err(DriverError::Rejected("Authentication failed".to_string()))
        }
    }

    async fn user_left(&self, _session: &SessionInfo) {
        self.left.fetch_add(1, Ordering::SeqCst);
    }
}

struct TestClientDriver {
    renames: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl ClientDriver for TestClientDriver {
    async fn change_directory(
        &self,
        _session: &SessionInfo,
        current: &str,
        target: &str,
    ) -> Result<String, DriverError> {
        match target {
            "boom" => Err(DriverError::Io(io::Error::other("backend exploded"))),
            "denied" => Err(DriverError::Rejected("No access".to_string())),
            ".." => Ok("/".to_string()),
            _ if target.starts_with('/') => Ok(target.to_string()),
            _ if current == "/" => Ok(format!("/{target}")),
            _ => Ok(format!("{current}/{target}")),
        }
    }

    async fn rename(
        &self,
        _session: &SessionInfo,
        from: &str,
        to: &str,
    ) -> Result<(), DriverError> {
        self.renames
            .lock()
            .unwrap()
            .push((from.to_string(), to.to_string()));
        Ok(())
    }
}

async fn start_server(
    driver: Arc<TestDriver>,
    idle_timeout_secs: u64,
    max_clients: usize,
) -> (SocketAddr, Arc<SessionRegistry>) {
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        max_clients,
        idle_timeout_secs,
    };
    let server = Server::bind(config, driver).await.unwrap();
    let addr = server.local_addr().unwrap();
    let registry = server.registry();
    tokio::spawn(async move {
        let _ = server.serve().await;
    });
    (addr, registry)
}

struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .unwrap();
    }

    /// Reads one response line, CRLF stripped. An empty string means the
    /// server closed the connection.
    async fn read_line(&mut self) -> String {
        let mut line = String::new();
        time::timeout(READ_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a response line")
            .unwrap();
        line.trim_end_matches(['\r', '\n']).to_string()
    }

    async fn cmd(&mut self, line: &str) -> String {
        self.send(line).await;
        self.read_line().await
    }

    async fn login(&mut self) {
        assert_eq!(
            self.cmd("USER bob").await,
            "331 User name okay, need password"
        );
        assert_eq!(self.cmd("PASS secret").await, "230 Password ok, continue");
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        time::sleep(Duration::from_millis(50)).await;
    }
    panic!("condition not reached within 5 seconds");
}

#[tokio::test]
async fn greets_and_logs_in() {
    let driver = Arc::new(TestDriver::default());
    let (addr, _) = start_server(driver, 0, 10).await;

    let mut client = TestClient::connect(addr).await;
    assert_eq!(client.read_line().await, "220 helm test server");
    client.login().await;
}

#[tokio::test]
async fn rejects_bad_credentials() {
    let driver = Arc::new(TestDriver::default());
    let (addr, _) = start_server(driver, 0, 10).await;

    let mut client = TestClient::connect(addr).await;
    client.read_line().await;
    assert_eq!(
        client.cmd("USER bob").await,
        "331 User name okay, need password"
    );
    assert_eq!(
        client.cmd("PASS wrong").await,
        "530 Authentication failed"
    );
    // Still unauthenticated, so privileged verbs stay gated.
    assert_eq!(
        client.cmd("PWD").await,
        "530 Please login with USER and PASS"
    );
}

#[tokio::test]
async fn gates_privileged_verbs_before_login() {
    let driver = Arc::new(TestDriver::default());
    let (addr, _) = start_server(driver, 0, 10).await;

    let mut client = TestClient::connect(addr).await;
    client.read_line().await;

    // Open verbs work before login, gated verbs answer 530 untouched.
    assert_eq!(client.cmd("SYST").await, "215 UNIX Type: L8");
    assert_eq!(
        client.cmd("CWD /tmp").await,
        "530 Please login with USER and PASS"
    );
    assert_eq!(
        client.cmd("USER bob").await,
        "331 User name okay, need password"
    );
    // USER alone does not authenticate; the data verbs stay refused until
    // PASS succeeds, and no file access is attempted.
    assert_eq!(
        client.cmd("RETR file.txt").await,
        "530 Please login with USER and PASS"
    );
    assert_eq!(
        client.cmd("STOR file.txt").await,
        "530 Please login with USER and PASS"
    );
    assert_eq!(
        client.cmd("LIST").await,
        "530 Please login with USER and PASS"
    );
}

#[tokio::test]
async fn unknown_verb_leaves_the_loop_running() {
    let driver = Arc::new(TestDriver::default());
    let (addr, _) = start_server(driver, 0, 10).await;

    let mut client = TestClient::connect(addr).await;
    client.read_line().await;
    assert_eq!(client.cmd("BOGUS whatever").await, "500 Unknown command");
    assert_eq!(client.cmd("NOOP").await, "200 OK");
}

#[tokio::test]
async fn handler_fault_is_contained() {
    let driver = Arc::new(TestDriver::default());
    let (addr, _) = start_server(driver, 0, 10).await;

    let mut client = TestClient::connect(addr).await;
    client.read_line().await;
    client.login().await;

    let response = client.cmd("CWD boom").await;
    assert!(
        response.starts_with("500 Internal error:"),
        "unexpected response {response:?}"
    );
    assert!(response.contains("backend exploded"));

    // The session survives the fault.
    assert_eq!(client.cmd("NOOP").await, "200 OK");
    assert_eq!(client.cmd("PWD").await, "257 \"/\" is the current directory");
}

#[tokio::test]
async fn driver_rejections_use_their_own_status() {
    let driver = Arc::new(TestDriver::default());
    let (addr, _) = start_server(driver, 0, 10).await;

    let mut client = TestClient::connect(addr).await;
    client.read_line().await;
    client.login().await;

    assert_eq!(client.cmd("CWD denied").await, "550 No access");
    assert_eq!(client.cmd("CWD pub").await, "250 Directory changed");
    assert_eq!(
        client.cmd("PWD").await,
        "257 \"/pub\" is the current directory"
    );
    assert_eq!(client.cmd("CDUP").await, "250 Directory changed");
    assert_eq!(client.cmd("PWD").await, "257 \"/\" is the current directory");
}

#[tokio::test]
async fn idle_timeout_sends_421_and_ends_the_session() {
    let driver = Arc::new(TestDriver::default());
    let (addr, registry) = start_server(Arc::clone(&driver), 1, 10).await;

    let mut client = TestClient::connect(addr).await;
    client.read_line().await;

    // No command is sent; the deadline fires and names the configured limit.
    assert_eq!(
        client.read_line().await,
        "421 command timeout (1 seconds): closing control connection"
    );
    assert_eq!(client.read_line().await, "");

    wait_until(|| driver.left.load(Ordering::SeqCst) == 1).await;
    wait_until(|| registry.active_count() == 0).await;
}

#[tokio::test]
async fn quit_closes_the_session_cleanly() {
    let driver = Arc::new(TestDriver::default());
    let (addr, registry) = start_server(Arc::clone(&driver), 0, 10).await;

    let mut client = TestClient::connect(addr).await;
    client.read_line().await;
    assert_eq!(client.cmd("QUIT").await, "221 Goodbye");
    assert_eq!(client.read_line().await, "");

    wait_until(|| driver.left.load(Ordering::SeqCst) == 1).await;
    wait_until(|| registry.active_count() == 0).await;
}

#[tokio::test]
async fn rename_needs_a_source_first() {
    let driver = Arc::new(TestDriver::default());
    let (addr, _) = start_server(Arc::clone(&driver), 0, 10).await;

    let mut client = TestClient::connect(addr).await;
    client.read_line().await;
    client.login().await;

    assert_eq!(client.cmd("RNTO new.txt").await, "503 Send RNFR first");
    assert_eq!(
        client.cmd("RNFR old.txt").await,
        "350 Sure, give me a target"
    );
    assert_eq!(client.cmd("RNTO new.txt").await, "250 File renamed");
    // The source was consumed by the rename.
    assert_eq!(client.cmd("RNTO again.txt").await, "503 Send RNFR first");

    let renames = driver.renames.lock().unwrap().clone();
    assert_eq!(renames, vec![("old.txt".to_string(), "new.txt".to_string())]);
}

#[tokio::test]
async fn rest_stores_a_numeric_offset() {
    let driver = Arc::new(TestDriver::default());
    let (addr, _) = start_server(driver, 0, 10).await;

    let mut client = TestClient::connect(addr).await;
    client.read_line().await;
    client.login().await;

    assert_eq!(
        client.cmd("REST 1024").await,
        "350 Restarting at 1024. Send STOR or RETR to resume"
    );
    assert_eq!(
        client.cmd("REST nonsense").await,
        "501 Restart offset must be numeric"
    );
}

#[tokio::test]
async fn feat_is_a_multi_line_response() {
    let driver = Arc::new(TestDriver::default());
    let (addr, _) = start_server(driver, 0, 10).await;

    let mut client = TestClient::connect(addr).await;
    client.read_line().await;
    client.send("FEAT").await;
    assert_eq!(client.read_line().await, "211-Features:");
    assert_eq!(client.read_line().await, " UTF8");
    assert_eq!(client.read_line().await, " REST STREAM");
    assert_eq!(client.read_line().await, "211 End");
}

#[tokio::test]
async fn session_ids_are_unique_across_concurrent_sessions() {
    let driver = Arc::new(TestDriver::default());
    let (addr, _) = start_server(Arc::clone(&driver), 0, 10).await;

    let mut clients = Vec::new();
    for _ in 0..3 {
        let mut client = TestClient::connect(addr).await;
        client.read_line().await;
        client.login().await;
        clients.push(client);
    }

    let mut ids = driver.authenticated_ids.lock().unwrap().clone();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 3, "session ids must be pairwise distinct");
}

#[tokio::test]
async fn data_verbs_refuse_without_a_declared_transfer() {
    let driver = Arc::new(TestDriver::default());
    let (addr, _) = start_server(driver, 0, 10).await;

    let mut client = TestClient::connect(addr).await;
    client.read_line().await;
    client.login().await;

    // No PASV/PORT succeeded, so nothing is attached to the session.
    assert_eq!(
        client.cmd("RETR file.txt").await,
        "550 No passive connection declared"
    );
    assert_eq!(
        client.cmd("STOR file.txt").await,
        "550 No passive connection declared"
    );
    assert_eq!(
        client.cmd("LIST").await,
        "550 No passive connection declared"
    );
    assert_eq!(client.cmd("RETR").await, "501 A file path is required");
    assert_eq!(client.cmd("PASV").await, "502 Command not implemented");
    assert_eq!(
        client.cmd("PORT 127,0,0,1,7,7").await,
        "502 Command not implemented"
    );
    assert_eq!(client.cmd("NOOP").await, "200 OK");
}

#[tokio::test]
async fn registered_commands_extend_the_baseline() {
    fn cmd_site(session: &mut ClientSession) -> HandlerFuture<'_> {
        Box::pin(async move {
            session.write_message(200, "SITE noted").await?;
            Ok(())
        })
    }

    let driver = Arc::new(TestDriver::default());
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        max_clients: 10,
        idle_timeout_secs: 0,
    };
    let mut server = Server::bind(config, driver).await.unwrap();
    let mut commands = CommandSet::baseline();
    commands.register("SITE", CommandDescriptor { handler: cmd_site, open: false });
    server.set_commands(commands);
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.serve().await;
    });

    let mut client = TestClient::connect(addr).await;
    client.read_line().await;
    assert_eq!(
        client.cmd("SITE IDLE 60").await,
        "530 Please login with USER and PASS"
    );
    client.login().await;
    assert_eq!(client.cmd("SITE IDLE 60").await, "200 SITE noted");
}

#[tokio::test]
async fn over_capacity_connections_get_421() {
    let driver = Arc::new(TestDriver::default());
    let (addr, _) = start_server(driver, 0, 1).await;

    let mut first = TestClient::connect(addr).await;
    assert_eq!(first.read_line().await, "220 helm test server");

    let mut second = TestClient::connect(addr).await;
    assert_eq!(
        second.read_line().await,
        "421 Too many connections, closing control connection"
    );
}
