use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HttpFailure {
    /// Upstream answered with a non-success status; body is kept so callers
    /// can surface an API-reported error payload.
    Status { status: u16, body: String },
    Transport(String),
}

/// Single-attempt GET with bounded connect/read timeouts. Retry policy, if
/// any, belongs to the caller; a quest-establishing fetch treats any failure
/// as fatal to the quest.
pub(crate) fn get_text(
    url: &str,
    query: &[(String, String)],
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<String, HttpFailure> {
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(connect_timeout)
        .timeout_read(read_timeout)
        .timeout_write(read_timeout)
        .build();

    let mut request = agent.get(url);
    for (key, value) in query {
        request = request.query(key, value);
    }

    match request.call() {
        Ok(response) => response
            .into_string()
            .map_err(|err| HttpFailure::Transport(format!("response decode failed: {err}"))),
        Err(ureq::Error::Status(status, response)) => {
            let body = response.into_string().unwrap_or_default().trim().to_string();
            Err(HttpFailure::Status { status, body })
        }
        Err(ureq::Error::Transport(err)) => Err(HttpFailure::Transport(err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::sync::Arc;

    struct TestServer {
        base_url: String,
        requests: Arc<AtomicUsize>,
        shutdown_tx: mpsc::Sender<()>,
        join_handle: Option<std::thread::JoinHandle<()>>,
    }

    impl TestServer {
        fn spawn(status: u16, body: &str, delay: Duration) -> Self {
            let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind test server");
            listener.set_nonblocking(true).expect("set nonblocking");
            let addr = listener.local_addr().expect("local addr");

            let requests = Arc::new(AtomicUsize::new(0));
            let requests_clone = Arc::clone(&requests);
            let body = body.to_string();
            let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

            let join_handle = std::thread::spawn(move || {
                loop {
                    if shutdown_rx.try_recv().is_ok() {
                        break;
                    }
                    match listener.accept() {
                        Ok((mut stream, _)) => {
                            requests_clone.fetch_add(1, Ordering::SeqCst);
                            let body = body.clone();
                            std::thread::spawn(move || {
                                let _ = consume_request(&mut stream);
                                std::thread::sleep(delay);
                                let _ = write_response(&mut stream, status, &body);
                            });
                        }
                        Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                            std::thread::sleep(Duration::from_millis(5));
                        }
                        Err(_) => break,
                    }
                }
            });

            Self {
                base_url: format!("http://{addr}"),
                requests,
                shutdown_tx,
                join_handle: Some(join_handle),
            }
        }

        fn request_count(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            let _ = self.shutdown_tx.send(());
            if let Some(handle) = self.join_handle.take() {
                let _ = handle.join();
            }
        }
    }

    fn consume_request(stream: &mut TcpStream) -> std::io::Result<()> {
        stream.set_read_timeout(Some(Duration::from_millis(200)))?;
        let mut buf = [0_u8; 1024];
        let mut data = Vec::new();
        loop {
            match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(read) => {
                    data.extend_from_slice(&buf[..read]);
                    if data.windows(4).any(|window| window == b"\r\n\r\n") {
                        break;
                    }
                }
                Err(err)
                    if err.kind() == std::io::ErrorKind::WouldBlock
                        || err.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn write_response(stream: &mut TcpStream, status: u16, body: &str) -> std::io::Result<()> {
        let reason = match status {
            200 => "OK",
            403 => "Forbidden",
            404 => "Not Found",
            500 => "Internal Server Error",
            _ => "Status",
        };
        let payload = body.as_bytes();
        write!(
            stream,
            "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            payload.len()
        )?;
        stream.write_all(payload)?;
        stream.flush()
    }

    fn no_query() -> Vec<(String, String)> {
        Vec::new()
    }

    #[test]
    fn returns_body_on_success() {
        let server = TestServer::spawn(200, "ok-body", Duration::ZERO);

        let result = get_text(
            &server.base_url,
            &no_query(),
            Duration::from_millis(200),
            Duration::from_millis(200),
        );

        assert_eq!(result.expect("success"), "ok-body");
        assert_eq!(server.request_count(), 1);
    }

    #[test]
    fn error_status_carries_payload_and_is_not_retried() {
        let server = TestServer::spawn(404, "{\"error\":{\"message\":\"gone\"}}", Duration::ZERO);

        let result = get_text(
            &server.base_url,
            &no_query(),
            Duration::from_millis(200),
            Duration::from_millis(200),
        );

        match result.expect_err("404 should fail") {
            HttpFailure::Status { status, body } => {
                assert_eq!(status, 404);
                assert!(body.contains("gone"), "unexpected body: {body}");
            }
            other => panic!("expected status failure, got {other:?}"),
        }
        assert_eq!(server.request_count(), 1);
    }

    #[test]
    fn server_error_is_a_single_failed_attempt() {
        let server = TestServer::spawn(500, "down", Duration::ZERO);

        let result = get_text(
            &server.base_url,
            &no_query(),
            Duration::from_millis(200),
            Duration::from_millis(200),
        );

        assert!(matches!(
            result,
            Err(HttpFailure::Status { status: 500, .. })
        ));
        assert_eq!(server.request_count(), 1);
    }

    #[test]
    fn read_timeout_surfaces_as_transport_failure() {
        let server = TestServer::spawn(200, "slow", Duration::from_millis(150));

        let result = get_text(
            &server.base_url,
            &no_query(),
            Duration::from_millis(250),
            Duration::from_millis(20),
        );

        assert!(matches!(result, Err(HttpFailure::Transport(_))));
        assert_eq!(server.request_count(), 1);
    }
}
