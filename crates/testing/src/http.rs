//! A one-shot HTTP endpoint with a canned reply.

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    task::JoinHandle,
};

/// What the client sent
#[derive(Debug)]
pub struct CapturedRequest {
    pub head: String,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap()
    }
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .map(|(_, value)| value.trim().parse().unwrap())
        .unwrap_or(0)
}

/// Binds a local port, answers the first request with `status` and a JSON
/// `body`, then stops listening.
///
/// Returns the endpoint URL and a handle resolving to the captured request.
pub async fn serve_once(status: u16, body: &str) -> (String, JoinHandle<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/", listener.local_addr().unwrap());

    let reply = format!(
        "HTTP/1.1 {status} Canned\r\n\
         content-type: application/json\r\n\
         content-length: {}\r\n\
         connection: close\r\n\r\n{body}",
        body.len()
    );

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        let head_end = loop {
            let read = socket.read(&mut chunk).await.unwrap();
            assert!(read > 0, "connection closed before headers ended");
            buf.extend_from_slice(&chunk[..read]);

            if let Some(pos) = buf.windows(4).position(|x| x == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
        let expected = content_length(&head);

        while buf.len() - head_end < expected {
            let read = socket.read(&mut chunk).await.unwrap();
            assert!(read > 0, "connection closed before body ended");
            buf.extend_from_slice(&chunk[..read]);
        }

        socket.write_all(reply.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();

        CapturedRequest {
            head,
            body: buf[head_end..].to_vec(),
        }
    });

    (url, handle)
}
