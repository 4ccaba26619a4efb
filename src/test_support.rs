//! Loopback HTTP helpers for unit tests.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;

/// Serve exactly one response, then return the raw request text from the handle.
pub(crate) fn spawn_one_shot_http(
    status: u16,
    payload: &str,
) -> (String, thread::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let payload = payload.to_string();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let read = stream.read(&mut buf).unwrap();
            if read == 0 {
                break;
            }
            request.extend_from_slice(&buf[..read]);
        }
        let reason = if status == 200 { "OK" } else { "Error" };
        let headers = format!(
            "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            payload.len()
        );
        stream.write_all(headers.as_bytes()).unwrap();
        stream.write_all(payload.as_bytes()).unwrap();
        let _ = stream.flush();
        String::from_utf8_lossy(&request).into_owned()
    });
    (format!("http://{addr}"), handle)
}
