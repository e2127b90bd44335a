//! Loopback HTTP fixture shared by the integration tests.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

/// Maps a request path to (status, JSON body).
pub type Route = Arc<dyn Fn(&str) -> (u16, String) + Send + Sync>;

/// Serve `route` on an ephemeral port; returns `host:port`.
pub fn serve<F>(route: F) -> String
where
    F: Fn(&str) -> (u16, String) + Send + Sync + 'static,
{
    let route: Route = Arc::new(route);
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let route = Arc::clone(&route);
            thread::spawn(move || handle(stream, &route));
        }
    });
    addr
}

/// An address nothing listens on.
pub fn dead_target() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);
    addr
}

fn handle(mut stream: TcpStream, route: &Route) {
    let Ok(read_half) = stream.try_clone() else {
        return;
    };
    let mut reader = BufReader::new(read_half);
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    // Drain headers up to the blank line.
    let mut line = String::new();
    while reader.read_line(&mut line).is_ok_and(|n| n > 2) {
        line.clear();
    }

    let path = request_line.split_whitespace().nth(1).unwrap_or("/").to_string();
    let (status, body) = route(&path);
    let reason = if status == 200 { "OK" } else { "Error" };
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes());
}
