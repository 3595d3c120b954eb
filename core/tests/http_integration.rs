/*
 * http_integration.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Volley, an asynchronous HTTP client runtime.
 *
 * Volley is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Volley is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Volley.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Requests through the built-in HTTP transport.
//!
//! The local-server tests run by default. The public-host test needs network access:
//!   cargo test -p volley_core --test http_integration -- --ignored --nocapture

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use volley_core::{
    RequestError, RequestState, Session, SessionConfig, TaskState, TransportErrorKind,
    TransportTask,
};

/// Serve one connection: read the request head, answer with `response`. Returns the head.
async fn serve_once(listener: TcpListener, response: &'static [u8]) -> String {
    let (mut sock, _) = listener.accept().await.unwrap();
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = sock.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        head.extend_from_slice(&buf[..n]);
    }
    sock.write_all(response).await.unwrap();
    sock.shutdown().await.unwrap();
    String::from_utf8_lossy(&head).into_owned()
}

#[tokio::test]
async fn chunked_body_is_collected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(serve_once(
        listener,
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nContent-Type: text/plain\r\n\r\n\
          5\r\nhello\r\n7\r\n, world\r\n0\r\n\r\n",
    ));

    let session = Session::new(SessionConfig::default());
    let request = session.request(format!("http://127.0.0.1:{}/greeting?lang=en", port));
    let response = tokio::time::timeout(
        Duration::from_secs(10),
        request.response_async(volley_core::StringSerializer),
    )
    .await
    .unwrap();

    assert_eq!(response.value().map(String::as_str), Some("hello, world"));
    assert_eq!(response.status(), Some(200));
    let head = response.response.as_ref().unwrap();
    assert_eq!(head.header("content-type"), Some("text/plain"));
    let metrics = response.metrics.as_ref().unwrap();
    assert!(metrics.connect_end.is_some());
    assert!(metrics.response_start.is_some());
    assert!(metrics.bytes_sent > 0);

    let sent = server.await.unwrap();
    assert!(sent.starts_with("GET /greeting?lang=en HTTP/1.1\r\n"));
    assert!(sent.to_ascii_lowercase().contains("user-agent: volley/"));

    session.root_queue().barrier().await;
    assert_eq!(request.state(), RequestState::Finished);
    assert_eq!(session.active_request_count().await, 0);
}

#[tokio::test]
async fn refused_connection_fails_the_request() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let session = Session::new(SessionConfig::default().connect_timeout(Duration::from_secs(2)));
    let response = session
        .request(format!("http://127.0.0.1:{}/", port))
        .response_async(volley_core::PassthroughSerializer)
        .await;
    match response.error() {
        Some(RequestError::Transport(e)) => assert_ne!(e.kind, TransportErrorKind::Cancelled),
        other => panic!("expected transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn cancelled_in_flight_request_reports_explicit_cancellation() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    // Accept but never answer.
    tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(sock);
    });

    let session = Session::new(SessionConfig::default());
    let request = session.request(format!("http://127.0.0.1:{}/hang", port));
    let (tx, rx) = tokio::sync::oneshot::channel();
    request.response(move |response| {
        let _ = tx.send(response);
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    request.cancel();

    let response = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.error(), Some(&RequestError::ExplicitlyCancelled));
}

#[tokio::test]
async fn invalidated_unstarted_task_leaves_no_association() {
    let session = Session::new(SessionConfig::default().start_requests_immediately(false));
    let request = session.request("http://127.0.0.1:9/never");
    let (task_tx, task_rx) = tokio::sync::oneshot::channel();
    let task_tx = std::sync::Mutex::new(Some(task_tx));
    request.on_task_created(session.callback_queue(), move |task| {
        if let Some(tx) = task_tx.lock().unwrap().take() {
            let _ = tx.send(task);
        }
    });
    let (tx, rx) = tokio::sync::oneshot::channel();
    request.response(move |response| {
        let _ = tx.send(response);
    });
    let task = tokio::time::timeout(Duration::from_secs(5), task_rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(task.state(), TaskState::Suspended);

    session.invalidate_and_cancel();
    let response = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.error(), Some(&RequestError::SessionInvalidated));

    tokio::time::timeout(Duration::from_secs(5), async {
        while session.is_task_associated(task.id()).await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(task.state(), TaskState::Completed);
    assert_eq!(session.active_request_count().await, 0);
}

#[tokio::test]
#[ignore]
async fn public_https_get() {
    let session = Session::new(SessionConfig::from_env());
    let response = session
        .request("https://www.example.com/")
        .response_async(volley_core::StringSerializer)
        .await;
    let body = response.value().expect("request failed");
    println!(
        "status={:?} bytes={} metrics={:?}",
        response.status(),
        body.len(),
        response.metrics
    );
    assert_eq!(response.status(), Some(200));
    assert!(body.contains("Example Domain"));
}
