//! End-to-end tests over real sockets.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use rill_server::{App, ListenConfig, RouterError, Server};

fn test_app() -> App {
    App::new()
        .get("/", |_req, res| async move {
            res.send("Hello, World!");
            Ok(())
        })
        .get("/users/:id", |req, res| async move {
            let id = req.path_params().require("id")?;
            res.send_json(&serde_json::json!({
                "id": id,
                "verbose": req.query("verbose").unwrap_or("0"),
            }));
            Ok(())
        })
        .post("/echo", |req, res| async move {
            let body = req.body()?.clone();
            res.code(201).send_json(&body);
            Ok(())
        })
        .get("/strict", |req, res| async move {
            req.require_query("page")?;
            res.send("ok");
            Ok(())
        })
        .get("/boom", |_req, _res| async move {
            Err(RouterError::handler("boom"))
        })
}

async fn listen(app: App) -> Server {
    app.listen(ListenConfig::new(0)).await.unwrap()
}

async fn send_request(addr: SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut response = String::new();
    let _ = stream.read_to_string(&mut response).await;
    response
}

fn body_of(response: &str) -> &str {
    response
        .split_once("\r\n\r\n")
        .map(|(_, body)| body)
        .unwrap_or("")
}

#[tokio::test]
async fn routes_and_params_over_the_wire() {
    let server = listen(test_app()).await;
    let response = send_request(
        server.local_addr(),
        "GET /users/42?verbose=1 HTTP/1.1\r\nHost: t\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.contains("content-type: application/json"), "{response}");
    let body: serde_json::Value = serde_json::from_str(body_of(&response)).unwrap();
    assert_eq!(body["id"], "42");
    assert_eq!(body["verbose"], "1");
    server.close().await.unwrap();
}

#[tokio::test]
async fn post_body_is_parsed_and_echoed() {
    let server = listen(test_app()).await;
    let response = send_request(
        server.local_addr(),
        "POST /echo HTTP/1.1\r\nHost: t\r\nContent-Length: 15\r\nConnection: close\r\n\r\n{\"name\":\"rill\"}",
    )
    .await;

    assert!(response.starts_with("HTTP/1.1 201"), "{response}");
    let body: serde_json::Value = serde_json::from_str(body_of(&response)).unwrap();
    assert_eq!(body["name"], "rill");
    server.close().await.unwrap();
}

#[tokio::test]
async fn not_found_handler_answers_unmatched_requests() {
    let app = test_app().set_not_found(|_req, res| async move {
        res.code(404).send("nothing here");
        Ok(())
    });
    let server = listen(app).await;
    let response = send_request(
        server.local_addr(),
        "GET /missing HTTP/1.1\r\nHost: t\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert!(response.starts_with("HTTP/1.1 404"), "{response}");
    assert_eq!(body_of(&response), "nothing here");
    server.close().await.unwrap();
}

#[tokio::test]
async fn middleware_send_short_circuits_routes() {
    let reached = Arc::new(AtomicBool::new(false));
    let flag = reached.clone();
    let app = App::new()
        .add_before_route(|req, res| async move {
            if req.header("Authorization").is_none() {
                res.code(401).send("denied");
            }
            Ok(())
        })
        .get("/", move |_req, res| {
            let flag = flag.clone();
            async move {
                flag.store(true, Ordering::SeqCst);
                res.send("welcome");
                Ok(())
            }
        });
    let server = listen(app).await;

    let response = send_request(
        server.local_addr(),
        "GET / HTTP/1.1\r\nHost: t\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 401"), "{response}");
    assert_eq!(body_of(&response), "denied");
    assert!(!reached.load(Ordering::SeqCst));

    let response = send_request(
        server.local_addr(),
        "GET / HTTP/1.1\r\nHost: t\r\nAuthorization: yes\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert_eq!(body_of(&response), "welcome");
    server.close().await.unwrap();
}

#[tokio::test]
async fn validation_error_becomes_400() {
    let server = listen(test_app()).await;
    let response = send_request(
        server.local_addr(),
        "GET /strict HTTP/1.1\r\nHost: t\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert!(response.starts_with("HTTP/1.1 400"), "{response}");
    let body: serde_json::Value = serde_json::from_str(body_of(&response)).unwrap();
    assert_eq!(body["error"], "Query Param invalid");
    assert_eq!(body["status"], "Bad Request!");
    server.close().await.unwrap();
}

#[tokio::test]
async fn handler_error_aborts_the_connection() {
    let server = listen(test_app()).await;
    let response = send_request(
        server.local_addr(),
        "GET /boom HTTP/1.1\r\nHost: t\r\nConnection: close\r\n\r\n",
    )
    .await;

    // No response contract exists for re-propagated errors; the connection
    // is closed without a status line.
    assert!(!response.starts_with("HTTP/1.1"), "{response}");
    server.close().await.unwrap();
}

#[tokio::test]
async fn unmatched_request_without_not_found_stays_unanswered() {
    let server = listen(test_app()).await;
    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
    stream
        .write_all(b"GET /missing HTTP/1.1\r\nHost: t\r\n\r\n")
        .await
        .unwrap();

    let mut buf = [0u8; 64];
    let read = tokio::time::timeout(Duration::from_millis(300), stream.read(&mut buf)).await;
    assert!(read.is_err(), "expected no response bytes");
    server.close().await.unwrap();
}

#[tokio::test]
async fn invalid_hostname_is_rejected() {
    let result = App::new()
        .listen(ListenConfig::new(0).hostname("not-an-ip-or-localhost"))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn localhost_binds_loopback() {
    let server = App::new()
        .listen(ListenConfig::new(0).hostname("localhost"))
        .await
        .unwrap();
    assert!(server.local_addr().ip().is_loopback());
    server.close().await.unwrap();
}

#[tokio::test]
async fn close_stops_accepting_and_fires_callback() {
    let listening = Arc::new(AtomicBool::new(false));
    let closed = Arc::new(AtomicBool::new(false));
    let (listening_flag, closed_flag) = (listening.clone(), closed.clone());

    let server = test_app()
        .on_listening(move |_addr| listening_flag.store(true, Ordering::SeqCst))
        .on_close(move || closed_flag.store(true, Ordering::SeqCst))
        .listen(ListenConfig::new(0))
        .await
        .unwrap();
    assert!(listening.load(Ordering::SeqCst));

    let addr = server.local_addr();
    server.close().await.unwrap();
    assert!(closed.load(Ordering::SeqCst));
    assert!(TcpStream::connect(addr).await.is_err());
}
