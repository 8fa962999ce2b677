//! End-to-end connection tests against a scripted in-process server.
//!
//! Each test binds a localhost listener, serves exactly one connection
//! through the crate's own `ServerCodec`, and drives the client through
//! the public `Connection` surface.

use futures::{SinkExt, StreamExt};
use smtp_client::proto::{Code, Command, Outbound, Reply, ServerCodec};
use smtp_client::{ConnectConfig, Connection, Error};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;

type ServerStream = Framed<TcpStream, ServerCodec>;

async fn spawn_server<F, Fut>(serve: F) -> SocketAddr
where
    F: FnOnce(ServerStream) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        serve(Framed::new(stream, ServerCodec::new())).await;
    });
    addr
}

fn config_for(addr: SocketAddr) -> ConnectConfig {
    let mut config = ConnectConfig::default();
    config.server.host = addr.ip().to_string();
    config.server.port = addr.port();
    config.server.timeout = Duration::from_secs(2);
    config
}

fn line(code: Code, text: &str) -> Reply {
    Reply::new(code, format!("{text}\r\n"))
}

/// Greeting plus a NOOP/QUIT loop; everything else gets a generic 250.
async fn serve_basic(mut server: ServerStream) {
    server
        .send(line(Code::SERVICE_READY, "mock ready"))
        .await
        .unwrap();
    while let Some(Ok(command)) = server.next().await {
        match command {
            Command::Noop => server.send(line(Code::OK, "ok")).await.unwrap(),
            Command::Quit => {
                server.send(line(Code::CLOSING, "bye")).await.unwrap();
                break;
            }
            _ => server.send(line(Code::OK, "ok")).await.unwrap(),
        }
    }
}

#[tokio::test]
async fn test_noop_then_clean_close() {
    let addr = spawn_server(serve_basic).await;
    let connection = Connection::connect(config_for(addr)).await.unwrap();
    assert!(connection.is_connected());

    let reply = connection
        .write(Outbound::Command(Command::Noop))
        .await
        .unwrap();
    assert_eq!(reply.code, Code::OK);
    assert_eq!(reply.message, "ok\r\n");

    connection.close().await.unwrap();
    assert!(!connection.is_connected());
    connection.closed().await;
}

#[tokio::test]
async fn test_connect_rejects_non_220_greeting() {
    let addr = spawn_server(|mut server: ServerStream| async move {
        server
            .send(Reply::new(
                Code::new(
                    smtp_client::proto::Severity::PermanentNegative,
                    smtp_client::proto::Category::MailSystem,
                    4,
                ),
                "go away\r\n",
            ))
            .await
            .unwrap();
    })
    .await;

    let err = Connection::connect(config_for(addr)).await.unwrap_err();
    let Error::InvalidReply(reply) = err else {
        panic!("expected InvalidReply, got {err:?}");
    };
    assert_eq!(reply.code.as_u16(), 554);
}

#[tokio::test]
async fn test_connect_fails_on_garbage_greeting() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        use tokio::io::AsyncWriteExt;
        let mut stream = stream;
        stream.write_all(b"garbage greeting\r\n").await.unwrap();
    });

    let err = Connection::connect(config_for(addr)).await.unwrap_err();
    assert!(matches!(err, Error::Proto(_)), "got {err:?}");
}

#[tokio::test]
async fn test_connect_times_out_without_greeting() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    // accept but never greet
    let silent = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(stream);
    });

    let mut config = config_for(addr);
    config.server.timeout = Duration::from_millis(200);
    let err = Connection::connect(config).await.unwrap_err();
    let Error::Io(io_err) = &err else {
        panic!("expected Io, got {err:?}");
    };
    assert_eq!(io_err.kind(), std::io::ErrorKind::TimedOut);
    silent.abort();
}

#[tokio::test]
async fn test_replies_resolve_in_submission_order() {
    let addr = spawn_server(|mut server: ServerStream| async move {
        server
            .send(line(Code::SERVICE_READY, "mock ready"))
            .await
            .unwrap();
        let mut counter = 0u32;
        while let Some(Ok(command)) = server.next().await {
            match command {
                Command::Quit => {
                    server.send(line(Code::CLOSING, "bye")).await.unwrap();
                    break;
                }
                _ => {
                    counter += 1;
                    server
                        .send(line(Code::OK, &format!("reply {counter}")))
                        .await
                        .unwrap();
                }
            }
        }
    })
    .await;

    let connection = Connection::connect(config_for(addr)).await.unwrap();

    // three pipelined writes; replies must land in submission order
    let (first, second, third) = tokio::join!(
        connection.write(Outbound::Command(Command::Noop)),
        connection.write(Outbound::Command(Command::Rset)),
        connection.write(Outbound::Command(Command::Noop)),
    );
    assert_eq!(first.unwrap().message, "reply 1\r\n");
    assert_eq!(second.unwrap().message, "reply 2\r\n");
    assert_eq!(third.unwrap().message, "reply 3\r\n");

    connection.close().await.unwrap();
}

#[tokio::test]
async fn test_multi_line_reply_reaches_caller_intact() {
    let addr = spawn_server(|mut server: ServerStream| async move {
        server
            .send(line(Code::SERVICE_READY, "mock ready"))
            .await
            .unwrap();
        while let Some(Ok(command)) = server.next().await {
            match command {
                Command::Ehlo(_) => {
                    server
                        .send(Reply::new(
                            Code::OK,
                            "mock.example.com\r\nSIZE 1000\r\nSMTPUTF8\r\n",
                        ))
                        .await
                        .unwrap();
                }
                Command::Quit => {
                    server.send(line(Code::CLOSING, "bye")).await.unwrap();
                    break;
                }
                _ => server.send(line(Code::OK, "ok")).await.unwrap(),
            }
        }
    })
    .await;

    let connection = Connection::connect(config_for(addr)).await.unwrap();
    let reply = connection
        .write(Outbound::Command(Command::Ehlo(
            smtp_client::ClientId::Domain("client.local".to_string()),
        )))
        .await
        .unwrap();
    assert_eq!(reply.code, Code::OK);
    assert_eq!(reply.message, "mock.example.com\r\nSIZE 1000\r\nSMTPUTF8\r\n");

    connection.close().await.unwrap();
}

#[tokio::test]
async fn test_pending_writes_fail_when_server_vanishes() {
    let addr = spawn_server(|mut server: ServerStream| async move {
        server
            .send(line(Code::SERVICE_READY, "mock ready"))
            .await
            .unwrap();
        // read one command, then disappear without replying
        let _ = server.next().await;
    })
    .await;

    let connection = Connection::connect(config_for(addr)).await.unwrap();
    let err = connection
        .write(Outbound::Command(Command::Noop))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ConnectionClosed), "got {err:?}");

    connection.closed().await;
    assert!(!connection.is_connected());

    // the connection stays dead
    let err = connection
        .write(Outbound::Command(Command::Noop))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ConnectionClosed), "got {err:?}");
}

#[tokio::test]
async fn test_close_reports_refused_farewell() {
    let addr = spawn_server(|mut server: ServerStream| async move {
        server
            .send(line(Code::SERVICE_READY, "mock ready"))
            .await
            .unwrap();
        while let Some(Ok(command)) = server.next().await {
            match command {
                Command::Quit => {
                    server
                        .send(Reply::new(
                            Code::new(
                                smtp_client::proto::Severity::PermanentNegative,
                                smtp_client::proto::Category::Syntax,
                                2,
                            ),
                            "not today\r\n",
                        ))
                        .await
                        .unwrap();
                    break;
                }
                _ => server.send(line(Code::OK, "ok")).await.unwrap(),
            }
        }
    })
    .await;

    let connection = Connection::connect(config_for(addr)).await.unwrap();
    let err = connection.close().await.unwrap_err();
    let Error::Close { server, channel } = err else {
        panic!("expected Close, got {err:?}");
    };
    assert!(matches!(server.as_deref(), Some(Error::InvalidReply(_))));
    assert!(channel.is_none());
    assert!(!connection.is_connected());
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let addr = spawn_server(serve_basic).await;
    let connection = Connection::connect(config_for(addr)).await.unwrap();

    connection.close().await.unwrap();
    // a second close is a no-op success
    connection.close().await.unwrap();

    // writes after close fail immediately
    let err = connection
        .write(Outbound::Command(Command::Noop))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ConnectionClosed));
}

#[tokio::test]
async fn test_raw_outbound_passes_through() {
    let addr = spawn_server(|mut server: ServerStream| async move {
        server
            .send(line(Code::SERVICE_READY, "mock ready"))
            .await
            .unwrap();
        while let Some(Ok(command)) = server.next().await {
            match command {
                Command::Noop => server.send(line(Code::OK, "raw ok")).await.unwrap(),
                Command::Quit => {
                    server.send(line(Code::CLOSING, "bye")).await.unwrap();
                    break;
                }
                _ => server.send(line(Code::OK, "ok")).await.unwrap(),
            }
        }
    })
    .await;

    let connection = Connection::connect(config_for(addr)).await.unwrap();
    // raw bytes spell a NOOP; the server decodes it like any command
    let reply = connection
        .write(Outbound::Raw(bytes::Bytes::from_static(b"NOOP\r\n")))
        .await
        .unwrap();
    assert_eq!(reply.message, "raw ok\r\n");

    connection.close().await.unwrap();
}
