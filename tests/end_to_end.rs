//! End-to-end scenarios driving a real `Server` over real TCP sockets.

use std::time::Duration;

use follower_maze::config::Config;
use follower_maze::server::Server;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

async fn start_server() -> (Server, std::net::SocketAddr, std::net::SocketAddr) {
    let source_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let source_addr = source_listener.local_addr().unwrap();
    drop(source_listener);
    let client_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let client_addr = client_listener.local_addr().unwrap();
    drop(client_listener);

    let config = Config {
        source_addr: source_addr.to_string(),
        client_addr: client_addr.to_string(),
        first_sequence_id: 1,
    };
    let server = Server::start(config).await.expect("server should start");
    (server, source_addr, client_addr)
}

async fn connect_client(client_addr: std::net::SocketAddr, client_id: u64) -> BufReader<TcpStream> {
    let mut stream = TcpStream::connect(client_addr).await.expect("client connect");
    stream
        .write_all(format!("{client_id}\n").as_bytes())
        .await
        .unwrap();
    BufReader::new(stream)
}

async fn read_line(reader: &mut BufReader<TcpStream>) -> String {
    let mut line = String::new();
    timeout(Duration::from_secs(2), reader.read_line(&mut line))
        .await
        .expect("timed out waiting for a line")
        .expect("read_line failed");
    line
}

async fn no_more_lines(reader: &mut BufReader<TcpStream>) {
    let mut line = String::new();
    let result = timeout(Duration::from_millis(300), reader.read_line(&mut line)).await;
    assert!(result.is_err(), "expected no further lines, got {line:?}");
}

#[tokio::test]
async fn six_event_trace_matches_expected_per_client_delivery() {
    let (mut server, source_addr, client_addr) = start_server().await;

    let mut c1 = connect_client(client_addr, 1).await;
    let mut c2 = connect_client(client_addr, 2).await;
    let mut c3 = connect_client(client_addr, 3).await;
    let mut c4 = connect_client(client_addr, 4).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut source = TcpStream::connect(source_addr).await.unwrap();
    // Arrival order shuffled relative to sequence-id order, as the spec allows.
    let lines = [
        "2|F|1|2\n", "1|F|2|1\n", "4|S|2\n", "3|B\n", "6|S|2\n", "5|U|1|2\n", "7|P|1|4\n",
    ];
    for line in lines {
        source.write_all(line.as_bytes()).await.unwrap();
    }

    assert_eq!(read_line(&mut c1).await, "1|F|2|1\n");
    assert_eq!(read_line(&mut c1).await, "3|B\n");
    assert_eq!(read_line(&mut c1).await, "4|S|2\n");
    no_more_lines(&mut c1).await;

    assert_eq!(read_line(&mut c2).await, "2|F|1|2\n");
    assert_eq!(read_line(&mut c2).await, "3|B\n");
    no_more_lines(&mut c2).await;

    assert_eq!(read_line(&mut c3).await, "3|B\n");
    no_more_lines(&mut c3).await;

    assert_eq!(read_line(&mut c4).await, "3|B\n");
    assert_eq!(read_line(&mut c4).await, "7|P|1|4\n");
    no_more_lines(&mut c4).await;

    server.stop().await.unwrap();
}

#[tokio::test]
async fn malformed_source_line_stalls_the_sequence() {
    // S2: a malformed line at the position of id 1 leaves a permanent gap,
    // so later well-formed events never dispatch.
    let (mut server, source_addr, client_addr) = start_server().await;
    let mut c1 = connect_client(client_addr, 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut source = TcpStream::connect(source_addr).await.unwrap();
    source.write_all(b"1|Q|60|50\n2|B\n").await.unwrap();

    no_more_lines(&mut c1).await;
    server.stop().await.unwrap();
}

#[tokio::test]
async fn late_client_receives_only_events_after_it_connects() {
    // S3: client connects after event 3 dispatches but before event 4; it
    // must see event 4 onward and not event 3.
    let (mut server, source_addr, client_addr) = start_server().await;
    let mut source = TcpStream::connect(source_addr).await.unwrap();
    source.write_all(b"1|B\n2|B\n3|B\n").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut late = connect_client(client_addr, 5).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    source.write_all(b"4|B\n").await.unwrap();

    assert_eq!(read_line(&mut late).await, "4|B\n");
    no_more_lines(&mut late).await;

    server.stop().await.unwrap();
}

#[tokio::test]
async fn disconnected_follower_is_skipped_without_error() {
    // S4: client 2 disconnects between events 2 and 3; StatusUpdate 3 for
    // followers of 1 must skip it silently and still reach client 3.
    let (mut server, source_addr, client_addr) = start_server().await;
    let c1 = connect_client(client_addr, 1).await;
    let c2 = connect_client(client_addr, 2).await;
    let mut c3 = connect_client(client_addr, 3).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut source = TcpStream::connect(source_addr).await.unwrap();
    source.write_all(b"1|F|2|1\n2|F|3|1\n").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    drop(c1);
    drop(c2);
    tokio::time::sleep(Duration::from_millis(50)).await;

    source.write_all(b"3|S|1\n").await.unwrap();
    assert_eq!(read_line(&mut c3).await, "3|S|1\n");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn reconnecting_client_keeps_receiving_after_old_session_tears_down() {
    // A client reconnects under the same id before its old socket's
    // delivery task has finished exiting. The new session must end up
    // registered and receiving broadcasts, not silently dropped.
    let (mut server, source_addr, client_addr) = start_server().await;
    let mut source = TcpStream::connect(source_addr).await.unwrap();

    let old = connect_client(client_addr, 9).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut new = connect_client(client_addr, 9).await;
    drop(old);
    tokio::time::sleep(Duration::from_millis(100)).await;

    source.write_all(b"1|B\n").await.unwrap();
    assert_eq!(read_line(&mut new).await, "1|B\n");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn second_stop_is_rejected_and_idempotent() {
    let (mut server, _source_addr, _client_addr) = start_server().await;
    server.stop().await.unwrap();
    let err = server.stop().await.unwrap_err();
    assert!(matches!(err, follower_maze::error::ServerError::AlreadyStopped));
}
