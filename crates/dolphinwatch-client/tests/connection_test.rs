use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dolphinwatch_client::{
    ClientError, ConnectionConfig, FrameConfig, ConnectionState, DisconnectReason, DolphinConnection,
    GcPadButtons, HandlerResult, LogSink, MemoryValue, RemoteLogLevel, StickState, WiimoteButtons,
};

const WAIT: Duration = Duration::from_secs(3);
const QUIET: Duration = Duration::from_millis(200);

/// Server side of a loopback connection.
struct FakeServer {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl FakeServer {
    fn next_line(&mut self) -> String {
        let mut line = String::new();
        let n = self
            .reader
            .read_line(&mut line)
            .expect("server should read a command");
        assert!(n > 0, "client closed the connection");
        line.trim_end_matches('\n').to_string()
    }

    fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .expect("server should write a message");
    }
}

fn listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let port = listener.local_addr().expect("listener has address").port();
    (listener, port)
}

fn accept(listener: &TcpListener) -> FakeServer {
    let (stream, _) = listener.accept().expect("listener should accept");
    stream
        .set_read_timeout(Some(WAIT))
        .expect("read timeout should apply");
    FakeServer {
        reader: BufReader::new(stream.try_clone().expect("stream should clone")),
        writer: stream,
    }
}

fn connected_pair() -> (DolphinConnection, FakeServer, TcpListener) {
    let (listener, port) = listener();
    let connection = DolphinConnection::new("127.0.0.1", port);
    connection.connect();
    assert!(connection.is_connected());
    let server = accept(&listener);
    (connection, server, listener)
}

fn forward(tx: Sender<MemoryValue>) -> impl Fn(MemoryValue) -> HandlerResult {
    move |value: MemoryValue| -> HandlerResult {
        tx.send(value)?;
        Ok(())
    }
}

fn reasons(connection: &DolphinConnection) -> Receiver<DisconnectReason> {
    let (tx, rx) = mpsc::channel();
    connection.on_disconnect(move |_, reason| {
        let _ = tx.send(reason);
    });
    rx
}

struct ChannelSink(Sender<(RemoteLogLevel, String)>);

impl LogSink for ChannelSink {
    fn log(&self, level: RemoteLogLevel, message: &str) {
        let _ = self.0.send((level, message.to_string()));
    }
}

#[test]
fn one_shot_read_fires_once() {
    let (connection, mut server, _listener) = connected_pair();
    let (tx, rx) = mpsc::channel();

    connection
        .read8(0x8000_0000, forward(tx))
        .expect("read should be sent");
    assert_eq!(server.next_line(), "READ 8 2147483648");

    server.send("MEM 2147483648 7");
    server.send("MEM 2147483648 8");

    assert_eq!(rx.recv_timeout(WAIT).expect("value"), MemoryValue::Single(7));
    assert!(rx.recv_timeout(QUIET).is_err());
    assert!(connection.is_connected());
}

#[test]
fn subscription_fires_until_unsubscribed() {
    let (connection, mut server, _listener) = connected_pair();
    let (tx, rx) = mpsc::channel();

    connection
        .subscribe16(64, forward(tx))
        .expect("subscribe should be sent");
    assert_eq!(server.next_line(), "SUBSCRIBE 16 64");

    server.send("MEM 64 1");
    server.send("MEM 64 2");
    assert_eq!(rx.recv_timeout(WAIT).expect("first"), MemoryValue::Single(1));
    assert_eq!(rx.recv_timeout(WAIT).expect("second"), MemoryValue::Single(2));

    connection.unsubscribe(64).expect("unsubscribe should be sent");
    assert_eq!(server.next_line(), "UNSUBSCRIBE 64");

    server.send("MEM 64 3");
    assert!(rx.recv_timeout(QUIET).is_err());
}

#[test]
fn multi_subscription_delivers_bytes_in_order() {
    let (connection, mut server, _listener) = connected_pair();
    let (tx, rx) = mpsc::channel();

    connection
        .subscribe_multi(4, 128, forward(tx))
        .expect("subscribe should be sent");
    assert_eq!(server.next_line(), "SUBSCRIBE_MULTI 4 128");

    server.send("MEM_MULTI 128 1 2 3 4");
    assert_eq!(
        rx.recv_timeout(WAIT).expect("bytes"),
        MemoryValue::Multi(vec![1, 2, 3, 4])
    );

    connection
        .unsubscribe_multi(128)
        .expect("unsubscribe should be sent");
    assert_eq!(server.next_line(), "UNSUBSCRIBE_MULTI 128");
}

#[test]
fn batch_is_sent_as_one_line() {
    let (connection, mut server, _listener) = connected_pair();

    connection.start_batch();
    assert!(connection.is_batching());
    connection.write8(16, 1).expect("batched write");
    connection.write8(20, 2).expect("batched write");
    connection.end_batch().expect("batch should be sent");
    assert!(!connection.is_batching());

    assert_eq!(server.next_line(), "WRITE 8 16 1;WRITE 8 20 2;");

    connection.pause().expect("pause should be sent");
    assert_eq!(server.next_line(), "PAUSE");
}

#[test]
fn invalid_filenames_are_never_sent() {
    let (connection, mut server, _listener) = connected_pair();

    assert!(matches!(
        connection.save("bad|name.sav"),
        Err(ClientError::Protocol(_))
    ));
    assert!(matches!(
        connection.insert("what?.iso"),
        Err(ClientError::Protocol(_))
    ));
    connection.save("slot1.sav").expect("save should be sent");

    assert_eq!(server.next_line(), "SAVE slot1.sav");
}

#[test]
fn misaligned_subscribe32_sends_nothing() {
    let (connection, mut server, _listener) = connected_pair();

    let result = connection.subscribe32(6, |_| Ok(()));
    assert!(matches!(result, Err(ClientError::Protocol(_))));
    connection.pause().expect("pause should be sent");

    assert_eq!(server.next_line(), "PAUSE");
}

#[test]
fn load_reports_server_verdict() {
    let (connection, mut server, _listener) = connected_pair();

    for (answer, expected) in [("SUCCESS", true), ("FAIL", false)] {
        let loader = {
            let connection = connection.clone();
            thread::spawn(move || connection.load("state.sav"))
        };
        assert_eq!(server.next_line(), "LOAD state.sav");
        server.send(answer);

        let result = loader.join().expect("loader thread should finish");
        assert_eq!(result.expect("load should complete"), expected);
    }
}

#[test]
fn load_fails_when_connection_drops() {
    let (connection, mut server, _listener) = connected_pair();
    let rx = reasons(&connection);

    let loader = {
        let connection = connection.clone();
        thread::spawn(move || connection.load("state.sav"))
    };
    assert_eq!(server.next_line(), "LOAD state.sav");
    drop(server);

    let result = loader.join().expect("loader thread should finish");
    assert!(!result.expect("load should complete"));
    assert_eq!(
        rx.recv_timeout(WAIT).expect("disconnect reason"),
        DisconnectReason::ConnectionClosedByPeer
    );
    assert_eq!(connection.state(), ConnectionState::Disconnected);
}

#[test]
fn load_times_out_when_configured() {
    let (listener, port) = listener();
    let config = ConnectionConfig {
        ack_timeout: Some(Duration::from_millis(100)),
        ..ConnectionConfig::default()
    };
    let connection = DolphinConnection::with_config("127.0.0.1", port, config, None);
    connection.connect();
    let mut server = accept(&listener);

    let result = connection.load("slow.sav");
    assert_eq!(server.next_line(), "LOAD slow.sav");
    assert!(matches!(result, Err(ClientError::AckTimeout(_))));
    assert!(connection.is_connected());
}

#[test]
fn unanswered_load_is_superseded() {
    let (listener, port) = listener();
    let config = ConnectionConfig {
        ack_drain_timeout: Duration::from_millis(50),
        ack_timeout: Some(Duration::from_millis(100)),
        ..ConnectionConfig::default()
    };
    let connection = DolphinConnection::with_config("127.0.0.1", port, config, None);
    connection.connect();
    let mut server = accept(&listener);

    let first = connection.load("slow.sav");
    assert!(matches!(first, Err(ClientError::AckTimeout(_))));
    assert_eq!(server.next_line(), "LOAD slow.sav");

    let loader = {
        let connection = connection.clone();
        thread::spawn(move || connection.load("next.sav"))
    };
    assert_eq!(server.next_line(), "LOAD next.sav");
    server.send("SUCCESS");

    let second = loader.join().expect("loader thread should finish");
    assert!(second.expect("second load should complete"));
}

#[test]
fn oversized_message_drops_connection() {
    let (listener, port) = listener();
    let config = ConnectionConfig {
        frame: FrameConfig {
            max_message_size: 16,
            ..FrameConfig::default()
        },
        ..ConnectionConfig::default()
    };
    let connection = DolphinConnection::with_config("127.0.0.1", port, config, None);
    let rx = reasons(&connection);
    connection.connect();
    let mut server = accept(&listener);

    let loader = {
        let connection = connection.clone();
        thread::spawn(move || connection.load("state.sav"))
    };
    assert_eq!(server.next_line(), "LOAD state.sav");
    server
        .writer
        .write_all(b"MEM_MULTI 0 1 2 3 4 5 6 7 8 9")
        .expect("server should write");

    let result = loader.join().expect("loader thread should finish");
    assert!(!result.expect("load should complete"));
    assert_eq!(
        rx.recv_timeout(WAIT).expect("disconnect reason"),
        DisconnectReason::ConnectionLost
    );
    assert_eq!(connection.state(), ConnectionState::Disconnected);
    assert!(connection.pause().unwrap_err().is_not_connected());
}

#[test]
fn host_disconnect_is_reported_once() {
    let (connection, _server, _listener) = connected_pair();
    let rx = reasons(&connection);

    connection.disconnect();
    connection.disconnect();

    assert_eq!(
        rx.recv_timeout(WAIT).expect("disconnect reason"),
        DisconnectReason::ConnectionClosedByHost
    );
    assert!(rx.recv_timeout(QUIET).is_err());
    assert!(connection.pause().unwrap_err().is_not_connected());
}

#[test]
fn peer_close_is_reported() {
    let (connection, server, _listener) = connected_pair();
    let rx = reasons(&connection);

    drop(server);

    assert_eq!(
        rx.recv_timeout(WAIT).expect("disconnect reason"),
        DisconnectReason::ConnectionClosedByPeer
    );
    assert!(!connection.is_connected());
}

#[test]
fn failed_connect_is_reported() {
    let (listener, port) = listener();
    drop(listener);

    let connection = DolphinConnection::new("127.0.0.1", port);
    let rx = reasons(&connection);
    connection.connect();

    assert_eq!(
        rx.recv_timeout(WAIT).expect("disconnect reason"),
        DisconnectReason::ConnectionNotEstablished
    );
    assert_eq!(connection.state(), ConnectionState::Disconnected);
}

#[test]
fn reconnect_closes_previous_connection() {
    let (listener, port) = listener();
    let connection = DolphinConnection::new("127.0.0.1", port);
    let rx = reasons(&connection);
    let (connected_tx, connected_rx) = mpsc::channel();
    connection.on_connect(move |connection| {
        let _ = connected_tx.send(connection.port());
    });

    connection.connect();
    let _first = accept(&listener);
    connection.connect();
    let mut second = accept(&listener);

    assert_eq!(connected_rx.recv_timeout(WAIT).expect("first connect"), port);
    assert_eq!(connected_rx.recv_timeout(WAIT).expect("second connect"), port);
    assert_eq!(
        rx.recv_timeout(WAIT).expect("disconnect reason"),
        DisconnectReason::ConnectionClosedByHost
    );
    // The first connection's receive loop must not end the second one.
    assert!(rx.recv_timeout(QUIET).is_err());

    connection.resume().expect("resume should be sent");
    assert_eq!(second.next_line(), "RESUME");
}

#[test]
fn overlapping_connects_leave_one_live_connection() {
    let (listener, port) = listener();
    let connection = DolphinConnection::new("127.0.0.1", port);
    let rx = reasons(&connection);

    let attempts: Vec<_> = (0..4)
        .map(|_| {
            let connection = connection.clone();
            thread::spawn(move || connection.connect())
        })
        .collect();
    let mut servers: Vec<FakeServer> = (0..4).map(|_| accept(&listener)).collect();
    for attempt in attempts {
        attempt.join().expect("connect thread should finish");
    }

    assert!(connection.is_connected());
    for _ in 0..3 {
        assert_eq!(
            rx.recv_timeout(WAIT).expect("disconnect reason"),
            DisconnectReason::ConnectionClosedByHost
        );
    }
    assert!(rx.recv_timeout(QUIET).is_err());

    // Every replaced socket is closed; exactly one stays open.
    let mut open = Vec::new();
    for (index, server) in servers.iter_mut().enumerate() {
        server
            .writer
            .set_read_timeout(Some(QUIET))
            .expect("read timeout should apply");
        let mut byte = [0u8; 1];
        match server.writer.read(&mut byte) {
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                open.push(index)
            }
            _ => {}
        }
    }
    assert_eq!(open.len(), 1, "open sockets: {open:?}");

    connection.pause().expect("pause should be sent");
    assert_eq!(servers[open[0]].next_line(), "PAUSE");

    connection.disconnect();
    let mut byte = [0u8; 1];
    let closed = servers[open[0]]
        .writer
        .read(&mut byte)
        .expect("closed socket reads EOF");
    assert_eq!(closed, 0);
    assert!(connection.pause().unwrap_err().is_not_connected());
}

#[test]
fn disconnect_hook_can_reconnect() {
    let (listener, port) = listener();
    let connection = DolphinConnection::new("127.0.0.1", port);
    let (tx, rx) = mpsc::channel();
    connection.on_disconnect(move |connection, reason| {
        if reason == DisconnectReason::ConnectionClosedByPeer {
            connection.connect();
        }
        let _ = tx.send(reason);
    });

    connection.connect();
    let first = accept(&listener);
    drop(first);
    let mut second = accept(&listener);

    assert_eq!(
        rx.recv_timeout(WAIT).expect("disconnect reason"),
        DisconnectReason::ConnectionClosedByPeer
    );
    connection.stop().expect("stop should be sent");
    assert_eq!(second.next_line(), "STOP");
    assert!(rx.recv_timeout(QUIET).is_err());
}

#[test]
fn server_logs_reach_sink() {
    let (listener, port) = listener();
    let (tx, rx) = mpsc::channel();
    let sink: Arc<dyn LogSink> = Arc::new(ChannelSink(tx));
    let connection =
        DolphinConnection::with_config("127.0.0.1", port, ConnectionConfig::default(), Some(sink));
    connection.connect();
    let mut server = accept(&listener);

    server.send("LOG 3 savestate slot is empty");
    server.send("LOG 5 tick");

    assert_eq!(
        rx.recv_timeout(WAIT).expect("first log"),
        (RemoteLogLevel::Warning, "savestate slot is empty".to_string())
    );
    assert_eq!(
        rx.recv_timeout(WAIT).expect("second log"),
        (RemoteLogLevel::Debug, "tick".to_string())
    );
}

#[test]
fn unexpected_messages_keep_connection_alive() {
    let (connection, mut server, _listener) = connected_pair();
    let (tx, rx) = mpsc::channel();

    server.send("MEM 4 1");
    server.send("GARBAGE here");
    server.send("");
    server.send("MEM not-a-number 2");
    server.send("SUCCESS");

    connection.read32(8, forward(tx)).expect("read should be sent");
    assert_eq!(server.next_line(), "READ 32 8");
    server.send("MEM 8 305419896");

    assert_eq!(
        rx.recv_timeout(WAIT).expect("value"),
        MemoryValue::Single(0x1234_5678)
    );
    assert!(connection.is_connected());
}

#[test]
fn control_and_input_commands() {
    let (connection, mut server, _listener) = connected_pair();

    connection.volume(80).expect("volume");
    connection.speed(2.0).expect("speed");
    connection.write16(0x10, 0xBEEF).expect("write16");
    connection.write32(0x20, 1).expect("write32");
    connection.write_multi(0x30, &[1, 2]).expect("write_multi");
    connection
        .wii_buttons(0, WiimoteButtons::A | WiimoteButtons::B)
        .expect("wii buttons");
    connection
        .gc_buttons(1, GcPadButtons::START, StickState::UP)
        .expect("gc buttons");
    connection.reset().expect("reset");
    connection.stop().expect("stop");
    connection.insert("C:/games/game.iso").expect("insert");

    for expected in [
        "VOLUME 80",
        "SPEED 2.000000",
        "WRITE 16 16 48879",
        "WRITE 32 32 1",
        "WRITE_MULTI 48 1 2",
        "BUTTONSTATES_WII 0 3072",
        "BUTTONSTATES_GC 1 4096 0.000000 1.000000 0.000000 0.000000",
        "RESET",
        "STOP",
        "INSERT C:/games/game.iso",
    ] {
        assert_eq!(server.next_line(), expected);
    }
}
