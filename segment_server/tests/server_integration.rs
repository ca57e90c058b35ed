//! End-to-end tests: real server, real sockets, WAV fixtures on disk.

use hound::WavReader;
use segment_protocol::{Connection, ErrorKind, Message, ProtocolError, SegmentClient};
use segment_server::test_utils::{pcm16_spec, write_test_wav};
use segment_server::{Catalog, SegmentServer, ServerConfig, ServerHandle};
use std::io::Cursor;
use std::net::TcpStream;
use std::thread;
use tempfile::{tempdir, TempDir};

fn start_server(chunk_size: usize) -> (TempDir, ServerHandle) {
    env_logger::try_init().ok();

    let dir = tempdir().expect("Failed to create temp dir");
    write_test_wav(dir.path(), "a.wav", pcm16_spec(8000, 1), 10.0).unwrap();
    write_test_wav(dir.path(), "b.wav", pcm16_spec(16000, 2), 3.0).unwrap();

    let catalog = Catalog::build(dir.path()).expect("Failed to build catalog");
    let config = ServerConfig {
        bind_address: "127.0.0.1:0".to_string(),
        audio_dir: dir.path().to_path_buf(),
        metadata_file: dir.path().join("audio_metadata.json"),
        chunk_size,
        max_connections: 16,
    };

    let handle = SegmentServer::bind(config, catalog)
        .expect("Failed to bind server")
        .spawn()
        .expect("Failed to start server");
    (dir, handle)
}

fn wav_duration(data: &[u8]) -> (u32, u32) {
    let reader = WavReader::new(Cursor::new(data)).expect("Payload is not a valid WAV");
    (reader.duration(), reader.spec().sample_rate)
}

#[test]
fn test_list_returns_catalog() {
    let (_dir, server) = start_server(1024);
    let mut client = SegmentClient::connect(&server.address()).unwrap();

    let entries = client.list().unwrap();
    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["a.wav", "b.wav"]);
    assert_eq!(entries[0].duration, 10.0);
    assert_eq!(entries[1].duration, 3.0);

    // Same session, same answer
    assert_eq!(client.list().unwrap(), entries);
}

#[test]
fn test_fetch_two_seconds() {
    let (_dir, server) = start_server(1024);
    let mut client = SegmentClient::connect(&server.address()).unwrap();

    let segment = client.fetch_segment("a.wav", 2.0, 4.0).unwrap();
    assert_eq!(segment.frames, 16000);

    let (frames, rate) = wav_duration(&segment.data);
    assert_eq!(frames, 16000);
    assert_eq!(rate, 8000);

    let samples: Vec<i16> = WavReader::new(Cursor::new(&segment.data))
        .unwrap()
        .samples::<i16>()
        .map(|s| s.unwrap())
        .collect();
    assert_eq!(samples.first(), Some(&16000));
    assert_eq!(samples.last(), Some(&31999));
}

#[test]
fn test_errors_are_reported_and_session_survives() {
    let (_dir, server) = start_server(1024);
    let mut client = SegmentClient::connect(&server.address()).unwrap();

    match client.fetch_segment("nosuchfile.wav", -1.0, 5.0) {
        Err(ProtocolError::Remote { kind, .. }) => {
            assert!(kind == ErrorKind::NotFound || kind == ErrorKind::InvalidRange)
        }
        other => panic!("expected an error response, got {:?}", other.map(|s| s.frames)),
    }

    match client.fetch_segment("nosuchfile.wav", 1.0, 2.0) {
        Err(ProtocolError::Remote { kind, .. }) => assert_eq!(kind, ErrorKind::NotFound),
        other => panic!("expected not found, got {:?}", other.map(|s| s.frames)),
    }

    match client.send_raw("gimme a.wav").unwrap() {
        Message::ErrorResponse { kind, .. } => assert_eq!(kind, ErrorKind::MalformedCommand),
        other => panic!("expected malformed command, got {:?}", other),
    }

    match client.fetch_segment("a.wav", 10.0, 11.0) {
        Err(ProtocolError::Remote { kind, .. }) => assert_eq!(kind, ErrorKind::EmptyRange),
        other => panic!("expected empty range, got {:?}", other.map(|s| s.frames)),
    }

    // Connection is still usable
    let segment = client.fetch_segment("a.wav", 0.0, 0.5).unwrap();
    assert_eq!(segment.frames, 4000);
}

#[test]
fn test_io_failure_only_affects_that_request() {
    let (dir, server) = start_server(1024);
    let mut client = SegmentClient::connect(&server.address()).unwrap();

    std::fs::remove_file(dir.path().join("a.wav")).unwrap();
    write_test_wav(dir.path(), "b.wav", pcm16_spec(16000, 2), 0.25).unwrap();

    for (name, end) in [("a.wav", 1.0), ("b.wav", 2.0)] {
        match client.fetch_segment(name, 0.0, end) {
            Err(ProtocolError::Remote { kind, .. }) => assert_eq!(kind, ErrorKind::Io, "{}", name),
            other => panic!("{}: expected io error, got {:?}", name, other.map(|s| s.frames)),
        }
    }

    // Catalog answers are unchanged and the session keeps serving
    let names: Vec<_> = client.list().unwrap().into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["a.wav", "b.wav"]);
    let segment = client.fetch_segment("b.wav", 0.0, 0.25).unwrap();
    assert_eq!(segment.frames, 4000);
}

#[test]
fn test_concurrent_clients_get_their_own_responses() {
    let (_dir, server) = start_server(512);
    let address = server.address();

    let lister = {
        let address = address.clone();
        thread::spawn(move || {
            let mut client = SegmentClient::connect(&address).unwrap();
            for _ in 0..20 {
                let entries = client.list().unwrap();
                assert_eq!(entries.len(), 2);
            }
        })
    };

    let fetcher = thread::spawn(move || {
        let mut client = SegmentClient::connect(&address).unwrap();
        for _ in 0..5 {
            let segment = client.fetch_segment("b.wav", 0.5, 2.5).unwrap();
            assert_eq!(segment.frames, 32000);
            let (frames, rate) = wav_duration(&segment.data);
            assert_eq!((frames, rate), (32000, 16000));
        }
    });

    lister.join().expect("List client panicked");
    fetcher.join().expect("Segment client panicked");
}

#[test]
fn test_no_commands_after_shutdown_ack() {
    let (_dir, server) = start_server(1024);
    let mut client = SegmentClient::connect(&server.address()).unwrap();

    assert_eq!(client.list().unwrap().len(), 2);
    client.shutdown().unwrap();
    assert!(client.list().is_err());

    server.join().unwrap();
}

#[test]
fn test_shutdown_lets_open_sessions_finish() {
    // Small chunks so the segment spans many messages
    let (_dir, server) = start_server(256);
    let address = server.address();
    let local_addr = server.local_addr();

    // Third client is already connected and mid-request when shutdown arrives
    let mut streaming = Connection::new(TcpStream::connect(local_addr).unwrap()).unwrap();
    streaming
        .write_message(&Message::command("a.wav,0,8"))
        .unwrap();
    let mut data = match streaming.read_message().unwrap() {
        Message::SegmentChunk { data } => data,
        other => panic!("expected first chunk, got {:?}", other),
    };

    let mut stopper = SegmentClient::connect(&address).unwrap();
    stopper.shutdown().unwrap();
    server.join().unwrap();

    // Dispatcher no longer accepts
    assert!(TcpStream::connect(local_addr).is_err());

    // The in-flight segment still arrives complete
    loop {
        match streaming.read_message().unwrap() {
            Message::SegmentChunk { data: chunk } => data.extend(chunk),
            Message::SegmentEnd {
                total_bytes,
                frames,
            } => {
                assert_eq!(total_bytes, data.len() as u64);
                assert_eq!(frames, 64000);
                break;
            }
            other => panic!("unexpected {:?}", other),
        }
    }
    assert_eq!(wav_duration(&data), (64000, 8000));

    // And the session keeps serving until the client leaves
    streaming.write_message(&Message::command("list")).unwrap();
    assert!(matches!(
        streaming.read_message().unwrap(),
        Message::CatalogListing { .. }
    ));
}
