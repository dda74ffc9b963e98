//! Hub relaying between sources and replicas over loopback TCP

use crate::integration::test_utils::{
    read_file, start_hub, wait_until, write_file, RawPeer, DEVELOPER_KEY,
};
use roomsync::client::Client;
use roomsync::config::ClientConfig;
use roomsync::protocol::{self, UserCodeReport, ACCEPTED, REJECTED};
use roomsync::tree::{Changeset, FileEntry, Repository};
use std::collections::BTreeMap;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::thread;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn source_handshake(room: &str) -> String {
    format!("{}{}", DEVELOPER_KEY, room)
}

fn initial_snapshot() -> Changeset {
    let mut snapshot = Changeset::new();
    snapshot.new_directories = vec!["/".to_string(), "/src/".to_string()];
    snapshot.new_files = vec!["/src/Main.java".to_string()];
    snapshot.changed_files.insert(
        "/src/Main.java".to_string(),
        FileEntry::from_lines(vec![
            "class Main {".to_string(),
            "    // <USER CODE>".to_string(),
            "    // </USER CODE>".to_string(),
            "}".to_string(),
        ]),
    );
    snapshot
}

fn connect_source(addr: SocketAddr) -> RawPeer {
    let (mut source, answer) = RawPeer::connect(addr, &source_handshake("lab"));
    assert_eq!(answer, ACCEPTED);
    source.send(&protocol::encode_changeset(&initial_snapshot()).unwrap());
    source
}

fn connect_replica(addr: SocketAddr) -> RawPeer {
    let (mut replica, answer) = RawPeer::connect(addr, "lab");
    assert_eq!(answer, ACCEPTED);
    replica.send(&protocol::encode_replica_snapshot(&Changeset::new()).unwrap());
    replica
}

#[test]
fn test_late_replica_receives_full_tree() {
    let addr = start_hub(None);
    let _source = connect_source(addr);
    let mut replica = connect_replica(addr);

    let line = replica.recv().expect("catch-up changeset");
    let catch_up = protocol::decode_changeset(&line).unwrap();

    let mut tree = Repository::new();
    tree.apply_changeset(&catch_up).unwrap();
    let expected = Repository::from_snapshot(&initial_snapshot(), roomsync::types::Role::Source)
        .unwrap();
    assert_eq!(tree, expected);
}

#[test]
fn test_source_changes_are_relayed() {
    let addr = start_hub(None);
    let mut source = connect_source(addr);
    let mut replica = connect_replica(addr);
    replica.recv().expect("catch-up changeset");

    let mut changes = Changeset::new();
    changes.new_files.push("/src/Util.java".to_string());
    changes.changed_files.insert(
        "/src/Util.java".to_string(),
        FileEntry::from_lines(vec!["class Util {}".to_string()]),
    );
    source.send(&protocol::encode_changeset(&changes).unwrap());

    let relayed = protocol::decode_changeset(&replica.recv().expect("relayed changes")).unwrap();
    assert_eq!(relayed.new_files, vec!["/src/Util.java".to_string()]);
    assert_eq!(
        relayed.changed_files["/src/Util.java"].content.as_deref(),
        Some(&["class Util {}".to_string()][..])
    );
}

#[test]
fn test_wrong_room_is_rejected() {
    let addr = start_hub(None);
    let _source = connect_source(addr);

    let (mut stranger, answer) = RawPeer::connect(addr, "other-room");
    assert_eq!(answer, REJECTED);
    assert_eq!(stranger.recv(), None);
}

#[test]
fn test_configured_room_accepts_replica_before_source() {
    let addr = start_hub(Some("lab"));
    let (_replica, answer) = RawPeer::connect(addr, "lab");
    assert_eq!(answer, ACCEPTED);
}

#[test]
fn test_user_code_reaches_source() {
    let addr = start_hub(None);
    let mut source = connect_source(addr);
    let mut replica = connect_replica(addr);
    replica.recv().expect("catch-up changeset");

    let report = UserCodeReport {
        path: "/src/Main.java".to_string(),
        regions: BTreeMap::from([("0".to_string(), vec!["    return 42;".to_string()])]),
    };
    replica.send(&protocol::encode_user_code_report(&report).unwrap());

    let broadcast =
        protocol::decode_user_code_broadcast(&source.recv().expect("user code broadcast"))
            .unwrap();
    assert_eq!(
        broadcast.files["/src/Main.java"]["0"],
        vec!["    return 42;".to_string()]
    );
}

#[test]
fn test_malformed_message_closes_only_that_session() {
    let addr = start_hub(None);
    let mut source = connect_source(addr);

    let (mut broken, answer) = RawPeer::connect(addr, "lab");
    assert_eq!(answer, ACCEPTED);
    broken.send("this is not json");
    assert_eq!(broken.recv(), None);

    let mut replica = connect_replica(addr);
    assert!(replica.recv().is_some());

    source.send(&protocol::encode_changeset(&Changeset::new()).unwrap());
    let keep_alive = protocol::decode_changeset(&replica.recv().expect("keep-alive")).unwrap();
    assert!(keep_alive.is_empty());
}

fn client_config(addr: SocketAddr, workspace: &Path, developer_key: Option<&str>) -> ClientConfig {
    ClientConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        room: "lab".to_string(),
        developer_key: developer_key.map(str::to_string),
        workspace: workspace.to_path_buf(),
        scan_interval_ms: 50,
        reconnect_delay_ms: 100,
        ..ClientConfig::default()
    }
}

#[test]
fn test_clients_mirror_a_workspace() {
    let addr = start_hub(None);
    let source_dir = TempDir::new().unwrap();
    let replica_dir = TempDir::new().unwrap();

    let mut source = Client::new(client_config(addr, source_dir.path(), Some(DEVELOPER_KEY))).unwrap();
    let source_handle = source.handle();
    let source_thread = thread::spawn(move || source.run());

    write_file(source_dir.path(), "/src/Main.java", "class Main {}\n");

    let mut replica = Client::new(client_config(addr, replica_dir.path(), None)).unwrap();
    let replica_handle = replica.handle();
    let replica_thread = thread::spawn(move || replica.run());

    assert!(wait_until(Duration::from_secs(10), || {
        read_file(replica_dir.path(), "/src/Main.java").as_deref() == Some("class Main {}\n")
    }));

    let path = source_dir.path().join("src/Main.java");
    fs::write(&path, "class Main { int x; }\n").unwrap();
    fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(10))
        .unwrap();

    assert!(wait_until(Duration::from_secs(10), || {
        read_file(replica_dir.path(), "/src/Main.java").as_deref()
            == Some("class Main { int x; }\n")
    }));

    assert!(source_handle.stop());
    assert!(replica_handle.stop());
    source_thread.join().unwrap();
    replica_thread.join().unwrap();
}

#[test]
fn test_replica_retries_writes_blocked_by_local_file() {
    let addr = start_hub(None);
    let source_dir = TempDir::new().unwrap();
    let replica_dir = TempDir::new().unwrap();

    let mut source = Client::new(client_config(addr, source_dir.path(), Some(DEVELOPER_KEY))).unwrap();
    write_file(source_dir.path(), "/d/A.java", "class A {}\n");
    write_file(source_dir.path(), "/ok.txt", "ok\n");
    let source_handle = source.handle();
    let source_thread = thread::spawn(move || source.run());

    let mut replica = Client::new(client_config(addr, replica_dir.path(), None)).unwrap();
    // Not a text file, so it stays out of the replica's snapshot
    fs::write(replica_dir.path().join("d"), [0u8, 159, 146, 150]).unwrap();
    let replica_handle = replica.handle();
    let replica_thread = thread::spawn(move || replica.run());

    assert!(wait_until(Duration::from_secs(10), || {
        read_file(replica_dir.path(), "/ok.txt").as_deref() == Some("ok\n")
    }));
    assert!(replica_dir.path().join("d").is_file());

    fs::remove_file(replica_dir.path().join("d")).unwrap();
    assert!(wait_until(Duration::from_secs(10), || {
        read_file(replica_dir.path(), "/d/A.java").as_deref() == Some("class A {}\n")
    }));

    assert!(source_handle.stop());
    assert!(replica_handle.stop());
    source_thread.join().unwrap();
    replica_thread.join().unwrap();
}
