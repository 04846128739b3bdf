mod common;

use std::fs::{self, OpenOptions};
use std::io::Write;

use tempfile::TempDir;

use common::MemorySink;
use logspool::engine::Engine;

/// Startup against `l1\nl2\nl3` with a 2-line replay: the terminated line
/// is delivered, the unterminated tail waits as the fringe, and a later
/// appended newline completes it.
#[tokio::test]
async fn replay_buffers_unterminated_tail_until_completed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a.log");
    fs::write(&path, b"l1\nl2\nl3").unwrap();

    let sink = MemorySink::new();
    let (mut engine, _tx) = Engine::new(2, Box::new(sink.clone())).unwrap();

    engine.attach(&path).await.unwrap();

    assert_eq!(sink.lines(), vec!["l2\n"]);
    assert_eq!(engine.entry(0).splitter.fringe(), b"l3");
    assert_eq!(engine.entry(0).size, 8);

    let mut f = OpenOptions::new().append(true).open(&path).unwrap();
    f.write_all(b"\n").unwrap();
    f.flush().unwrap();

    engine.verify(0).await.unwrap();

    assert_eq!(sink.lines(), vec!["l2\n", "l3\n"]);
    assert!(engine.entry(0).splitter.fringe().is_empty());
    assert_eq!(engine.entry(0).size, 9);
}

#[tokio::test]
async fn replay_of_short_file_delivers_every_line() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("short.log");
    fs::write(&path, b"only\ntwo\n").unwrap();

    let sink = MemorySink::new();
    let (mut engine, _tx) = Engine::new(20, Box::new(sink.clone())).unwrap();

    engine.attach(&path).await.unwrap();

    assert_eq!(sink.lines(), vec!["only\n", "two\n"]);
    assert_eq!(engine.entry(0).size, 9);
}

#[tokio::test]
async fn replay_of_long_file_delivers_exactly_n_lines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("long.log");

    let mut content = String::new();
    for i in 0..100 {
        content.push_str(&format!("entry {i}\n"));
    }
    fs::write(&path, &content).unwrap();

    let sink = MemorySink::new();
    let (mut engine, _tx) = Engine::new(3, Box::new(sink.clone())).unwrap();

    engine.attach(&path).await.unwrap();

    assert_eq!(sink.lines(), vec!["entry 97\n", "entry 98\n", "entry 99\n"]);
    assert_eq!(engine.entry(0).size, content.len() as u64);
}

#[tokio::test]
async fn attaching_a_missing_file_fails_startup() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.log");

    let sink = MemorySink::new();
    let (mut engine, _tx) = Engine::new(2, Box::new(sink)).unwrap();

    assert!(engine.attach(&path).await.is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn attaching_a_symlink_fails_startup() {
    let dir = TempDir::new().unwrap();
    let real = dir.path().join("real.log");
    let link = dir.path().join("link.log");
    fs::write(&real, b"content\n").unwrap();
    std::os::unix::fs::symlink(&real, &link).unwrap();

    let sink = MemorySink::new();
    let (mut engine, _tx) = Engine::new(2, Box::new(sink)).unwrap();

    assert!(engine.attach(&link).await.is_err());
}
