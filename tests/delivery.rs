mod common;

use std::sync::atomic::Ordering;

use common::FlakySink;
use logspool::sink::Dispatcher;

/// A sink failing exactly twice then succeeding yields exactly one
/// successful delivery: the success counter moves, the failure counter does
/// not, and nothing is sent again after the success.
#[tokio::test]
async fn retry_until_success_delivers_exactly_once() {
    let sink = FlakySink::new(2);
    let mut dispatcher = Dispatcher::new(Box::new(sink.clone()));

    dispatcher.dispatch("a.log", b"payload\n").await.unwrap();

    assert_eq!(sink.attempts.load(Ordering::SeqCst), 3);
    assert_eq!(sink.accepted.lock().unwrap().as_slice(), &[b"payload\n".to_vec()]);
    assert_eq!(dispatcher.delivered(), 1);
    assert_eq!(dispatcher.failed(), 0);
}

/// A sink that keeps failing exhausts the bounded retries; the line is
/// dropped and counted, and the dispatcher moves on instead of blocking the
/// stream.
#[tokio::test]
async fn exhausted_retries_drop_the_line_and_count_it() {
    let sink = FlakySink::new(u32::MAX);
    let mut dispatcher = Dispatcher::new(Box::new(sink.clone()));

    dispatcher.dispatch("a.log", b"doomed\n").await.unwrap();

    // 1 initial attempt + 2 retries.
    assert_eq!(sink.attempts.load(Ordering::SeqCst), 3);
    assert!(sink.accepted.lock().unwrap().is_empty());
    assert_eq!(dispatcher.delivered(), 0);
    assert_eq!(dispatcher.failed(), 1);
}

/// A bad line does not poison the stream: the next line goes through.
#[tokio::test]
async fn later_lines_survive_an_earlier_drop() {
    let sink = FlakySink::new(3);
    let mut dispatcher = Dispatcher::new(Box::new(sink.clone()));

    dispatcher.dispatch("a.log", b"dropped\n").await.unwrap();
    dispatcher.dispatch("a.log", b"kept\n").await.unwrap();

    assert_eq!(sink.accepted.lock().unwrap().as_slice(), &[b"kept\n".to_vec()]);
    assert_eq!(dispatcher.delivered(), 1);
    assert_eq!(dispatcher.failed(), 1);
}
