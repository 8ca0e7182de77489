//! Resilient merge behavior against scripted producers

mod common;

use common::{capture_logs, eventually, seq, Ending, ScriptedSource};
use futures::StreamExt;
use proptest::prelude::*;
use std::collections::HashMap;
use std::time::Duration;
use tokio_test::assert_pending;

use validator_core::swarm::{merge_resilient, Event, ProducerHandle};

async fn drain(handles: Vec<ProducerHandle>) -> Vec<Event> {
    let mut merge = merge_resilient(handles);
    let mut events = Vec::new();
    while let Some(event) = merge.next().await {
        events.push(event);
    }
    merge.close().await;
    events
}

fn count_by_author(events: &[Event]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for event in events {
        *counts.entry(event.author.clone()).or_insert(0) += 1;
    }
    counts
}

#[tokio::test]
async fn three_clean_producers_yield_every_event() {
    let handles = ["x", "y", "z"]
        .iter()
        .enumerate()
        .map(|(i, name)| ScriptedSource::new(name, 2, Ending::Exhausted).into_handle(i))
        .collect();

    let mut merge = merge_resilient(handles);
    let mut events = Vec::new();
    while let Some(event) = merge.next().await {
        events.push(event);
    }

    assert_eq!(events.len(), 6);
    assert_eq!(merge.started(), 3);
    assert_eq!(merge.finished(), 3);
    let counts = count_by_author(&events);
    assert_eq!(counts["x"], 2);
    assert_eq!(counts["y"], 2);
    assert_eq!(counts["z"], 2);
    merge.close().await;
}

#[tokio::test]
async fn failing_producer_is_isolated_and_named_in_logs() {
    let (logs, _guard) = capture_logs();
    let handles = vec![
        ScriptedSource::new("reddit", 1, Ending::Fails).into_handle(0),
        ScriptedSource::new("github", 2, Ending::Exhausted).into_handle(1),
        ScriptedSource::new("openalex", 2, Ending::Exhausted).into_handle(2),
    ];

    let events = drain(handles).await;

    assert_eq!(events.len(), 5);
    let counts = count_by_author(&events);
    assert_eq!(counts["reddit"], 1);
    let output = logs.contents();
    assert!(output.contains("Producer 'reddit' failed"), "logs: {}", output);
    assert!(output.contains("lost its connection"));
}

#[tokio::test]
async fn producer_failing_on_first_pull_yields_nothing() {
    let events = drain(vec![ScriptedSource::new("x", 0, Ending::Fails).into_handle(0)]).await;
    assert!(events.is_empty());
}

#[tokio::test]
async fn empty_producer_list_yields_nothing() {
    let mut merge = merge_resilient(Vec::new());
    assert_eq!(merge.started(), 0);
    assert!(merge.next().await.is_none());
    merge.close().await;
}

#[tokio::test]
async fn panicking_producer_is_isolated() {
    let (logs, _guard) = capture_logs();
    let handles = vec![
        ScriptedSource::new("google_trends", 1, Ending::Panics).into_handle(0),
        ScriptedSource::new("brave_search", 3, Ending::Exhausted).into_handle(1),
    ];

    let events = drain(handles).await;

    assert_eq!(events.len(), 4);
    let output = logs.contents();
    assert!(output.contains("Producer 'google_trends' panicked"), "logs: {}", output);
    assert!(output.contains("google_trends crashed"));
}

#[tokio::test]
async fn producer_waits_for_resume_before_pulling_again() {
    let sources = vec![
        ScriptedSource::new("a", 3, Ending::Exhausted),
        ScriptedSource::new("b", 3, Ending::Exhausted),
    ];
    let probes: HashMap<String, _> = ["a", "b"]
        .iter()
        .zip(&sources)
        .map(|(name, source)| (name.to_string(), source.probe()))
        .collect();
    let handles = sources
        .into_iter()
        .enumerate()
        .map(|(i, s)| s.into_handle(i))
        .collect();

    let mut merge = merge_resilient(handles);
    while let Some(event) = merge.next().await {
        // Give every task a chance to run ahead if it could
        tokio::time::sleep(Duration::from_millis(5)).await;
        let probe = &probes[&event.author];
        assert_eq!(
            probe.pulls(),
            seq(&event) + 1,
            "{} pulled ahead of the consumer",
            event.author
        );
    }
    merge.close().await;
}

#[tokio::test]
async fn next_stays_pending_while_a_producer_runs() {
    let mut merge = merge_resilient(vec![ScriptedSource::new("x", 0, Ending::Hangs).into_handle(0)]);
    for _ in 0..3 {
        tokio::task::yield_now().await;
    }

    {
        let mut next = tokio_test::task::spawn(merge.next());
        assert_pending!(next.poll());
    }

    assert_eq!(merge.finished(), 0);
    merge.close().await;
}

#[tokio::test]
async fn close_tears_down_every_producer_once() {
    let sources = vec![
        ScriptedSource::new("a", 1, Ending::Hangs),
        ScriptedSource::new("b", 5, Ending::Exhausted).with_delay(Duration::from_millis(20)),
        ScriptedSource::new("c", 0, Ending::Hangs),
    ];
    let probes: Vec<_> = sources.iter().map(|s| s.probe()).collect();
    let handles = sources
        .into_iter()
        .enumerate()
        .map(|(i, s)| s.into_handle(i))
        .collect();

    let mut merge = merge_resilient(handles);
    let first = merge.next().await;
    assert!(first.is_some());

    tokio::time::timeout(Duration::from_secs(1), merge.close())
        .await
        .expect("close finished in time");

    for probe in &probes {
        assert_eq!(probe.closes(), 1);
        assert!(probe.released());
    }
}

#[tokio::test]
async fn dropping_merge_tears_down_every_producer_once() {
    let sources = vec![
        ScriptedSource::new("a", 2, Ending::Hangs),
        ScriptedSource::new("b", 0, Ending::Hangs),
    ];
    let probes: Vec<_> = sources.iter().map(|s| s.probe()).collect();
    let handles = sources
        .into_iter()
        .enumerate()
        .map(|(i, s)| s.into_handle(i))
        .collect();

    let mut merge = merge_resilient(handles);
    assert!(merge.next().await.is_some());
    drop(merge);

    let torn_down = eventually(Duration::from_secs(1), || {
        probes.iter().all(|p| p.closes() == 1 && p.released())
    })
    .await;
    assert!(torn_down);

    // No second close arrives later
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(probes.iter().all(|p| p.closes() == 1));
}

#[tokio::test]
async fn dropping_stream_adapter_tears_down_producers() {
    let source = ScriptedSource::new("a", 10, Ending::Exhausted);
    let probe = source.probe();

    let mut stream = Box::pin(merge_resilient(vec![source.into_handle(0)]).into_stream());
    assert!(stream.next().await.is_some());
    drop(stream);

    assert!(eventually(Duration::from_secs(1), || probe.closes() == 1).await);
    assert!(probe.pulls() < 10);
}

#[tokio::test]
async fn close_errors_are_swallowed() {
    let (logs, _guard) = capture_logs();
    let source = ScriptedSource::new("a", 1, Ending::Exhausted).with_failing_close();
    let probe = source.probe();

    let events = drain(vec![source.into_handle(0)]).await;

    assert_eq!(events.len(), 1);
    assert_eq!(probe.closes(), 1);
    assert!(logs.contents().contains("Ignoring producer close error"));
}

#[derive(Debug, Clone, Copy)]
struct Script {
    events: usize,
    ending: Ending,
}

fn arb_script() -> impl Strategy<Value = Script> {
    (
        0usize..5,
        prop_oneof![
            Just(Ending::Exhausted),
            Just(Ending::Fails),
            Just(Ending::Panics)
        ],
    )
        .prop_map(|(events, ending)| Script { events, ending })
}

fn run_scripts(scripts: &[Script]) -> Vec<Event> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let handles = scripts
        .iter()
        .enumerate()
        .map(|(i, s)| ScriptedSource::new(&format!("p{}", i), s.events, s.ending).into_handle(i))
        .collect();
    runtime.block_on(drain(handles))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn merged_stream_is_union_of_emitted_events(scripts in prop::collection::vec(arb_script(), 0..6)) {
        let events = run_scripts(&scripts);

        let expected: usize = scripts.iter().map(|s| s.events).sum();
        prop_assert_eq!(events.len(), expected);
        let counts = count_by_author(&events);
        for (i, script) in scripts.iter().enumerate() {
            let name = format!("p{}", i);
            prop_assert_eq!(counts.get(&name).copied().unwrap_or(0), script.events);
        }
    }

    #[test]
    fn per_producer_order_is_preserved(scripts in prop::collection::vec(arb_script(), 1..6)) {
        let events = run_scripts(&scripts);

        let mut by_producer: HashMap<String, Vec<usize>> = HashMap::new();
        for event in &events {
            by_producer.entry(event.author.clone()).or_default().push(seq(event));
        }
        for (name, seen) in by_producer {
            let expected: Vec<usize> = (0..seen.len()).collect();
            prop_assert_eq!(seen, expected, "producer {} out of order", name);
        }
    }
}
