// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end tests against the real Tokio-backed retry scheduler.

use reqrep::Requester;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::timeout;

type Req = String;
type Rep = (String, String);
type Out = (String, String);

fn build(tries: u32, retry_timeout: Duration, capacity: usize) -> Requester<Req, Rep, Out, String> {
    Requester::builder()
        .key_of_request(|req: &Req| req.clone())
        .key_of_reply(|rep: &Rep| rep.0.clone())
        .compose(|req: Req, rep: Rep| (req, rep.1))
        .timeout(retry_timeout)
        .tries(tries)
        .channel_capacity(capacity)
        .build()
        .expect("requester build")
}

#[tokio::test]
async fn echo_responder_resolves() {
    let requester = build(3, Duration::from_millis(50), 64);
    let mut results = requester.subscribe_results(16);

    // Echo responder: replies to every forwarded request.
    let mut outgoing = requester.subscribe_requests(16);
    let reply_tx = requester.reply_sender();
    tokio::spawn(async move {
        while let Some(request) = outgoing.recv().await {
            let body = format!("echo:{request}");
            if reply_tx.send((request, body)).await.is_err() {
                break;
            }
        }
    });

    requester.submit_request("ping".to_string()).await.unwrap();

    let result = timeout(Duration::from_secs(1), results.recv())
        .await
        .expect("result within a second");
    assert_eq!(result, Some(("ping".to_string(), "echo:ping".to_string())));

    let stats = requester.stats();
    assert_eq!(stats.resolved, 1);
    assert_eq!(stats.exhausted, 0);
}

#[tokio::test]
async fn silent_responder_exhausts_after_tries() {
    let requester = build(3, Duration::from_millis(25), 64);
    let mut outgoing = requester.subscribe_requests(16);
    let mut dropped = requester.subscribe_dropped_requests(16);

    requester.submit_request("void".to_string()).await.unwrap();

    let gone = timeout(Duration::from_secs(2), dropped.recv())
        .await
        .expect("drop event within two seconds");
    assert_eq!(gone, Some("void".to_string()));

    // Exactly `tries` forwards went out before giving up.
    let mut forwards = 0;
    while outgoing.try_recv().is_ok() {
        forwards += 1;
    }
    assert_eq!(forwards, 3);

    let stats = requester.stats();
    assert_eq!(stats.forwards, 3);
    assert_eq!(stats.exhausted, 1);
    assert_eq!(stats.resolved, 0);
}

#[tokio::test]
async fn lossy_responder_yields_one_terminal_outcome_per_key() {
    const KEYS: usize = 40;
    const TRIES: u32 = 3;

    let requester = build(TRIES, Duration::from_millis(20), 512);
    let mut results = requester.subscribe_results(KEYS + 8);
    let mut dropped = requester.subscribe_dropped_requests(KEYS + 8);

    // Responder that loses roughly half of all forwarded requests.
    let mut outgoing = requester.subscribe_requests(KEYS * TRIES as usize + 8);
    let reply_tx = requester.reply_sender();
    tokio::spawn(async move {
        while let Some(request) = outgoing.recv().await {
            if fastrand::bool() {
                continue;
            }
            let body = format!("r:{request}");
            if reply_tx.send((request, body)).await.is_err() {
                break;
            }
        }
    });

    for i in 0..KEYS {
        requester.submit_request(format!("k{i}")).await.unwrap();
    }

    // Every admitted key must produce exactly one terminal event.
    let mut resolved = HashSet::new();
    let mut exhausted = HashSet::new();
    let outcome = timeout(Duration::from_secs(10), async {
        while resolved.len() + exhausted.len() < KEYS {
            tokio::select! {
                Some((key, _)) = results.recv() => {
                    assert!(resolved.insert(key.clone()), "key resolved twice: {key}");
                    assert!(!exhausted.contains(&key), "key both resolved and dropped: {key}");
                }
                Some(key) = dropped.recv() => {
                    assert!(exhausted.insert(key.clone()), "key dropped twice: {key}");
                    assert!(!resolved.contains(&key), "key both dropped and resolved: {key}");
                }
            }
        }
    })
    .await;
    assert!(outcome.is_ok(), "terminal events missing after 10s");

    let stats = requester.stats();
    assert_eq!(stats.admitted, KEYS as u64);
    assert_eq!(stats.resolved + stats.exhausted, KEYS as u64);
    assert_eq!(stats.duplicates, 0);
    assert!(stats.forwards <= (KEYS as u64) * u64::from(TRIES));
}

#[tokio::test]
async fn duplicate_burst_admits_exactly_one() {
    let requester = build(2, Duration::from_millis(30), 64);
    let mut outgoing = requester.subscribe_requests(16);
    let mut dropped = requester.subscribe_dropped_requests(16);

    for _ in 0..5 {
        requester.submit_request("same".to_string()).await.unwrap();
    }

    // One admission, four immediate duplicate drops.
    assert_eq!(outgoing.recv().await, Some("same".to_string()));
    for _ in 0..4 {
        let dup = timeout(Duration::from_secs(1), dropped.recv())
            .await
            .expect("duplicate drop");
        assert_eq!(dup, Some("same".to_string()));
    }

    let stats = requester.stats();
    assert_eq!(stats.admitted, 1);
    assert_eq!(stats.duplicates, 4);
}
