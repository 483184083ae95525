// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Minimal round-trip: a requester wired to an in-process echo responder.
//!
//! Run with: cargo run --example echo_correlator

use reqrep::Requester;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let requester = Requester::builder()
        .key_of_request(|req: &String| req.clone())
        .key_of_reply(|rep: &(String, String)| rep.0.clone())
        .compose(|req: String, rep: (String, String)| format!("{req} -> {}", rep.1))
        .timeout(Duration::from_millis(100))
        .tries(3)
        .build()?;

    // Responder: echoes every forwarded request back as a reply.
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

    let mut results = requester.subscribe_results(16);

    for name in ["alpha", "beta", "gamma"] {
        requester.submit_request(name.to_string()).await?;
    }

    for _ in 0..3 {
        if let Some(result) = results.recv().await {
            println!("{result}");
        }
    }

    let stats = requester.stats();
    println!(
        "resolved {} of {} admitted ({} forwards)",
        stats.resolved, stats.admitted, stats.forwards
    );

    Ok(())
}
