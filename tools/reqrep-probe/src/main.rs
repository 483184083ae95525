// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! reqrep-probe - correlator soak tool
//!
//! Drives a requester against a simulated lossy responder and reports
//! outcome counts and resolution-latency statistics.

use clap::Parser;
use colored::*;
use reqrep::Requester;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Correlator soak tool
#[derive(Parser, Debug)]
#[command(name = "reqrep-probe")]
#[command(version = "0.1.0")]
#[command(about = "Drive a request/reply correlator against a lossy responder")]
struct Args {
    /// Number of distinct requests to submit
    #[arg(short = 'n', long, default_value = "100")]
    count: u64,

    /// Maximum forwards per request (the first send counts as try #1)
    #[arg(short, long, default_value = "3")]
    tries: u32,

    /// Retry timeout in milliseconds
    #[arg(long, default_value = "50")]
    timeout_ms: u64,

    /// Percentage of forwarded requests the responder loses (0-100)
    #[arg(short, long, default_value = "30")]
    loss: f64,

    /// Responder reply delay in milliseconds
    #[arg(long, default_value = "10")]
    reply_delay_ms: u64,

    /// Extra duplicate submissions sharing the first request's key
    #[arg(long, default_value = "0")]
    duplicates: u64,

    /// Output JSON results
    #[arg(long)]
    json: bool,

    /// Quiet mode - only output final results
    #[arg(long)]
    quiet: bool,
}

/// Request payload: the correlation key plus the submission timestamp,
/// so the composer can report round-trip latency.
#[derive(Debug, Clone)]
struct ProbeRequest {
    key: String,
    submitted_at: Instant,
}

#[tokio::main]
async fn main() {
    // Initialize logger for RUST_LOG-based debug output
    env_logger::init();

    let args = Args::parse();

    if let Err(e) = run(&args).await {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    // Setup Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    if !args.quiet && !args.json {
        eprintln!("{} Correlator probe", ">>>".green().bold());
        eprintln!(
            "    count={}, tries={}, timeout={}ms, loss={}%, reply_delay={}ms, duplicates={}",
            args.count, args.tries, args.timeout_ms, args.loss, args.reply_delay_ms, args.duplicates
        );
    }

    let capacity = (args.count as usize * args.tries as usize).max(64);
    let requester = Requester::builder()
        .key_of_request(|req: &ProbeRequest| req.key.clone())
        .key_of_reply(|key: &String| key.clone())
        .compose(|req: ProbeRequest, _key: String| (req.key, req.submitted_at.elapsed()))
        .timeout(Duration::from_millis(args.timeout_ms))
        .tries(args.tries)
        .channel_capacity(capacity)
        .build()?;

    let mut results = requester.subscribe_results(capacity);

    // Lossy responder: answers each forwarded request with probability
    // (100 - loss)% after reply_delay_ms.
    let mut outgoing = requester.subscribe_requests(capacity);
    let reply_tx = requester.reply_sender();
    let loss = args.loss;
    let reply_delay = Duration::from_millis(args.reply_delay_ms);
    tokio::spawn(async move {
        while let Some(request) = outgoing.recv().await {
            if fastrand::f64() * 100.0 < loss {
                log::debug!("responder: losing {}", request.key);
                continue;
            }
            let tx = reply_tx.clone();
            tokio::spawn(async move {
                if !reply_delay.is_zero() {
                    tokio::time::sleep(reply_delay).await;
                }
                let _ = tx.send(request.key).await;
            });
        }
    });

    let start = Instant::now();

    // Submit the workload.
    for i in 0..args.count {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let request = ProbeRequest {
            key: format!("probe-{i}"),
            submitted_at: Instant::now(),
        };
        requester.submit_request(request.clone()).await?;

        if i == 0 {
            for _ in 0..args.duplicates {
                requester.submit_request(request.clone()).await?;
            }
        }
    }

    // Collect until every admitted request reached a terminal outcome.
    let slack = Duration::from_secs(2);
    let worst_case = Duration::from_millis((u64::from(args.tries) + 1) * args.timeout_ms)
        + reply_delay * 2
        + slack;
    let deadline = start + worst_case;
    let mut rtts_us: Vec<f64> = Vec::new();

    loop {
        if !running.load(Ordering::SeqCst) {
            break;
        }

        match tokio::time::timeout(Duration::from_millis(50), results.recv()).await {
            Ok(Some((_key, rtt))) => rtts_us.push(rtt.as_secs_f64() * 1_000_000.0),
            Ok(None) => break,
            Err(_) => {}
        }

        let stats = requester.stats();
        if !args.quiet && !args.json {
            eprint!(
                "\r    Progress: {}/{}",
                stats.resolved + stats.exhausted,
                stats.admitted
            );
            let _ = io::stderr().flush();
        }
        if stats.admitted >= args.count && stats.in_flight() == 0 {
            break;
        }
        if Instant::now() > deadline {
            eprintln!("\n{}: gave up waiting for terminal outcomes", "Warning".yellow());
            break;
        }
    }

    // Drain any results that raced the exit condition.
    while let Ok((_key, rtt)) = results.try_recv() {
        rtts_us.push(rtt.as_secs_f64() * 1_000_000.0);
    }

    let total_time = start.elapsed();
    let stats = requester.stats();
    let latency = LatencyStats::from_samples(&rtts_us);

    if !args.quiet && !args.json {
        eprintln!();
    }

    if args.json {
        print_json(&stats, &latency, total_time);
    } else {
        print_report(&stats, &latency, total_time, args.quiet);
    }

    Ok(())
}

#[derive(Debug, Default)]
struct LatencyStats {
    count: usize,
    min: f64,
    max: f64,
    mean: f64,
    stddev: f64,
    p50: f64,
    p90: f64,
    p99: f64,
}

impl LatencyStats {
    fn from_samples(samples_us: &[f64]) -> Self {
        if samples_us.is_empty() {
            return Self::default();
        }

        let mut sorted = samples_us.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let n = sorted.len();
        let mean: f64 = samples_us.iter().sum::<f64>() / n as f64;
        let variance: f64 = samples_us.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;

        let percentile = |p: f64| -> f64 {
            let idx = ((p / 100.0) * (n - 1) as f64).round() as usize;
            sorted[idx.min(n - 1)]
        };

        Self {
            count: n,
            min: sorted[0],
            max: sorted[n - 1],
            mean,
            stddev: variance.sqrt(),
            p50: percentile(50.0),
            p90: percentile(90.0),
            p99: percentile(99.0),
        }
    }
}

fn print_report(
    stats: &reqrep::RequesterStats,
    latency: &LatencyStats,
    total_time: Duration,
    quiet: bool,
) {
    if quiet {
        println!(
            "admitted={} resolved={} exhausted={} forwards={} p99={:.1} us",
            stats.admitted, stats.resolved, stats.exhausted, stats.forwards, latency.p99
        );
        return;
    }

    println!();
    println!("{}", "=== Correlator Probe Results ===".bold());
    println!();
    println!("  {} {}", "Admitted:".cyan(), stats.admitted);
    println!("  {} {}", "Duplicates suppressed:".cyan(), stats.duplicates);
    println!("  {} {}", "Resolved:".green(), stats.resolved);
    println!("  {} {}", "Exhausted:".red(), stats.exhausted);
    println!(
        "  {} {} ({} retries)",
        "Forwards:".cyan(),
        stats.forwards,
        stats.forwards.saturating_sub(stats.admitted)
    );
    println!("  {} {}", "Orphan replies:".yellow(), stats.replies_orphaned);
    println!("  {} {}", "Stale wake-ups:".yellow(), stats.stale_wakeups);
    println!("  {} {:.2}s", "Duration:".cyan(), total_time.as_secs_f64());
    println!();
    println!("{}", "--- Resolution latency (microseconds) ---".dimmed());
    println!("  {} {}", "Samples:".cyan(), latency.count);
    println!("  {} {:>10.2} us", "Min:".green(), latency.min);
    println!("  {} {:>10.2} us", "Max:".red(), latency.max);
    println!("  {} {:>10.2} us", "Mean:".yellow(), latency.mean);
    println!("  {} {:>10.2} us", "Stddev:".yellow(), latency.stddev);
    println!("  {} {:>10.2} us", "p50:".white(), latency.p50);
    println!("  {} {:>10.2} us", "p90:".white(), latency.p90);
    println!("  {} {:>10.2} us", "p99:".white(), latency.p99);
    println!();
}

fn print_json(stats: &reqrep::RequesterStats, latency: &LatencyStats, total_time: Duration) {
    println!(
        r#"{{"admitted":{},"duplicates":{},"resolved":{},"exhausted":{},"forwards":{},"orphan_replies":{},"stale_wakeups":{},"duration_secs":{:.3},"latency_us":{{"count":{},"min":{:.2},"max":{:.2},"mean":{:.2},"stddev":{:.2},"p50":{:.2},"p90":{:.2},"p99":{:.2}}}}}"#,
        stats.admitted,
        stats.duplicates,
        stats.resolved,
        stats.exhausted,
        stats.forwards,
        stats.replies_orphaned,
        stats.stale_wakeups,
        total_time.as_secs_f64(),
        latency.count,
        latency.min,
        latency.max,
        latency.mean,
        latency.stddev,
        latency.p50,
        latency.p90,
        latency.p99
    );
}
