//! Context Management Example
//!
//! The turn engine compacts automatically once a conversation approaches
//! `max_tokens` (see `maybe_compact`); this demo shows the same estimator
//! and compactor used internally, for callers who want to inspect or
//! pre-empt that budget themselves.

use agentflow_rt::{estimate_tokens, maybe_compact, Message};

fn conversation(turns: usize) -> Vec<Message> {
    let mut messages = vec![Message::user("Let's talk about distributed systems.")];
    for i in 0..turns {
        messages.push(Message::assistant_text(format!(
            "Here is a fairly long explanation of topic number {i}, going into \
             considerable detail about consensus, replication, and failure modes \
             so the estimator has something substantial to count."
        )));
        messages.push(Message::user(format!("Follow-up question {i}")));
    }
    messages
}

fn main() {
    println!("{}", "=".repeat(70));
    println!("CONTEXT MANAGEMENT EXAMPLE");
    println!("{}", "=".repeat(70));

    let mut messages = conversation(20);
    println!("\nBefore compaction:");
    println!("  messages: {}", messages.len());
    println!("  estimated tokens: {}", estimate_tokens(&messages));

    let max_tokens = 500;
    maybe_compact(&mut messages, max_tokens);

    println!("\nAfter maybe_compact(max_tokens={max_tokens}):");
    println!("  messages: {}", messages.len());
    println!("  estimated tokens: {}", estimate_tokens(&messages));
    println!(
        "  first message preserved: {:?}",
        messages.first().map(|m| m.text())
    );
}
