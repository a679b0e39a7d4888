//! Advanced Patterns - Retry Logic, Concurrency, and Rate Limiting
//!
//! Demonstrates production patterns built on the turn engine:
//! 1. Retry with exponential backoff for transient failures
//! 2. Concurrent requests via independent agents
//! 3. Concurrent requests with retry
//! 4. Rate limiting with a semaphore
//!
//! Usage:
//!     cargo run --example advanced_patterns

use agentflow_rt::retry::{retry_with_backoff, RetryConfig};
use agentflow_rt::{Agent, OpenAiProvider, RunConfig};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn config() -> Result<RunConfig, Box<dyn std::error::Error>> {
    Ok(RunConfig::builder()
        .provider(Arc::new(OpenAiProvider::new()))
        .system_prompt("You are a helpful assistant.")
        .model("qwen3:8b")
        .base_url("http://localhost:11434/v1")
        .temperature(0.7)
        .build()?)
}

// ============================================================================
// Example 1: Retry with Exponential Backoff
// ============================================================================
async fn retry_example() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "=".repeat(60));
    println!("Example 1: Retry with Exponential Backoff");
    println!("{}", "=".repeat(60));

    let cfg = config()?;
    let retry_config = RetryConfig::new()
        .with_max_attempts(3)
        .with_initial_delay(Duration::from_secs(1))
        .with_backoff_multiplier(2.0);

    println!("Attempting query with retry (up to 3 attempts)...\n");

    let start = Instant::now();
    let result = retry_with_backoff(retry_config, || {
        let cfg = cfg.clone();
        async move {
            let agent = Agent::start(cfg).await?;
            agent.chat("What is 2+2?").await
        }
    })
    .await;

    match result {
        Ok(response) => println!("Success after {:?}\nResponse: {}\n", start.elapsed(), response.trim()),
        Err(e) => println!("Failed after all retries: {e}\n"),
    }

    Ok(())
}

// ============================================================================
// Example 2: Concurrent Requests
// ============================================================================
async fn concurrent_requests_example() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "=".repeat(60));
    println!("Example 2: Concurrent Requests");
    println!("{}", "=".repeat(60));

    let cfg = config()?;
    let questions = ["What is 5+5?", "What is the capital of France?", "Name a primary color"];

    println!("Running {} queries in parallel...\n", questions.len());
    let start = Instant::now();

    let mut futures = FuturesUnordered::new();
    for (i, question) in questions.iter().enumerate() {
        let cfg = cfg.clone();
        let question_owned = question.to_string();
        futures.push(async move {
            let response = match Agent::start(cfg).await {
                Ok(agent) => agent.chat(question_owned.clone()).await,
                Err(e) => Err(e),
            };
            (i, question_owned, response)
        });
    }

    let mut results = Vec::new();
    while let Some(result) = futures.next().await {
        results.push(result);
    }

    println!("All queries completed in {:?}\n", start.elapsed());
    for (i, question, response) in results {
        match response {
            Ok(text) => println!("Query {}: {question}\nResponse: {}\n", i + 1, text.trim()),
            Err(e) => println!("Query {} failed: {e}\n", i + 1),
        }
    }

    Ok(())
}

// ============================================================================
// Example 3: Concurrent Requests with Retry
// ============================================================================
async fn concurrent_with_retry_example() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "=".repeat(60));
    println!("Example 3: Concurrent Requests with Retry");
    println!("{}", "=".repeat(60));

    let cfg = config()?;
    let questions = ["What is 10+10?", "What is the capital of Japan?"];
    let retry_config = RetryConfig::new().with_max_attempts(2).with_initial_delay(Duration::from_millis(500));

    println!("Running {} queries in parallel with retry...\n", questions.len());
    let start = Instant::now();

    let mut futures = FuturesUnordered::new();
    for (i, question) in questions.iter().enumerate() {
        let cfg = cfg.clone();
        let question_owned = question.to_string();
        let retry_config = retry_config.clone();
        futures.push(async move {
            let result = retry_with_backoff(retry_config, || {
                let cfg = cfg.clone();
                let question_owned = question_owned.clone();
                async move {
                    let agent = Agent::start(cfg).await?;
                    agent.chat(question_owned).await
                }
            })
            .await;
            result.map(|response| (i, question.to_string(), response))
        });
    }

    let mut results = Vec::new();
    while let Some(result) = futures.next().await {
        results.push(result);
    }

    println!("All queries completed in {:?}\n", start.elapsed());
    for result in results {
        match result {
            Ok((i, question, response)) => println!("Query {}: {question}\nResponse: {}\n", i + 1, response.trim()),
            Err(e) => println!("Query failed after retries: {e}\n"),
        }
    }

    Ok(())
}

// ============================================================================
// Example 4: Rate Limiting with Semaphore
// ============================================================================
async fn rate_limiting_example() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "=".repeat(60));
    println!("Example 4: Rate Limiting with Semaphore");
    println!("{}", "=".repeat(60));

    let cfg = config()?;
    let questions = ["What is 1+1?", "What is 2+2?", "What is 3+3?", "What is 4+4?", "What is 5+5?"];
    let semaphore = Arc::new(tokio::sync::Semaphore::new(2));

    println!("Running {} queries with max 2 concurrent...\n", questions.len());
    let start = Instant::now();

    let mut futures = FuturesUnordered::new();
    for (i, question) in questions.iter().enumerate() {
        let cfg = cfg.clone();
        let question_owned = question.to_string();
        let semaphore = semaphore.clone();
        futures.push(async move {
            let _permit = semaphore.acquire().await.unwrap();
            println!("  [Starting Query {}]", i + 1);
            let response = match Agent::start(cfg).await {
                Ok(agent) => agent.chat(question_owned.clone()).await,
                Err(e) => Err(e),
            };
            println!("  [Completed Query {}]", i + 1);
            (i, question_owned, response)
        });
    }

    let mut results = Vec::new();
    while let Some(result) = futures.next().await {
        results.push(result);
    }

    println!("\nAll queries completed in {:?}\n", start.elapsed());
    for (i, question, response) in results {
        match response {
            Ok(text) => println!("Query {}: {question} => {}", i + 1, text.trim()),
            Err(e) => println!("Query {} failed: {e}\n", i + 1),
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("\n{}", "=".repeat(60));
    println!("ADVANCED PATTERNS DEMO");
    println!("{}", "=".repeat(60));
    println!("\nThis demo requires a local OpenAI-compatible server (e.g. Ollama) at");
    println!("http://localhost:11434 with a model loaded.\n");

    if let Err(e) = retry_example().await {
        eprintln!("Retry example error: {e}");
    }
    tokio::time::sleep(Duration::from_secs(1)).await;

    if let Err(e) = concurrent_requests_example().await {
        eprintln!("Concurrent requests example error: {e}");
    }
    tokio::time::sleep(Duration::from_secs(1)).await;

    if let Err(e) = concurrent_with_retry_example().await {
        eprintln!("Concurrent with retry example error: {e}");
    }
    tokio::time::sleep(Duration::from_secs(1)).await;

    if let Err(e) = rate_limiting_example().await {
        eprintln!("Rate limiting example error: {e}");
    }

    println!("\n{}", "=".repeat(60));
    println!("All examples completed!");
    println!("{}", "=".repeat(60));

    Ok(())
}
