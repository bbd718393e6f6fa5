//! Simple SDK Example
//!
//! Joins a queue, waits for admission over the status stream, then opens
//! and releases the booking session.
//!
//! Start the daemon first:
//!    cargo run --package waitline-daemon
//!
//! Then run:
//!    cargo run --package waitline-sdk --example simple

use waitline_sdk::{StatusEvent, WaitlineClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = WaitlineClient::connect("http://127.0.0.1:9630").await?;

    let entry = client.enter("concert-1", "user-42").await?;
    println!(
        "Entered: position {} of {} (~{} min), new entry: {}",
        entry.position, entry.total_waiting, entry.estimated_wait_minutes, entry.is_new_entry
    );

    let mut stream = client.subscribe_status("concert-1", "user-42").await?;
    let token = loop {
        match stream.next().await {
            Some(Ok(StatusEvent::StatusUpdate(s))) => {
                println!("Waiting at position {:?}", s.token.position);
            }
            Some(Ok(StatusEvent::Ready(s))) => break s.token.token,
            Some(Ok(StatusEvent::Error(e))) => return Err(e.message.into()),
            Some(Err(e)) => return Err(e.into()),
            None => return Err("stream closed".into()),
        }
    };
    let token = token.ok_or("admitted without a token")?;
    println!("Admitted with token {}", token);

    let active = client.activate("concert-1", "user-42").await?;
    println!("Session active until {:?}", active.expires_at);

    let check = client.validate("concert-1", "user-42", token.as_str()).await?;
    println!("Token valid: {}", check.valid);

    client.remove("concert-1", "user-42").await?;
    println!("Released slot");
    Ok(())
}
