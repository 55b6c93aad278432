//! Loopback session walkthrough.
//!
//! Runs a full session against an in-process transport with a scripted hub
//! on the other end: capability negotiation, a REPL start the hub answers
//! with a status report, and a stdin write it echoes back over stdout.
//!
//! Run with: `cargo run --example loopback`

use bytes::Bytes;
use hubwire::{
    negotiate, Command, CommandId, CommandRequest, Event, EventId, HubIdentity,
    LoopbackTransport, Session, StatusFlags,
};

#[tokio::main]
async fn main() -> hubwire::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    // Discovery would read these off the device; here they are scripted.
    let identity = HubIdentity {
        firmware_version: "3.5.0".to_string(),
        product_id: 0x0080,
        product_version: 0x0000,
    };
    let mut capabilities_read = Vec::new();
    capabilities_read.extend_from_slice(&244u32.to_le_bytes());
    capabilities_read.extend_from_slice(&0b0011u32.to_le_bytes());
    capabilities_read.extend_from_slice(&(512 * 1024u32).to_le_bytes());

    let profile = negotiate(Some(&capabilities_read), &identity)?;
    let (transport, mut hub_inbox) = LoopbackTransport::new();
    let (session, mut bus) = Session::start(transport, profile);
    let sink = session.notify_sink();

    // Scripted hub: answer REPL starts with a status report and echo stdin
    // back as stdout.
    tokio::spawn(async move {
        while let Some(frame) = hub_inbox.recv().await {
            if frame.is_empty() {
                continue;
            }
            if frame[0] == CommandId::StartRepl as u8 {
                let mut report = vec![EventId::StatusReport as u8];
                report.extend_from_slice(&StatusFlags::USER_PROGRAM_RUNNING.bits().to_le_bytes());
                let _ = sink.notify(report);
            } else if frame[0] == CommandId::WriteStdin as u8 {
                let mut echo = vec![EventId::WriteStdout as u8];
                echo.extend_from_slice(&frame[1..]);
                let _ = sink.notify(echo);
            }
        }
    });

    session.submit(CommandRequest::new(1, Command::StartRepl))?;
    session.submit(CommandRequest::new(
        2,
        Command::WriteStdin {
            payload: Bytes::from_static(b"print(1 + 1)\r\n"),
        },
    ))?;

    for _ in 0..2 {
        let completion = bus.completions.recv().await.expect("pipeline alive");
        println!("completion: {:?}", completion);
    }

    // The capability announcement leads, then the scripted hub's replies.
    for _ in 0..3 {
        match bus.events.recv().await.expect("events alive") {
            Event::HubCapabilities(caps) => {
                println!("hub limits: writes up to {} bytes", caps.max_write_size);
            }
            Event::StatusReport { flags } => println!("status: {:?}", flags),
            Event::WriteStdout { payload } => {
                println!("stdout: {}", String::from_utf8_lossy(&payload));
            }
            other => println!("event: {:?}", other),
        }
    }

    session.close().await;
    Ok(())
}
