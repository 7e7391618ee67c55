//! Local queue round trip: a reception server and a carrier in one process.
//!
//! Run with:
//!   cargo run --example queue-roundtrip --features delivery
//!
//! Or point the CLI at the same queue from another terminal:
//!   cargo run --features cli -- send localqueue:agentcarrier-demo --kind log --data hi

use std::sync::Arc;
use std::time::{Duration, Instant};

use agentcarrier::delivery::{Carrier, DefaultHandler, Inbox, ReceptionServer};
use agentcarrier::frame::monotonic_answer_id;
use agentcarrier::transport::SecurityLevel;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let queue = "agentcarrier-demo";
    let inbox = Arc::new(Inbox::new());

    let mut server =
        ReceptionServer::new(queue, DefaultHandler, Arc::clone(&inbox), SecurityLevel::Standard);
    server.start()?;
    eprintln!("Listening on {:?}", server.queue_path());

    let mut carrier = Carrier::new();
    if !carrier.establish_communication(&format!("localqueue:{queue}")) {
        return Err("could not open the demo queue".into());
    }
    carrier.send_log("demo", "hello from the carrier");
    carrier.send_yaml("demo", "global:\n  enabled: yes\n");
    carrier.send_segment("demo", monotonic_answer_id(), b"<<<check_mk>>>\nVersion: demo\n");
    carrier.shutdown_communication();

    let deadline = Instant::now() + Duration::from_secs(2);
    while server.stats().received < 3 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    server.stop();

    println!("logs:  {:?}", inbox.logs());
    println!("yamls: {:?}", inbox.yamls());
    if let Some(segment) = inbox.last_segment() {
        println!(
            "segment from {} at {:?}: {} bytes",
            segment.peer,
            segment.timestamp,
            segment.data.len()
        );
    }
    println!("stats: {:?}", server.stats());
    Ok(())
}
