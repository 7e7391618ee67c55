//! Async consumer for the `net` backend.
//!
//! Run with:
//!   cargo run --example net-consumer --features delivery,async
//!
//! In another terminal:
//!   cargo run --features cli -- send net:127.0.0.1:28250 --kind command --data reload

use agentcarrier::delivery::router;
use agentcarrier::frame::{FrameCodec, FrameKind};
use futures_util::StreamExt;
use tokio::net::TcpListener;
use tokio_util::codec::FramedRead;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:28250").await?;
    eprintln!("Listening on {}", listener.local_addr()?);

    loop {
        let (stream, addr) = listener.accept().await?;
        tokio::spawn(async move {
            let mut frames = FramedRead::new(stream, FrameCodec::new());
            while let Some(next) = frames.next().await {
                let frame = match next {
                    Ok(frame) => frame,
                    Err(err) => {
                        eprintln!("{addr}: {err}");
                        break;
                    }
                };
                println!(
                    "{addr}: {} from {} ({} bytes)",
                    frame.kind,
                    frame.provider_id,
                    frame.payload.len()
                );
                if frame.kind == FrameKind::Command {
                    let command = String::from_utf8_lossy(&frame.payload);
                    let accepted = router::route(&frame.provider_id, &command).unwrap_or(false);
                    println!("  command {command:?} accepted={accepted}");
                }
            }
        });
    }
}
