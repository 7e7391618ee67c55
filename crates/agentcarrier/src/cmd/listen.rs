use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

use agentcarrier_delivery::{router, ReceptionServer, ServerConfig};
use agentcarrier_frame::{decode, Frame, FrameKind};
use agentcarrier_transport::LocalQueueReceiver;

use crate::cmd::{KindArg, ListenArgs};
use crate::exit::{delivery_error, CliError, CliResult, SUCCESS};
use crate::output::{print_frame, print_stats, OutputFormat};

const TICK: Duration = Duration::from_millis(100);

struct ListenContext {
    frames: Sender<Frame>,
    route_commands: bool,
}

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let (tx, rx) = mpsc::channel();
    let context = Arc::new(ListenContext {
        frames: tx,
        route_commands: args.route_commands,
    });

    let mut server = ReceptionServer::new(
        args.queue.as_str(),
        forward_frame,
        context,
        args.level.into(),
    )
    .with_config(ServerConfig {
        workers: args.workers,
        capacity: args.capacity,
        ..ServerConfig::default()
    });
    server
        .start()
        .map_err(|err| delivery_error("listen failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let filter: Option<Vec<FrameKind>> = args
        .kinds
        .as_ref()
        .map(|kinds| kinds.iter().copied().map(FrameKind::from).collect());
    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let frame = match rx.recv_timeout(TICK) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if let Some(kinds) = &filter {
            if !kinds.contains(&frame.kind) {
                continue;
            }
        }

        print_frame(&frame, server.address(), format);
        printed = printed.saturating_add(1);

        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }

    let stats = server.stats();
    server.stop();
    print_stats(&args.queue, &stats, format);

    Ok(SUCCESS)
}

fn forward_frame(source: &LocalQueueReceiver, raw: &[u8], context: &ListenContext) -> bool {
    let frame = match decode(raw).map(|view| view.to_frame()) {
        Ok(Some(frame)) => frame,
        Ok(None) => return false,
        Err(err) => {
            tracing::warn!(queue = source.name(), error = %err, "dropping undecodable frame");
            return false;
        }
    };

    if context.route_commands && frame.kind == FrameKind::Command {
        match std::str::from_utf8(&frame.payload) {
            Ok(command) => match router::route(&frame.provider_id, command) {
                Ok(accepted) => tracing::info!(peer = %frame.provider_id, command, accepted, "command routed"),
                Err(err) => tracing::warn!(error = %err, "command not routed"),
            },
            Err(err) => tracing::warn!(error = %err, "command payload is not text"),
        }
    }

    context.frames.send(frame).is_ok()
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
