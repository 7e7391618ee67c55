use std::fs;
use std::time::Duration;

use agentcarrier_frame::{encode, monotonic_answer_id, FrameConfig, FrameKind};
use agentcarrier_transport::{PortDescriptor, Transport};

use crate::cmd::SendArgs;
use crate::exit::{frame_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_send_report, OutputFormat, SendReport};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let port =
        PortDescriptor::parse(&args.port).map_err(|err| transport_error("invalid port", err))?;
    let config = FrameConfig {
        write_timeout: args.timeout.as_deref().map(parse_duration).transpose()?,
        ..FrameConfig::default()
    };

    let kind = FrameKind::from(args.kind);
    let answer_id = resolve_answer_id(kind, args.answer_id);
    let payload = resolve_payload(&args)?;
    let bytes = encode(&args.peer, answer_id, kind, &payload)
        .map_err(|err| frame_error("encode failed", err))?;

    let mut transport = Transport::open_for_send_with_config(&port, &config)
        .map_err(|err| transport_error("open failed", err))?;
    transport
        .send(&bytes)
        .map_err(|err| transport_error("send failed", err))?;

    print_send_report(
        &SendReport {
            port: port.to_string(),
            transport: transport.name(),
            kind: kind.name(),
            provider_id: &args.peer,
            answer_id,
            payload_size: payload.len(),
            frame_size: bytes.len(),
        },
        format,
    );
    transport.close();

    Ok(SUCCESS)
}

fn resolve_answer_id(kind: FrameKind, explicit: Option<u64>) -> u64 {
    match (explicit, kind) {
        (Some(answer_id), _) => answer_id,
        (None, FrameKind::Segment) => monotonic_answer_id(),
        (None, _) => 0,
    }
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        });
    }
    Ok(Vec::new())
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
