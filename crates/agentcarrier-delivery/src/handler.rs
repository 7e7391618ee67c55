use std::time::Duration;

use agentcarrier_frame::{decode, FrameKind, FrameView};
use agentcarrier_transport::LocalQueueReceiver;
use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, warn};

use crate::router;

/// Processes one raw message taken off a queue.
///
/// Runs on the worker thread that received the message; several calls may run
/// at once. Returning `false` marks the message as rejected.
pub trait FrameHandler<C>: Send + Sync {
    fn handle(&self, source: &LocalQueueReceiver, raw: &[u8], context: &C) -> bool;
}

impl<C, F> FrameHandler<C> for F
where
    F: Fn(&LocalQueueReceiver, &[u8], &C) -> bool + Send + Sync,
{
    fn handle(&self, source: &LocalQueueReceiver, raw: &[u8], context: &C) -> bool {
        self(source, raw, context)
    }
}

/// A timestamped block of monitoring data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub peer: String,
    pub answer_id: u64,
    /// Time since the process epoch, derived from `answer_id`.
    #[serde(with = "duration_nanos")]
    pub timestamp: Duration,
    #[serde(with = "bytes_as_vec")]
    pub data: Bytes,
}

impl Segment {
    pub fn from_view(view: &FrameView<'_>) -> Self {
        Self {
            peer: view.provider_id().to_string(),
            answer_id: view.answer_id(),
            timestamp: view.timestamp(),
            data: Bytes::copy_from_slice(view.payload()),
        }
    }
}

/// Destination for data frames accepted by [`DefaultHandler`].
pub trait DeliverySink: Send + Sync {
    fn on_log(&self, peer: &str, text: &str);
    fn on_yaml(&self, peer: &str, text: &str);
    fn on_segment(&self, segment: Segment);
}

/// Decodes frames and dispatches them by kind.
///
/// Log, yaml and segment frames go to the context's [`DeliverySink`]. Command
/// frames go through the process-wide [`router`]; the router's answer is
/// logged but does not affect the handler result.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHandler;

impl<C: DeliverySink> FrameHandler<C> for DefaultHandler {
    fn handle(&self, source: &LocalQueueReceiver, raw: &[u8], context: &C) -> bool {
        let view = match decode(raw) {
            Ok(view) => view,
            Err(err) => {
                warn!(queue = source.name(), error = %err, "dropping undecodable frame");
                return false;
            }
        };

        let Some(kind) = view.kind() else {
            debug!(queue = source.name(), "ignoring empty message");
            return false;
        };

        if kind == FrameKind::Segment {
            context.on_segment(Segment::from_view(&view));
            return true;
        }

        let text = match view.as_text() {
            Ok(text) => text,
            Err(err) => {
                warn!(
                    queue = source.name(),
                    peer = view.provider_id(),
                    %kind,
                    error = %err,
                    "dropping frame with non-text payload"
                );
                return false;
            }
        };
        let peer = view.provider_id();

        match kind {
            FrameKind::Log => context.on_log(peer, text),
            FrameKind::Yaml => context.on_yaml(peer, text),
            FrameKind::Command => match router::route(peer, text) {
                Ok(accepted) => debug!(peer, command = text, accepted, "command routed"),
                Err(err) => warn!(peer, command = text, error = %err, "command not routed"),
            },
            FrameKind::Segment => {}
        }
        true
    }
}

mod duration_nanos {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_nanos()).unwrap_or(u64::MAX))
    }
}

mod bytes_as_vec {
    use bytes::Bytes;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(value)
    }
}
