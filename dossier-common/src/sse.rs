//! Server-Sent Events (SSE) utilities
//!
//! Frames follow `event: <type>\ndata: <json-payload>\n\n`. Payloads are
//! compact JSON, so a frame never carries a raw newline inside `data:`.

use axum::response::sse::Event;

use crate::events::PipelineEvent;

/// Media type of the event stream
pub const EVENT_STREAM_MEDIA_TYPE: &str = "text/event-stream";

/// Convert a pipeline event into an axum SSE event.
pub fn to_sse_event(event: &PipelineEvent) -> serde_json::Result<Event> {
    let data = event.payload_json()?;
    Ok(Event::default().event(event.event_type()).data(data))
}

/// Encode a pipeline event as one raw SSE frame.
pub fn encode_frame(event: &PipelineEvent) -> serde_json::Result<String> {
    Ok(format!(
        "event: {}\ndata: {}\n\n",
        event.event_type(),
        event.payload_json()?
    ))
}

/// Decode a complete SSE body back into pipeline events.
///
/// Comment lines (keep-alives) are skipped; multi-line `data:` fields are
/// joined with `\n` as the SSE format prescribes.
pub fn decode_frames(body: &str) -> serde_json::Result<Vec<PipelineEvent>> {
    let mut events = Vec::new();

    for block in body.split("\n\n") {
        let mut event_type: Option<&str> = None;
        let mut data_lines: Vec<&str> = Vec::new();

        for line in block.lines() {
            if line.starts_with(':') {
                continue;
            }
            if let Some(rest) = line.strip_prefix("event:") {
                event_type = Some(rest.trim());
            } else if let Some(rest) = line.strip_prefix("data:") {
                data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
            }
        }

        if let Some(event_type) = event_type {
            let data = data_lines.join("\n");
            events.push(PipelineEvent::from_wire(event_type, &data)?);
        }
    }

    Ok(events)
}
