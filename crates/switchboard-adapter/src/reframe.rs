//! Streaming re-framer
//!
//! Consumes backend delta events one at a time and produces the client's
//! block-structured event sequence. The re-framer owns block indices: they
//! start at 0, increase by one per opened block and are never reused.
//! Backend tool-call indices are only used to route argument fragments to
//! the block they belong to.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::ErrorEnvelope;
use crate::ids;
use crate::mapper::to_client_stop_reason;
use crate::protocol::anthropic::{
    BlockDelta, ErrorDetail, MessageDelta, MessagesResponse, ResponseBlock, StopReason, StreamEvent, Usage,
};
use crate::tokens;

/// Backend delta event, decoded from one stream chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    /// Assistant text fragment
    TextDelta(String),
    /// A tool call begins
    ToolCallStart {
        /// Backend-local tool-call index
        backend_index: u32,
        /// Backend tool-call id, possibly empty
        id: String,
        /// Tool name
        name: String,
    },
    /// Argument JSON fragment for a tool call
    ToolCallArgs {
        /// Backend-local tool-call index
        backend_index: u32,
        /// Raw JSON fragment
        fragment: String,
    },
    /// Backend finish reason
    Finish(String),
    /// Authoritative token usage
    Usage {
        /// Prompt tokens
        input_tokens: u32,
        /// Completion tokens
        output_tokens: u32,
    },
}

/// The block currently open on the client stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenBlock {
    NoneOpen,
    TextOpen { index: u32 },
    ToolOpen { index: u32, backend_index: u32 },
    Closed,
}

/// Client block assigned to a backend tool call
#[derive(Debug)]
struct ToolSlot {
    index: u32,
    /// Backend call id as sent, possibly empty
    call_id: String,
}

/// Per-request streaming state machine
#[derive(Debug)]
pub struct Reframer {
    message_id: String,
    model: String,
    estimated_input_tokens: u32,
    state: OpenBlock,
    next_index: u32,
    /// Backend tool-call index → client block
    tool_indices: HashMap<u32, ToolSlot>,
    opened_tool: bool,
    output_chars: usize,
    reported: Option<Usage>,
}

impl Reframer {
    pub fn new(message_id: String, model: String, estimated_input_tokens: u32) -> Self {
        Self {
            message_id,
            model,
            estimated_input_tokens,
            state: OpenBlock::NoneOpen,
            next_index: 0,
            tool_indices: HashMap::new(),
            opened_tool: false,
            output_chars: 0,
            reported: None,
        }
    }

    /// The opening `message_start` event
    pub fn start(&self) -> StreamEvent {
        StreamEvent::MessageStart {
            message: MessagesResponse::shell(
                self.message_id.clone(),
                self.model.clone(),
                self.estimated_input_tokens,
            ),
        }
    }

    pub const fn is_closed(&self) -> bool {
        matches!(self.state, OpenBlock::Closed)
    }

    /// Feed one backend event, returning the client events it produces
    pub fn push(&mut self, event: BackendEvent) -> Vec<StreamEvent> {
        if self.is_closed() {
            tracing::warn!(message_id = %self.message_id, ?event, "discarding backend event after stream close");
            return Vec::new();
        }

        let mut out = Vec::new();

        match event {
            BackendEvent::TextDelta(text) => self.on_text(text, &mut out),
            BackendEvent::ToolCallStart { backend_index, id, name } => {
                self.on_tool_start(backend_index, id, name, &mut out);
            }
            BackendEvent::ToolCallArgs { backend_index, fragment } => {
                self.on_tool_args(backend_index, fragment, &mut out);
            }
            BackendEvent::Finish(reason) => self.finish(to_client_stop_reason(&reason), &mut out),
            BackendEvent::Usage {
                input_tokens,
                output_tokens,
            } => {
                self.reported = Some(Usage {
                    input_tokens,
                    output_tokens,
                });
            }
        }

        out
    }

    /// End of the backend stream
    ///
    /// Synthesizes the terminal events when the backend never sent a finish
    /// reason. Returns nothing if the stream is already closed.
    pub fn finalize(&mut self) -> Vec<StreamEvent> {
        if self.is_closed() {
            return Vec::new();
        }

        let reason = if self.opened_tool {
            StopReason::ToolUse
        } else {
            StopReason::EndTurn
        };
        tracing::debug!(message_id = %self.message_id, ?reason, "backend stream ended without finish reason");

        let mut out = Vec::new();
        self.finish(reason, &mut out);
        out
    }

    /// Abort the stream with an error event
    pub fn fail(&mut self, envelope: &ErrorEnvelope) -> Vec<StreamEvent> {
        if self.is_closed() {
            tracing::warn!(
                message_id = %self.message_id,
                error = %envelope.message,
                "backend failure after stream close"
            );
            return Vec::new();
        }

        let mut out = Vec::new();
        self.close_open_block(&mut out);
        out.push(StreamEvent::Error {
            error: ErrorDetail {
                error_type: envelope.kind.error_type().to_owned(),
                message: envelope.message.clone(),
            },
        });
        self.state = OpenBlock::Closed;
        out
    }

    /// Usage for the final `message_delta`
    ///
    /// Backend-reported counts win when non-zero; otherwise estimates.
    pub fn usage(&self) -> Usage {
        let reported = self.reported.unwrap_or_default();

        Usage {
            input_tokens: if reported.input_tokens > 0 {
                reported.input_tokens
            } else {
                self.estimated_input_tokens
            },
            output_tokens: if reported.output_tokens > 0 {
                reported.output_tokens
            } else {
                tokens::estimate_chars(self.output_chars)
            },
        }
    }

    fn on_text(&mut self, text: String, out: &mut Vec<StreamEvent>) {
        if text.is_empty() {
            return;
        }

        let index = if let OpenBlock::TextOpen { index } = self.state {
            index
        } else {
            self.close_open_block(out);
            let index = self.allocate_index();
            out.push(StreamEvent::ContentBlockStart {
                index,
                content_block: ResponseBlock::Text { text: String::new() },
            });
            self.state = OpenBlock::TextOpen { index };
            index
        };

        self.output_chars += text.chars().count();
        out.push(StreamEvent::ContentBlockDelta {
            index,
            delta: BlockDelta::TextDelta { text },
        });
    }

    fn on_tool_start(&mut self, backend_index: u32, id: String, name: String, out: &mut Vec<StreamEvent>) {
        if let Some(slot) = self.tool_indices.get(&backend_index) {
            // Some backends repeat id and name on later deltas of the same call,
            // others reuse one index for parallel calls with distinct ids
            let new_call = !ids::is_degenerate(&id) && !ids::is_degenerate(&slot.call_id) && id != slot.call_id;
            if !new_call {
                tracing::trace!(backend_index, "repeated tool call start ignored");
                return;
            }
            tracing::debug!(
                message_id = %self.message_id,
                backend_index,
                previous = %slot.call_id,
                id = %id,
                "backend reused tool call index for a new call"
            );
        }

        self.close_open_block(out);

        let index = self.allocate_index();
        self.opened_tool = true;

        let block_id = if ids::is_degenerate(&id) { ids::tool_use_id() } else { id.clone() };
        self.tool_indices.insert(backend_index, ToolSlot { index, call_id: id });

        out.push(StreamEvent::ContentBlockStart {
            index,
            content_block: ResponseBlock::ToolUse {
                id: block_id,
                name,
                input: Value::Object(Map::new()),
            },
        });
        self.state = OpenBlock::ToolOpen { index, backend_index };
    }

    fn on_tool_args(&mut self, backend_index: u32, fragment: String, out: &mut Vec<StreamEvent>) {
        let Some(index) = self.tool_indices.get(&backend_index).map(|slot| slot.index) else {
            tracing::warn!(
                message_id = %self.message_id,
                backend_index,
                "dropping arguments for unknown tool call"
            );
            return;
        };

        if self.state != (OpenBlock::ToolOpen { index, backend_index }) {
            tracing::warn!(
                message_id = %self.message_id,
                backend_index,
                index,
                "dropping arguments for a tool block that is no longer open"
            );
            return;
        }

        if fragment.is_empty() {
            return;
        }

        self.output_chars += fragment.chars().count();
        out.push(StreamEvent::ContentBlockDelta {
            index,
            delta: BlockDelta::InputJsonDelta { partial_json: fragment },
        });
    }

    fn finish(&mut self, stop_reason: StopReason, out: &mut Vec<StreamEvent>) {
        self.close_open_block(out);

        out.push(StreamEvent::MessageDelta {
            delta: MessageDelta {
                stop_reason: Some(stop_reason),
                stop_sequence: None,
            },
            usage: self.usage(),
        });
        out.push(StreamEvent::MessageStop);

        self.state = OpenBlock::Closed;
    }

    fn close_open_block(&mut self, out: &mut Vec<StreamEvent>) {
        match self.state {
            OpenBlock::TextOpen { index } | OpenBlock::ToolOpen { index, .. } => {
                out.push(StreamEvent::ContentBlockStop { index });
                self.state = OpenBlock::NoneOpen;
            }
            OpenBlock::NoneOpen | OpenBlock::Closed => {}
        }
    }

    const fn allocate_index(&mut self) -> u32 {
        let index = self.next_index;
        self.next_index += 1;
        index
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;

    fn reframer() -> Reframer {
        Reframer::new("msg_test".to_owned(), "claude-3-5-sonnet-20241022".to_owned(), 10)
    }

    fn text(s: &str) -> BackendEvent {
        BackendEvent::TextDelta(s.to_owned())
    }

    fn tool_start(backend_index: u32, id: &str, name: &str) -> BackendEvent {
        BackendEvent::ToolCallStart {
            backend_index,
            id: id.to_owned(),
            name: name.to_owned(),
        }
    }

    fn tool_args(backend_index: u32, fragment: &str) -> BackendEvent {
        BackendEvent::ToolCallArgs {
            backend_index,
            fragment: fragment.to_owned(),
        }
    }

    fn run(events: Vec<BackendEvent>) -> Vec<StreamEvent> {
        let mut reframer = reframer();
        let mut out = vec![reframer.start()];
        for event in events {
            out.extend(reframer.push(event));
        }
        out.extend(reframer.finalize());
        out
    }

    fn names(events: &[StreamEvent]) -> Vec<&'static str> {
        events.iter().map(StreamEvent::event_type).collect()
    }

    /// Check start/stop pairing, index order and the single-open rule
    fn assert_block_lifecycle(events: &[StreamEvent]) {
        let mut open: Option<u32> = None;
        let mut expected_next = 0;

        for event in events {
            match event {
                StreamEvent::ContentBlockStart { index, .. } => {
                    assert!(open.is_none(), "block {index} opened while {open:?} is open");
                    assert_eq!(*index, expected_next, "indices must increase by one");
                    expected_next += 1;
                    open = Some(*index);
                }
                StreamEvent::ContentBlockDelta { index, .. } => {
                    assert_eq!(open, Some(*index), "delta for a block that is not open");
                }
                StreamEvent::ContentBlockStop { index } => {
                    assert_eq!(open, Some(*index), "stop for a block that is not open");
                    open = None;
                }
                StreamEvent::MessageDelta { .. } | StreamEvent::Error { .. } => {
                    assert!(open.is_none(), "terminal event with block {open:?} still open");
                }
                _ => {}
            }
        }
    }

    #[test]
    fn weather_tool_round_trip() {
        let events = run(vec![
            tool_start(0, "call_abc", "get_weather"),
            tool_args(0, "{\"city\":"),
            tool_args(0, "\"Paris\"}"),
            BackendEvent::Finish("tool_calls".to_owned()),
        ]);

        assert_eq!(
            names(&events),
            vec![
                "message_start",
                "content_block_start",
                "content_block_delta",
                "content_block_delta",
                "content_block_stop",
                "message_delta",
                "message_stop",
            ]
        );

        assert_eq!(
            events[1],
            StreamEvent::ContentBlockStart {
                index: 0,
                content_block: ResponseBlock::ToolUse {
                    id: "call_abc".to_owned(),
                    name: "get_weather".to_owned(),
                    input: json!({}),
                },
            }
        );
        assert_eq!(
            events[3],
            StreamEvent::ContentBlockDelta {
                index: 0,
                delta: BlockDelta::InputJsonDelta {
                    partial_json: "\"Paris\"}".to_owned()
                },
            }
        );
        assert_eq!(events[4], StreamEvent::ContentBlockStop { index: 0 });
        assert!(matches!(
            &events[5],
            StreamEvent::MessageDelta { delta, .. } if delta.stop_reason == Some(StopReason::ToolUse) && delta.stop_sequence.is_none()
        ));
    }

    #[test]
    fn text_then_tool() {
        let events = run(vec![
            text("Let me "),
            text("check."),
            tool_start(0, "call_1", "get_weather"),
            tool_args(0, "{}"),
            BackendEvent::Finish("tool_calls".to_owned()),
        ]);

        assert_block_lifecycle(&events);
        assert_eq!(
            events[1],
            StreamEvent::ContentBlockStart {
                index: 0,
                content_block: ResponseBlock::Text { text: String::new() },
            }
        );
        assert_eq!(events[4], StreamEvent::ContentBlockStop { index: 0 });
        assert!(matches!(
            &events[5],
            StreamEvent::ContentBlockStart { index: 1, content_block: ResponseBlock::ToolUse { name, .. } } if name == "get_weather"
        ));
    }

    #[test]
    fn indices_are_monotonic_across_interleavings() {
        let sequences = vec![
            vec![text("a"), tool_start(0, "c0", "t0"), text("b"), tool_start(1, "c1", "t1")],
            vec![tool_start(3, "c3", "t"), tool_start(7, "c7", "t"), tool_start(1, "c1", "t"), text("x")],
            vec![text("a"), text("b"), text("c")],
            vec![tool_start(0, "", "t"), tool_args(0, "{"), tool_args(0, "}"), text("done")],
        ];

        for sequence in sequences {
            let events = run(sequence);
            assert_block_lifecycle(&events);
            assert_eq!(events.last(), Some(&StreamEvent::MessageStop));
        }
    }

    #[test]
    fn backend_indices_are_not_reused_as_block_indices() {
        let events = run(vec![tool_start(5, "c5", "first"), tool_start(2, "c2", "second")]);

        let starts: Vec<u32> = events
            .iter()
            .filter_map(|event| match event {
                StreamEvent::ContentBlockStart { index, .. } => Some(*index),
                _ => None,
            })
            .collect();
        assert_eq!(starts, vec![0, 1]);
    }

    #[test]
    fn repeated_tool_start_does_not_open_a_second_block() {
        let events = run(vec![
            tool_start(0, "call_1", "ls"),
            tool_args(0, "{\"pa"),
            tool_start(0, "call_1", "ls"),
            tool_args(0, "th\":\"/\"}"),
        ]);

        assert_block_lifecycle(&events);
        let starts = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::ContentBlockStart { .. }))
            .count();
        assert_eq!(starts, 1);
    }

    #[test]
    fn reused_backend_index_with_new_call_id_opens_a_new_block() {
        let events = run(vec![
            tool_start(0, "call_a", "ls"),
            tool_args(0, "{\"p\":1}"),
            tool_start(0, "call_b", "cat"),
            tool_args(0, "{\"q\":2}"),
            BackendEvent::Finish("tool_calls".to_owned()),
        ]);

        assert_block_lifecycle(&events);

        let starts: Vec<(u32, String, String)> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::ContentBlockStart {
                    index,
                    content_block: ResponseBlock::ToolUse { id, name, .. },
                } => Some((*index, id.clone(), name.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(
            starts,
            vec![
                (0, "call_a".to_owned(), "ls".to_owned()),
                (1, "call_b".to_owned(), "cat".to_owned()),
            ]
        );

        let deltas: Vec<(u32, String)> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::ContentBlockDelta {
                    index,
                    delta: BlockDelta::InputJsonDelta { partial_json },
                } => Some((*index, partial_json.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(
            deltas,
            vec![(0, "{\"p\":1}".to_owned()), (1, "{\"q\":2}".to_owned())]
        );
    }

    #[test]
    fn repeated_start_without_id_keeps_the_open_block() {
        let events = run(vec![
            tool_start(0, "call_a", "ls"),
            tool_args(0, "{\"pa"),
            tool_start(0, "", "ls"),
            tool_args(0, "th\":\"/\"}"),
        ]);

        let starts = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::ContentBlockStart { .. }))
            .count();
        assert_eq!(starts, 1);
    }

    #[test]
    fn arguments_for_a_closed_block_are_dropped() {
        let events = run(vec![
            tool_start(0, "c0", "a"),
            tool_start(1, "c1", "b"),
            tool_args(0, "{\"late\":true}"),
            tool_args(9, "{\"unknown\":true}"),
        ]);

        assert_block_lifecycle(&events);
        assert!(!events.iter().any(|e| matches!(e, StreamEvent::ContentBlockDelta { .. })));
    }

    #[test]
    fn missing_finish_is_synthesized() {
        let text_only = run(vec![text("hi")]);
        let with_tool = run(vec![tool_start(0, "c", "t")]);

        let reason = |events: &[StreamEvent]| {
            events.iter().find_map(|e| match e {
                StreamEvent::MessageDelta { delta, .. } => delta.stop_reason,
                _ => None,
            })
        };

        assert_eq!(reason(&text_only), Some(StopReason::EndTurn));
        assert_eq!(reason(&with_tool), Some(StopReason::ToolUse));
    }

    #[test]
    fn events_after_close_are_discarded() {
        let mut reframer = reframer();
        reframer.push(BackendEvent::Finish("stop".to_owned()));

        assert!(reframer.is_closed());
        assert!(reframer.push(text("late")).is_empty());
        assert!(reframer.finalize().is_empty());
    }

    #[test]
    fn failure_closes_open_block_then_emits_error() {
        let mut reframer = reframer();
        let mut events = reframer.push(text("partial"));
        events.extend(reframer.fail(&ErrorEnvelope::new(ErrorKind::RateLimited, "slow down")));

        assert_eq!(
            names(&events),
            vec!["content_block_start", "content_block_delta", "content_block_stop", "error"]
        );
        assert_eq!(
            events[3],
            StreamEvent::Error {
                error: ErrorDetail {
                    error_type: "rate_limit_error".to_owned(),
                    message: "slow down".to_owned(),
                }
            }
        );
        assert!(reframer.is_closed());
        assert!(reframer.fail(&ErrorEnvelope::new(ErrorKind::Internal, "again")).is_empty());
    }

    #[test]
    fn reported_usage_wins_over_estimate() {
        let mut reframer = reframer();
        reframer.push(text("abcdefgh"));
        assert_eq!(
            reframer.usage(),
            Usage {
                input_tokens: 10,
                output_tokens: 2
            }
        );

        reframer.push(BackendEvent::Usage {
            input_tokens: 31,
            output_tokens: 17,
        });
        let events = reframer.push(BackendEvent::Finish("length".to_owned()));

        assert!(matches!(
            &events[1],
            StreamEvent::MessageDelta { delta, usage }
                if delta.stop_reason == Some(StopReason::MaxTokens)
                    && *usage == (Usage { input_tokens: 31, output_tokens: 17 })
        ));
    }

    #[test]
    fn message_start_carries_shell() {
        let StreamEvent::MessageStart { message } = reframer().start() else {
            panic!("expected message_start");
        };

        assert_eq!(message.id, "msg_test");
        assert!(message.content.is_empty());
        assert_eq!(message.stop_reason, None);
        assert_eq!(message.usage.input_tokens, 10);
        assert_eq!(message.usage.output_tokens, 0);
    }

    #[test]
    fn degenerate_tool_ids_are_replaced() {
        let events = run(vec![tool_start(0, "", "t")]);

        assert!(matches!(
            &events[1],
            StreamEvent::ContentBlockStart { content_block: ResponseBlock::ToolUse { id, .. }, .. } if id.starts_with("toolu_")
        ));
    }
}
