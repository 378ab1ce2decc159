//! Streaming driver
//!
//! Pulls decoded frames from the backend one at a time, feeds them to the
//! re-framer and yields client events. A backend finish is held back until
//! the next non-usage event (or the end of the stream) so a trailing usage
//! chunk still lands in the final `message_delta`.

use std::collections::VecDeque;
use std::time::Duration;

use futures_util::{Stream, StreamExt, stream};

use crate::backend::FrameStream;
use crate::decode::Frame;
use crate::error::ErrorEnvelope;
use crate::protocol::anthropic::StreamEvent;
use crate::reframe::{BackendEvent, Reframer};

/// One item of the outbound client stream
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// A client-protocol event
    Event(StreamEvent),
    /// The `[DONE]` end-of-stream marker
    Done,
}

struct Driver {
    frames: FrameStream,
    reframer: Reframer,
    pending: VecDeque<Outbound>,
    deferred_finish: Option<String>,
    finished: bool,
    interval: Duration,
    emitted: bool,
}

/// Drive a backend frame stream through the re-framer
///
/// The output always starts with `message_start` and ends with
/// [`Outbound::Done`], whatever the backend does.
pub fn drive(frames: FrameStream, reframer: Reframer, interval: Duration) -> impl Stream<Item = Outbound> + Send {
    let mut pending = VecDeque::new();
    pending.push_back(Outbound::Event(reframer.start()));

    let driver = Driver {
        frames,
        reframer,
        pending,
        deferred_finish: None,
        finished: false,
        interval,
        emitted: false,
    };

    stream::unfold(driver, |mut driver| async move {
        loop {
            if let Some(item) = driver.pending.pop_front() {
                if driver.emitted && !driver.interval.is_zero() {
                    tokio::time::sleep(driver.interval).await;
                }
                driver.emitted = true;
                return Some((item, driver));
            }

            if driver.finished {
                return None;
            }

            driver.pull().await;
        }
    })
}

impl Driver {
    async fn pull(&mut self) {
        match self.frames.next().await {
            Some(Ok(Frame::Events(events))) => {
                for event in events {
                    self.on_event(event);
                }
            }
            Some(Ok(Frame::Skip)) => {}
            Some(Ok(Frame::Done)) | None => self.end(),
            Some(Ok(Frame::Failure(envelope))) => self.abort(&envelope),
            Some(Err(e)) => self.abort(&e.envelope()),
        }
    }

    fn on_event(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::Usage { .. } => self.emit(event),
            BackendEvent::Finish(reason) => {
                if self.deferred_finish.is_some() {
                    tracing::debug!(%reason, "ignoring repeated finish reason");
                } else {
                    self.deferred_finish = Some(reason);
                }
            }
            other => {
                self.flush_finish();
                self.emit(other);
            }
        }
    }

    fn emit(&mut self, event: BackendEvent) {
        let events = self.reframer.push(event);
        self.pending.extend(events.into_iter().map(Outbound::Event));
    }

    fn flush_finish(&mut self) {
        if let Some(reason) = self.deferred_finish.take() {
            self.emit(BackendEvent::Finish(reason));
        }
    }

    fn end(&mut self) {
        self.flush_finish();
        let events = self.reframer.finalize();
        self.pending.extend(events.into_iter().map(Outbound::Event));
        self.pending.push_back(Outbound::Done);
        self.finished = true;
    }

    fn abort(&mut self, envelope: &ErrorEnvelope) {
        tracing::warn!(kind = ?envelope.kind, error = %envelope.message, "backend stream failed");

        self.flush_finish();
        let events = self.reframer.fail(envelope);
        self.pending.extend(events.into_iter().map(Outbound::Event));
        self.pending.push_back(Outbound::Done);
        self.finished = true;
    }
}
