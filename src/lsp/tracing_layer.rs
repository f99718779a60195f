//! Tracing layer that forwards events to LSP window/logMessage.
//!
//! Only `INFO` and more severe events are forwarded; debug output stays on
//! stderr.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::Sender;
use lsp_server::{Connection, Message, Notification};
use lsp_types::notification::{LogMessage, Notification as _};
use lsp_types::{LogMessageParams, MessageType};
use tracing::{Level, Subscriber};
use tracing_subscriber::Layer;

/// A tracing layer that sends log messages to the LSP client.
///
/// Before `mark_initialized()` is called, messages are dropped: the client
/// must not see notifications ahead of the initialize response.
pub struct LspLayer {
    sender: Sender<Message>,
    initialized: Arc<AtomicBool>,
}

/// Handle to mark the LspLayer as initialized.
#[derive(Clone)]
pub struct LspLayerHandle {
    initialized: Arc<AtomicBool>,
}

impl LspLayerHandle {
    pub fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::SeqCst);
    }
}

impl LspLayer {
    pub fn new(connection: &Connection) -> (Self, LspLayerHandle) {
        let initialized = Arc::new(AtomicBool::new(false));
        let layer = Self {
            sender: connection.sender.clone(),
            initialized: Arc::clone(&initialized),
        };
        (layer, LspLayerHandle { initialized })
    }

    fn level_to_message_type(level: &Level) -> MessageType {
        match *level {
            Level::ERROR => MessageType::ERROR,
            Level::WARN => MessageType::WARNING,
            Level::INFO => MessageType::INFO,
            Level::DEBUG | Level::TRACE => MessageType::LOG,
        }
    }
}

/// Collects the message and the structured fields of an event into one line.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else {
            format!("{} ({})", self.message, self.fields.join(", "))
        }
    }
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push(format!("{}={value:?}", field.name()));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={value}", field.name()));
        }
    }
}

impl<S: Subscriber> Layer<S> for LspLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let metadata = event.metadata();
        if *metadata.level() > Level::INFO || !self.initialized.load(Ordering::SeqCst) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let mut message = visitor.finish();
        if message.is_empty() {
            message = metadata.target().to_string();
        }

        let params = LogMessageParams {
            typ: Self::level_to_message_type(metadata.level()),
            message,
        };
        let notif = Notification::new(LogMessage::METHOD.to_string(), params);
        let _ = self.sender.send(Message::Notification(notif));
    }
}
