//! Chat state machine: idle <-> awaiting a backend reply.
//!
//! `ChatController` does no I/O. `submit` tells the caller which exchange to
//! run, and the caller reports the outcome back through `complete`.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::backend::{ImageModelInfo, ImageModelList};
use crate::conversation::{ChatMode, Conversation, Message, Role};
use crate::error::BackendError;

pub const DEFAULT_IMAGE_MODEL: &str = "realvis";
const NOTICE_TTL: Duration = Duration::from_secs(4);

/// A backend exchange requested by a submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exchange {
    Text { prompt: String },
    Image { prompt: String, model: Option<String> },
}

/// Successful outcome of an `Exchange`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Image { prompt: String, data_uri: String },
}

/// Transient notification shown until it expires
#[derive(Debug, Clone)]
pub struct Notice {
    pub text: String,
    pub expires_at: Instant,
}

#[derive(Debug)]
pub struct ChatController {
    conversation: Conversation,
    mode: ChatMode,
    /// Mode of the exchange awaiting a reply
    pending: Option<ChatMode>,
    image_models: Vec<ImageModelInfo>,
    default_image_model: String,
    selected_image_model: Option<String>,
    notice: Option<Notice>,
}

impl Default for ChatController {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ChatController {
    /// `preferred_image_model` is the user's last pick, if any.
    pub fn new(preferred_image_model: Option<String>) -> Self {
        Self {
            conversation: Conversation::new(),
            mode: ChatMode::Text,
            pending: None,
            image_models: Vec::new(),
            default_image_model: DEFAULT_IMAGE_MODEL.to_string(),
            selected_image_model: preferred_image_model.filter(|m| !m.is_empty()),
            notice: None,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Mode the in-flight exchange was submitted in, which may differ from
    /// the current mode if the user switched since.
    pub fn pending_mode(&self) -> Option<ChatMode> {
        self.pending
    }

    pub fn image_models(&self) -> &[ImageModelInfo] {
        &self.image_models
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Record a user submission and decide which exchange to run.
    ///
    /// Returns `None` (and changes nothing) for blank input or while a reply
    /// is still pending.
    pub fn submit(&mut self, input: &str) -> Option<Exchange> {
        let prompt = input.trim();
        if prompt.is_empty() || self.is_loading() {
            return None;
        }

        self.conversation.push(Message::new(Role::User, prompt));
        self.pending = Some(self.mode);

        let exchange = match self.mode {
            ChatMode::Text => Exchange::Text {
                prompt: prompt.to_string(),
            },
            ChatMode::Image => Exchange::Image {
                prompt: prompt.to_string(),
                model: self.image_model().map(str::to_string),
            },
        };
        Some(exchange)
    }

    /// Apply the outcome of the pending exchange.
    pub fn complete(&mut self, result: Result<Reply, BackendError>) {
        match result {
            Ok(Reply::Text(text)) => {
                let message = Message::new(Role::Assistant, text);
                debug!(id = %message.id, "text reply");
                self.conversation.push(message);
            }
            Ok(Reply::Image { prompt, data_uri }) => {
                let content = format!("Generated image for: \"{}\"", prompt);
                let message = Message::new(Role::Assistant, content).with_image(data_uri);
                debug!(id = %message.id, "image reply");
                self.conversation.push(message);
            }
            Err(e) => self.notify(e.to_string()),
        }
        self.pending = None;
    }

    /// Switch input mode. Returns `true` when the switch enters image mode,
    /// which is the cue to (re)load the model list.
    pub fn set_mode(&mut self, mode: ChatMode) -> bool {
        let entering_image = mode == ChatMode::Image && self.mode != ChatMode::Image;
        self.mode = mode;
        entering_image
    }

    pub fn models_loaded(&mut self, result: Result<ImageModelList, BackendError>) {
        match result {
            Ok(list) => {
                self.image_models = list.models;
                self.default_image_model = list.default;
                if self.image_models.is_empty() {
                    return;
                }
                // A pick the backend no longer offers falls back to its default
                let listed = self
                    .selected_image_model
                    .as_deref()
                    .is_some_and(|s| self.image_models.iter().any(|m| m.name == s));
                if !listed {
                    if let Some(stale) = &self.selected_image_model {
                        debug!(model = %stale, "selected image model not listed");
                    }
                    self.selected_image_model =
                        Some(self.default_image_model.clone()).filter(|m| !m.is_empty());
                }
            }
            Err(_) => self.image_models.clear(),
        }
    }

    pub fn select_image_model(&mut self, name: &str) {
        self.selected_image_model = Some(name.to_string()).filter(|m| !m.is_empty());
    }

    /// Selected image model, falling back to the backend default.
    pub fn image_model(&self) -> Option<&str> {
        self.selected_image_model
            .as_deref()
            .or(Some(self.default_image_model.as_str()))
            .filter(|m| !m.is_empty())
    }

    pub fn model_selector_visible(&self) -> bool {
        self.mode == ChatMode::Image && !self.image_models.is_empty()
    }

    pub fn notify(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            expires_at: Instant::now() + NOTICE_TTL,
        });
    }

    pub fn expire_notice(&mut self, now: Instant) {
        if self.notice.as_ref().is_some_and(|n| now >= n.expires_at) {
            self.notice = None;
        }
    }
}
