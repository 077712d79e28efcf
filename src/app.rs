use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::sync::mpsc::UnboundedSender;

use crate::backend::BackendClient;
use crate::config::Config;
use crate::controller::{ChatController, Exchange, Reply};
use crate::conversation::ChatMode;
use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Chat state
    pub chat: ChatController,

    // Input box
    pub input: String,
    pub input_cursor: usize, // cursor position in chars, not bytes

    // Chat view
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub follow_output: bool,
    pub chat_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Model picker state
    pub show_model_picker: bool,
    pub model_picker_state: ListState,

    pub backend: BackendClient,
    pub config: Config,
    events: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(config: Config, events: UnboundedSender<AppEvent>) -> Self {
        let backend = BackendClient::new(&config.backend_url);
        let chat = ChatController::new(config.image_model.clone());

        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            chat,

            input: String::new(),
            input_cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            follow_output: true,
            chat_area: None,

            animation_frame: 0,

            show_model_picker: false,
            model_picker_state: ListState::default(),

            backend,
            config,
            events,
        }
    }

    /// Submit the input box contents and start the matching backend exchange.
    pub fn submit_input(&mut self) {
        let Some(exchange) = self.chat.submit(&self.input) else {
            return;
        };

        self.input.clear();
        self.input_cursor = 0;
        self.follow_output = true;
        self.spawn_exchange(exchange);
    }

    fn spawn_exchange(&self, exchange: Exchange) {
        let backend = self.backend.clone();
        let text_model = self.config.text_model.clone();
        let tx = self.events.clone();

        tokio::spawn(async move {
            let result = match exchange {
                Exchange::Text { prompt } => backend
                    .send_text(&prompt, &text_model)
                    .await
                    .map(Reply::Text),
                Exchange::Image { prompt, model } => backend
                    .send_image(&prompt, model.as_deref())
                    .await
                    .map(|data_uri| Reply::Image { prompt, data_uri }),
            };
            let _ = tx.send(AppEvent::Reply(result));
        });
    }

    pub fn set_mode(&mut self, mode: ChatMode) {
        if self.chat.set_mode(mode) {
            self.spawn_model_listing();
        }
        if !self.chat.model_selector_visible() {
            self.show_model_picker = false;
        }
    }

    pub fn toggle_mode(&mut self) {
        self.set_mode(self.chat.mode().toggled());
    }

    fn spawn_model_listing(&self) {
        let backend = self.backend.clone();
        let tx = self.events.clone();

        tokio::spawn(async move {
            let result = backend.fetch_image_models().await;
            let _ = tx.send(AppEvent::ModelsLoaded(result));
        });
    }

    /// Tick animation frame and expire stale notices (called by Tick event)
    pub fn tick(&mut self) {
        if self.chat.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        self.chat.expire_notice(std::time::Instant::now());
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_output = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow_output = true;
    }

    /// Clamp scroll to the rendered content; pins to the bottom while following.
    pub fn update_scroll(&mut self, total_lines: u16) {
        let max_scroll = total_lines.saturating_sub(self.chat_height);
        if self.follow_output || self.chat_scroll >= max_scroll {
            self.chat_scroll = max_scroll;
            self.follow_output = true;
        }
    }

    // Model picker methods
    pub fn open_model_picker(&mut self) {
        if !self.chat.model_selector_visible() {
            return;
        }
        let current = self.chat.image_model();
        let idx = self
            .chat
            .image_models()
            .iter()
            .position(|m| Some(m.name.as_str()) == current)
            .unwrap_or(0);
        self.model_picker_state.select(Some(idx));
        self.show_model_picker = true;
    }

    pub fn model_picker_nav_down(&mut self) {
        let len = self.chat.image_models().len();
        if len > 0 {
            let i = self.model_picker_state.selected().unwrap_or(0);
            self.model_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn model_picker_nav_up(&mut self) {
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_model(&mut self) {
        let Some(i) = self.model_picker_state.selected() else {
            return;
        };
        let Some(name) = self.chat.image_models().get(i).map(|m| m.name.clone()) else {
            return;
        };

        self.chat.select_image_model(&name);
        self.config.image_model = Some(name.clone());
        self.show_model_picker = false;
        if let Err(e) = Config::save_image_model(&name) {
            tracing::warn!("could not persist image model: {}", e);
        }
    }
}
