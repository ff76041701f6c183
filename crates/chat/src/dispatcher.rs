//! Routing of inbound events.
//!
//! Each event is handled on its own; the only state shared between events is
//! the [`ConversationStore`]. Backend failures and unusable photos are reported
//! to the user. Transport failures are logged and dropped.

use std::sync::Arc;

use {
    courier_agents::{AiGateway, DEFAULT_IMAGE_PROMPT, ImageInput},
    courier_channels::{
        ChannelMedia, ChannelOutbound, ChatId, Command, ControlAction, InboundEvent, MessageId,
        PhotoVariant, TELEGRAM_MAX_MESSAGE_LEN, chunk, largest_variant,
    },
    courier_sessions::{ConversationStore, Role, UserId},
    tracing::{debug, info, warn},
};

use crate::{
    error::{Error, Result},
    replies,
};

/// Knobs that come from configuration.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Platform message limit, in characters.
    pub max_message_len: usize,
    /// Prompt for photos sent without a caption.
    pub image_prompt: String,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_message_len: TELEGRAM_MAX_MESSAGE_LEN,
            image_prompt: DEFAULT_IMAGE_PROMPT.to_string(),
        }
    }
}

pub struct Dispatcher {
    store: Arc<ConversationStore>,
    gateway: Arc<dyn AiGateway>,
    outbound: Arc<dyn ChannelOutbound>,
    media: Arc<dyn ChannelMedia>,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(
        store: Arc<ConversationStore>,
        gateway: Arc<dyn AiGateway>,
        outbound: Arc<dyn ChannelOutbound>,
        media: Arc<dyn ChannelMedia>,
    ) -> Self {
        Self {
            store,
            gateway,
            outbound,
            media,
            settings: DispatchSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: DispatchSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Handle one event to completion. Never fails: anything that could not be
    /// reported to the user is logged.
    pub async fn dispatch(&self, event: InboundEvent) {
        let kind = event.kind();
        let user_id = event.user_id();
        let chat_id = event.chat_id();
        debug!(kind, %user_id, %chat_id, "dispatching event");

        let result = match event {
            InboundEvent::Text { text, .. } => self.handle_text(user_id, chat_id, &text).await,
            InboundEvent::Photo {
                variants, caption, ..
            } => {
                self.handle_photo(chat_id, &variants, caption.as_deref())
                    .await
            },
            InboundEvent::Command { command, .. } => {
                self.handle_command(user_id, chat_id, command).await
            },
            InboundEvent::Control {
                message_id, action, ..
            } => {
                self.handle_control(user_id, chat_id, message_id, action)
                    .await
            },
        };

        if let Err(e) = result {
            warn!(kind, %user_id, %chat_id, error = %e, "failed to deliver reply");
        }
    }

    async fn typing(&self, chat_id: ChatId) {
        if let Err(e) = self.outbound.send_typing(chat_id).await {
            debug!(%chat_id, error = %e, "typing indicator failed");
        }
    }

    async fn handle_text(&self, user_id: UserId, chat_id: ChatId, text: &str) -> Result<()> {
        self.typing(chat_id).await;

        match self.converse(user_id, text).await {
            Ok(reply) => self.send_reply(chat_id, &reply).await,
            Err(e) => {
                warn!(
                    %user_id,
                    provider = self.gateway.name(),
                    transient = e.is_transient(),
                    error = %e,
                    "chat request failed"
                );
                self.send(chat_id, &replies::backend_error(&e)).await
            },
        }
    }

    /// Record the user turn, ask the gateway and record its answer. On failure
    /// the user turn stays in the history without a reply.
    async fn converse(&self, user_id: UserId, text: &str) -> Result<String> {
        self.store.append_text(user_id, Role::User, text);
        let history = self.store.get(user_id);

        let reply = self.gateway.chat(&history, text).await?;
        self.store.append_text(user_id, Role::Model, reply.as_str());
        info!(
            %user_id,
            provider = self.gateway.name(),
            history_len = self.store.len(user_id),
            reply_len = reply.len(),
            "chat reply"
        );
        Ok(reply)
    }

    async fn handle_photo(
        &self,
        chat_id: ChatId,
        variants: &[PhotoVariant],
        caption: Option<&str>,
    ) -> Result<()> {
        self.typing(chat_id).await;

        match self.analyze_photo(variants, caption).await {
            Ok(description) => {
                self.send_reply(chat_id, &replies::image_analysis(&description))
                    .await
            },
            Err(e) => {
                warn!(%chat_id, transient = e.is_transient(), error = %e, "image analysis failed");
                self.send(chat_id, &replies::invalid_media(&e)).await
            },
        }
    }

    async fn analyze_photo(&self, variants: &[PhotoVariant], caption: Option<&str>) -> Result<String> {
        let image = self.fetch_image(variants).await?;
        let prompt = caption
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(self.settings.image_prompt.as_str());

        let description = self.gateway.describe_image(&image, prompt).await?;
        info!(
            provider = self.gateway.name(),
            image_bytes = image.data.len(),
            reply_len = description.len(),
            "image description"
        );
        Ok(description)
    }

    /// Download the largest variant and make it acceptable to the vision model.
    async fn fetch_image(&self, variants: &[PhotoVariant]) -> Result<ImageInput> {
        let variant =
            largest_variant(variants).ok_or_else(|| Error::invalid_media("no photo attached"))?;
        debug!(
            file_id = %variant.file_id,
            width = variant.width,
            height = variant.height,
            "downloading photo"
        );

        let bytes = self
            .media
            .download(&variant.file_id)
            .await
            .map_err(Error::invalid_media)?;
        let prepared = courier_media::prepare_for_vision(&bytes).map_err(Error::invalid_media)?;
        Ok(ImageInput::new(prepared.data, prepared.media_type))
    }

    async fn handle_command(&self, user_id: UserId, chat_id: ChatId, command: Command) -> Result<()> {
        self.typing(chat_id).await;

        match command {
            Command::Start => {
                self.outbound
                    .send_menu(chat_id, replies::WELCOME, &replies::start_menu())
                    .await?;
                Ok(())
            },
            Command::Help => self.send(chat_id, replies::HELP).await,
            Command::New => {
                self.store.reset(user_id);
                info!(%user_id, "conversation reset by command");
                self.send(chat_id, replies::CONVERSATION_RESET).await
            },
            Command::Unknown(name) => {
                debug!(%user_id, command = %name, "unknown command");
                self.send(chat_id, &replies::unknown_command(&name)).await
            },
        }
    }

    async fn handle_control(
        &self,
        user_id: UserId,
        chat_id: ChatId,
        message_id: Option<MessageId>,
        action: ControlAction,
    ) -> Result<()> {
        self.typing(chat_id).await;

        let text = match action {
            ControlAction::NewChat => {
                self.store.reset(user_id);
                info!(%user_id, "conversation reset by button");
                replies::CONVERSATION_RESET
            },
            ControlAction::Help => replies::HELP,
            ControlAction::Settings => replies::SETTINGS_UNAVAILABLE,
        };

        match message_id {
            Some(message_id) => {
                self.outbound
                    .edit_message(chat_id, message_id, text)
                    .await?;
                Ok(())
            },
            None => self.send(chat_id, text).await,
        }
    }

    async fn send(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.outbound.send_message(chat_id, text, false).await?;
        Ok(())
    }

    /// Split `text` to the platform limit and send every part in order,
    /// marking the continuations. Stops at the first failed part.
    async fn send_reply(&self, chat_id: ChatId, text: &str) -> Result<()> {
        let parts = chunk::split(text, self.chunk_len());
        if parts.len() > 1 {
            debug!(%chat_id, chunk_count = parts.len(), text_len = text.len(), "splitting reply");
        }

        for part in &parts {
            let body = if part.is_continuation() {
                replies::continuation(part.index, part.total, &part.text)
            } else {
                part.text.clone()
            };
            self.outbound
                .send_message(chat_id, &body, part.is_continuation())
                .await?;
        }
        Ok(())
    }

    /// Chunk size that leaves room for the continuation marker.
    fn chunk_len(&self) -> usize {
        self.settings
            .max_message_len
            .saturating_sub(replies::CONTINUATION_RESERVE)
            .max(1)
    }
}
