use {
    async_trait::async_trait,
    teloxide::{
        ApiError, RequestError,
        payloads::{EditMessageTextSetters, SendMessageSetters},
        prelude::*,
        types::{ChatAction, InlineKeyboardButton, InlineKeyboardMarkup, ParseMode},
    },
    tracing::{debug, warn},
};

use courier_channels::{
    ChannelMedia, ChannelOutbound, ChatId, Error as ChannelError, MenuButton, MessageId,
    Result as ChannelResult,
};

/// Sends replies and fetches files through one teloxide `Bot`.
#[derive(Clone)]
pub struct TelegramOutbound {
    bot: Bot,
}

impl TelegramOutbound {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Send as Markdown; if Telegram rejects the markup, resend as plain text.
    async fn send_with_fallback(
        &self,
        chat_id: ChatId,
        text: &str,
        silent: bool,
        markup: Option<InlineKeyboardMarkup>,
    ) -> Result<(), RequestError> {
        let build = |parse_mode: Option<ParseMode>| {
            let mut req = self
                .bot
                .send_message(teloxide::types::ChatId(chat_id.0), text)
                .disable_notification(silent);
            if let Some(mode) = parse_mode {
                req = req.parse_mode(mode);
            }
            if let Some(markup) = markup.clone() {
                req = req.reply_markup(markup);
            }
            req
        };

        match build(Some(ParseMode::Markdown)).await {
            Ok(_) => Ok(()),
            Err(e) if is_markup_error(&e) => {
                warn!(%chat_id, error = %e, "telegram Markdown send failed, retrying as plain text");
                build(None).await.map(|_| ())
            },
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ChannelOutbound for TelegramOutbound {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        is_continuation: bool,
    ) -> ChannelResult<()> {
        // Only the first part of a split reply notifies the user.
        self.send_with_fallback(chat_id, text, is_continuation, None)
            .await
            .map_err(|e| ChannelError::external("telegram send message", e))
    }

    async fn send_menu(
        &self,
        chat_id: ChatId,
        text: &str,
        buttons: &[MenuButton],
    ) -> ChannelResult<()> {
        self.send_with_fallback(chat_id, text, false, Some(keyboard(buttons)))
            .await
            .map_err(|e| ChannelError::external("telegram send menu", e))
    }

    async fn send_typing(&self, chat_id: ChatId) -> ChannelResult<()> {
        self.bot
            .send_chat_action(teloxide::types::ChatId(chat_id.0), ChatAction::Typing)
            .await
            .map(|_| ())
            .map_err(|e| ChannelError::external("telegram send chat action", e))
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> ChannelResult<()> {
        let chat = teloxide::types::ChatId(chat_id.0);
        let id = teloxide::types::MessageId(message_id.0);

        let result = match self
            .bot
            .edit_message_text(chat, id, text)
            .parse_mode(ParseMode::Markdown)
            .await
        {
            Err(e) if is_markup_error(&e) => {
                warn!(%chat_id, error = %e, "telegram Markdown edit failed, retrying as plain text");
                self.bot.edit_message_text(chat, id, text).await
            },
            other => other,
        };

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_message_not_modified_error(&e) => {
                debug!(%chat_id, "message already shows this text");
                Ok(())
            },
            Err(e) => Err(ChannelError::external("telegram edit message", e)),
        }
    }
}

#[async_trait]
impl ChannelMedia for TelegramOutbound {
    async fn download(&self, file_id: &str) -> ChannelResult<Vec<u8>> {
        let file = self
            .bot
            .get_file(file_id)
            .await
            .map_err(|e| ChannelError::external("telegram get file", e))?;

        // https://api.telegram.org/file/bot<token>/<file_path>
        let url = self
            .bot
            .api_url()
            .join(&format!("file/bot{}/{}", self.bot.token(), file.path))
            .map_err(|e| ChannelError::external("telegram file url", e))?;

        let response = self
            .bot
            .client()
            .get(url)
            .send()
            .await
            .map_err(|e| ChannelError::external("telegram file download", e))?;
        if !response.status().is_success() {
            return Err(ChannelError::unavailable(format!(
                "failed to download file: HTTP {}",
                response.status()
            )));
        }
        let data = response
            .bytes()
            .await
            .map_err(|e| ChannelError::external("telegram file download", e))?;
        debug!(file_id, bytes = data.len(), "downloaded telegram file");
        Ok(data.to_vec())
    }
}

/// One button per row.
fn keyboard(buttons: &[MenuButton]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(buttons.iter().map(|b| {
        [InlineKeyboardButton::callback(
            b.label.clone(),
            b.action.callback_data(),
        )]
    }))
}

fn is_markup_error(err: &RequestError) -> bool {
    matches!(err, RequestError::Api(ApiError::CantParseEntities(_)))
        || err
            .to_string()
            .to_ascii_lowercase()
            .contains("can't parse entities")
}

fn is_message_not_modified_error(err: &RequestError) -> bool {
    matches!(err, RequestError::Api(ApiError::MessageNotModified))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        axum::{
            Json, Router,
            body::Bytes,
            extract::State,
            http::Uri,
            routing::post,
        },
        courier_channels::ControlAction,
        serde_json::{Value, json},
        std::sync::{Arc, Mutex},
        tokio::sync::oneshot,
    };

    #[derive(Debug, Clone)]
    struct Captured {
        method: String,
        body: Value,
    }

    #[derive(Clone, Default)]
    struct MockTelegramApi {
        requests: Arc<Mutex<Vec<Captured>>>,
        /// Reject every Markdown request with a parse error.
        reject_markdown: bool,
    }

    impl MockTelegramApi {
        fn captured(&self) -> Vec<Captured> {
            self.requests.lock().expect("lock requests").clone()
        }
    }

    fn message_result(text: &str) -> Value {
        json!({
            "message_id": 1,
            "date": 0,
            "chat": { "id": 42, "type": "private", "first_name": "Alice" },
            "text": text
        })
    }

    async fn telegram_api_handler(
        State(state): State<MockTelegramApi>,
        uri: Uri,
        body: Bytes,
    ) -> Json<Value> {
        let method = uri.path().rsplit('/').next().unwrap_or_default().to_string();
        let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        state.requests.lock().expect("lock requests").push(Captured {
            method: method.clone(),
            body: body.clone(),
        });

        if state.reject_markdown && body["parse_mode"] == "Markdown" {
            return Json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: can't parse entities: Can't find end of the entity starting at byte offset 3"
            }));
        }

        Json(match method.as_str() {
            "SendMessage" | "EditMessageText" => json!({
                "ok": true,
                "result": message_result(body["text"].as_str().unwrap_or_default())
            }),
            "GetFile" => json!({
                "ok": true,
                "result": {
                    "file_id": "photo-id",
                    "file_unique_id": "photo-unique",
                    "file_size": 3,
                    "file_path": "photos/file_1.jpg"
                }
            }),
            _ => json!({ "ok": true, "result": true }),
        })
    }

    async fn file_handler(uri: Uri) -> Vec<u8> {
        assert_eq!(uri.path(), "/file/bottest-token/photos/file_1.jpg");
        vec![1, 2, 3]
    }

    async fn start_mock(api: MockTelegramApi) -> (TelegramOutbound, oneshot::Sender<()>) {
        let app = Router::new()
            .route("/{*path}", post(telegram_api_handler).get(file_handler))
            .with_state(api);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("serve mock telegram api");
        });

        let api_url = reqwest::Url::parse(&format!("http://{addr}/")).expect("parse api url");
        let bot = Bot::new("test-token").set_api_url(api_url);
        (TelegramOutbound::new(bot), shutdown_tx)
    }

    #[tokio::test]
    async fn sends_markdown_and_silences_continuations() {
        let api = MockTelegramApi::default();
        let (outbound, shutdown) = start_mock(api.clone()).await;

        outbound
            .send_message(ChatId(42), "*first*", false)
            .await
            .unwrap();
        outbound
            .send_message(ChatId(42), "second", true)
            .await
            .unwrap();

        let requests = api.captured();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.method == "SendMessage"));
        assert_eq!(requests[0].body["chat_id"], 42);
        assert_eq!(requests[0].body["text"], "*first*");
        assert_eq!(requests[0].body["parse_mode"], "Markdown");
        assert_ne!(requests[0].body["disable_notification"], true);
        assert_eq!(requests[1].body["disable_notification"], true);

        let _ = shutdown.send(());
    }

    #[tokio::test]
    async fn falls_back_to_plain_text_on_markup_error() {
        let api = MockTelegramApi {
            reject_markdown: true,
            ..Default::default()
        };
        let (outbound, shutdown) = start_mock(api.clone()).await;

        outbound
            .send_message(ChatId(42), "bad *markup", false)
            .await
            .unwrap();

        let requests = api.captured();
        assert_eq!(requests.len(), 2, "{requests:?}");
        assert_eq!(requests[0].body["parse_mode"], "Markdown");
        assert!(requests[1].body.get("parse_mode").is_none());
        assert_eq!(requests[1].body["text"], "bad *markup");

        let _ = shutdown.send(());
    }

    #[tokio::test]
    async fn menu_has_one_button_per_row() {
        let api = MockTelegramApi::default();
        let (outbound, shutdown) = start_mock(api.clone()).await;

        let buttons = [
            MenuButton::new("🤖 New chat", ControlAction::NewChat),
            MenuButton::new("📋 Help", ControlAction::Help),
        ];
        outbound
            .send_menu(ChatId(42), "welcome", &buttons)
            .await
            .unwrap();

        let requests = api.captured();
        let rows = requests[0].body["reply_markup"]["inline_keyboard"]
            .as_array()
            .unwrap()
            .clone();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0]["text"], "🤖 New chat");
        assert_eq!(rows[0][0]["callback_data"], "new_chat");
        assert_eq!(rows[1][0]["callback_data"], "help");

        let _ = shutdown.send(());
    }

    #[tokio::test]
    async fn typing_and_edit() {
        let api = MockTelegramApi::default();
        let (outbound, shutdown) = start_mock(api.clone()).await;

        outbound.send_typing(ChatId(42)).await.unwrap();
        outbound
            .edit_message(ChatId(42), MessageId(99), "🔄 cleared")
            .await
            .unwrap();

        let requests = api.captured();
        assert_eq!(requests[0].method, "SendChatAction");
        assert_eq!(requests[0].body["action"], "typing");
        assert_eq!(requests[1].method, "EditMessageText");
        assert_eq!(requests[1].body["message_id"], 99);
        assert_eq!(requests[1].body["text"], "🔄 cleared");

        let _ = shutdown.send(());
    }

    #[tokio::test]
    async fn downloads_file_through_api_url() {
        let api = MockTelegramApi::default();
        let (outbound, shutdown) = start_mock(api.clone()).await;

        let data = outbound.download("photo-id").await.unwrap();
        assert_eq!(data, vec![1, 2, 3]);

        let requests = api.captured();
        assert_eq!(requests[0].method, "GetFile");
        assert_eq!(requests[0].body["file_id"], "photo-id");

        let _ = shutdown.send(());
    }
}
