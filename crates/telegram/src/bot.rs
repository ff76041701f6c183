use std::{sync::Arc, time::Duration};

use {
    secrecy::ExposeSecret,
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, BotCommand, UpdateKind},
    },
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use {courier_channels::Command, courier_chat::Dispatcher, courier_config::TelegramConfig};

use crate::{
    error::{Error, Result},
    handlers,
};

/// Added to the long-poll timeout so the HTTP client doesn't abort the
/// request before Telegram responds.
const CLIENT_TIMEOUT_MARGIN: Duration = Duration::from_secs(15);

const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// A running polling loop.
pub struct Polling {
    pub cancel: CancellationToken,
    pub task: JoinHandle<()>,
}

impl Polling {
    /// Stop polling and wait for the loop to exit. Events already handed to
    /// the dispatcher keep running on their own tasks.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "telegram polling task failed");
        }
    }
}

/// Build a bot for the configured token.
pub fn build_bot(config: &TelegramConfig) -> Result<Bot> {
    let token = config
        .token
        .as_ref()
        .map(|t| t.expose_secret().trim())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::message("telegram bot token is not configured"))?;

    let timeout = Duration::from_secs(config.poll_timeout_secs.into()) + CLIENT_TIMEOUT_MARGIN;
    let client = teloxide::net::default_reqwest_settings()
        .timeout(timeout)
        .build()?;
    Ok(Bot::with_client(token, client))
}

/// Connect and start polling for updates.
///
/// Verifies the token, clears any webhook so long polling works, registers
/// the bot commands, then spawns a task that feeds every update to
/// `dispatcher` until the returned token is cancelled.
pub async fn start_polling(
    bot: Bot,
    config: &TelegramConfig,
    dispatcher: Arc<Dispatcher>,
) -> Result<Polling> {
    let me = bot.get_me().await.map_err(|e| Error::api("getMe", e))?;
    let username = me.username.clone();

    bot.delete_webhook()
        .send()
        .await
        .map_err(|e| Error::api("deleteWebhook", e))?;

    if config.register_commands {
        let commands = Command::REGISTERED
            .iter()
            .map(|(name, description)| BotCommand::new(*name, *description));
        if let Err(e) = bot.set_my_commands(commands).await {
            warn!(error = %e, "failed to register bot commands");
        }
    }

    info!(username = ?username, "telegram bot connected (webhook cleared)");

    let cancel = CancellationToken::new();
    let task = tokio::spawn(poll_loop(
        bot,
        dispatcher,
        cancel.clone(),
        config.poll_timeout_secs,
    ));

    Ok(Polling { cancel, task })
}

async fn poll_loop(
    bot: Bot,
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
    poll_timeout_secs: u32,
) {
    info!("starting telegram polling loop");
    let mut offset: i32 = 0;

    loop {
        let request = bot
            .get_updates()
            .offset(offset)
            .timeout(poll_timeout_secs)
            .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::CallbackQuery])
            .send();

        let result = tokio::select! {
            () = cancel.cancelled() => break,
            result = request => result,
        };

        match result {
            Ok(updates) => {
                debug!(count = updates.len(), "got telegram updates");
                for update in updates {
                    offset = update.id.as_offset();
                    route_update(&bot, &dispatcher, update.kind);
                }
            },
            Err(RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) => {
                warn!(
                    "telegram polling stopped: another instance is already running with this token"
                );
                cancel.cancel();
                break;
            },
            Err(e) => {
                warn!(error = %e, "telegram getUpdates failed");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(POLL_ERROR_BACKOFF) => {},
                }
            },
        }
    }

    info!("telegram polling stopped");
}

/// Hand the update to the dispatcher on its own task.
fn route_update(bot: &Bot, dispatcher: &Arc<Dispatcher>, kind: UpdateKind) {
    match kind {
        UpdateKind::Message(msg) => {
            debug!(chat_id = msg.chat.id.0, "received telegram message");
            if let Some(event) = handlers::event_from_message(&msg) {
                let dispatcher = Arc::clone(dispatcher);
                tokio::spawn(async move { dispatcher.dispatch(event).await });
            }
        },
        UpdateKind::CallbackQuery(query) => {
            debug!(callback_data = ?query.data, "received telegram callback query");
            let bot = bot.clone();
            let dispatcher = Arc::clone(dispatcher);
            tokio::spawn(async move {
                if let Some(event) = handlers::handle_callback_query(&bot, query).await {
                    dispatcher.dispatch(event).await;
                }
            });
        },
        other => debug!("ignoring telegram update: {other:?}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        async_trait::async_trait,
        axum::{Json, Router, body::Bytes, extract::State, http::Uri, routing::post},
        courier_agents::{AiGateway, ImageInput},
        courier_sessions::{ConversationStore, Turn, UserId},
        secrecy::Secret,
        serde_json::{Value, json},
        std::sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
        tokio::sync::oneshot,
    };

    use crate::outbound::TelegramOutbound;

    #[derive(Clone, Default)]
    struct MockTelegramApi {
        requests: Arc<Mutex<Vec<(String, Value)>>>,
        polls: Arc<AtomicUsize>,
    }

    impl MockTelegramApi {
        fn bodies(&self, method: &str) -> Vec<Value> {
            self.requests
                .lock()
                .expect("lock requests")
                .iter()
                .filter(|(m, _)| m == method)
                .map(|(_, body)| body.clone())
                .collect()
        }
    }

    async fn telegram_api_handler(
        State(state): State<MockTelegramApi>,
        uri: Uri,
        body: Bytes,
    ) -> Json<Value> {
        let method = uri.path().rsplit('/').next().unwrap_or_default().to_string();
        let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        state
            .requests
            .lock()
            .expect("lock requests")
            .push((method.clone(), body.clone()));

        Json(match method.as_str() {
            "GetMe" => json!({
                "ok": true,
                "result": {
                    "id": 777,
                    "is_bot": true,
                    "first_name": "Courier",
                    "username": "courier_bot",
                    "can_join_groups": false,
                    "can_read_all_group_messages": false,
                    "supports_inline_queries": false,
                    "can_connect_to_business": false,
                    "has_main_web_app": false
                }
            }),
            "GetUpdates" if state.polls.fetch_add(1, Ordering::SeqCst) == 0 => json!({
                "ok": true,
                "result": [{
                    "update_id": 10,
                    "message": {
                        "message_id": 5,
                        "date": 1,
                        "chat": { "id": 42, "type": "private", "first_name": "Alice" },
                        "from": { "id": 1001, "is_bot": false, "first_name": "Alice" },
                        "text": "hello"
                    }
                }]
            }),
            "GetUpdates" => {
                tokio::time::sleep(Duration::from_millis(100)).await;
                json!({ "ok": true, "result": [] })
            },
            "SendMessage" => json!({
                "ok": true,
                "result": {
                    "message_id": 6,
                    "date": 2,
                    "chat": { "id": 42, "type": "private", "first_name": "Alice" },
                    "text": body["text"]
                }
            }),
            _ => json!({ "ok": true, "result": true }),
        })
    }

    struct EchoGateway;

    #[async_trait]
    impl AiGateway for EchoGateway {
        fn name(&self) -> &str {
            "echo"
        }

        async fn chat(&self, _history: &[Turn], new_message: &str) -> courier_agents::Result<String> {
            Ok(format!("echo: {new_message}"))
        }

        async fn describe_image(
            &self,
            _image: &ImageInput,
            _prompt: &str,
        ) -> courier_agents::Result<String> {
            Err(courier_agents::Error::message("no vision"))
        }
    }

    #[test]
    fn build_bot_requires_token() {
        let err = build_bot(&TelegramConfig::default()).unwrap_err();
        assert!(err.to_string().contains("token"));

        let config = TelegramConfig {
            token: Some(Secret::new("  ".into())),
            ..Default::default()
        };
        assert!(build_bot(&config).is_err());

        let config = TelegramConfig {
            token: Some(Secret::new("123:abc".into())),
            ..Default::default()
        };
        assert_eq!(build_bot(&config).unwrap().token(), "123:abc");
    }

    #[tokio::test]
    async fn polls_updates_and_dispatches_replies() {
        let api = MockTelegramApi::default();
        let app = Router::new()
            .route("/{*path}", post(telegram_api_handler))
            .with_state(api.clone());
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
        let outbound = Arc::new(TelegramOutbound::new(bot.clone()));
        let store = Arc::new(ConversationStore::default());
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&store),
            Arc::new(EchoGateway),
            Arc::clone(&outbound) as _,
            outbound as _,
        ));

        let config = TelegramConfig {
            poll_timeout_secs: 1,
            ..Default::default()
        };
        let polling = start_polling(bot, &config, dispatcher).await.unwrap();

        let mut replies = Vec::new();
        for _ in 0..100 {
            replies = api.bodies("SendMessage");
            if !replies.is_empty() && api.bodies("GetUpdates").len() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        polling.shutdown().await;

        assert_eq!(replies.len(), 1, "expected one reply");
        assert_eq!(replies[0]["chat_id"], 42);
        assert_eq!(replies[0]["text"], "echo: hello");
        assert_eq!(store.get(UserId(1001)), vec![
            Turn::user("hello"),
            Turn::model("echo: hello")
        ]);

        let commands = api.bodies("SetMyCommands");
        let names: Vec<&str> = commands[0]["commands"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|c| c["command"].as_str())
            .collect();
        assert_eq!(names, ["start", "help", "new"]);
        assert_eq!(api.bodies("DeleteWebhook").len(), 1);
        assert_eq!(api.bodies("SendChatAction").len(), 1);

        // The next poll acknowledges the first update.
        let polls = api.bodies("GetUpdates");
        assert_eq!(polls[0]["offset"], 0);
        assert_eq!(polls[1]["offset"], 11);

        let _ = shutdown_tx.send(());
    }
}
