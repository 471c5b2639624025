use std::sync::Arc;

use async_trait::async_trait;
use teloxide::dispatching::{HandlerExt, UpdateFilterExt};
use teloxide::dispatching::ShutdownToken;
use teloxide::prelude::*;
use teloxide::types::ChatId;

use crate::error::{AppError, AppResult};
use crate::routes::commands::{self, Command};
use crate::services::notifications::Notifier;
use crate::AppState;

#[derive(Clone)]
pub struct TelegramService {
    bot: Bot,
}

/// Chat ids are stored as the decimal string of Telegram's numeric id.
fn parse_chat_id(chat_id: &str) -> AppResult<ChatId> {
    chat_id
        .trim()
        .parse::<i64>()
        .map(ChatId)
        .map_err(|_| AppError::Telegram(format!("Invalid chat_id {}", chat_id)))
}

impl TelegramService {
    pub async fn new(token: String) -> AppResult<Self> {
        let bot = Bot::new(token);

        // Verify the bot token by getting bot info
        match bot.get_me().await {
            Ok(me) => {
                tracing::info!("Telegram bot initialized: @{}", me.username());
                Ok(Self { bot })
            }
            Err(e) => {
                tracing::error!("Failed to initialize Telegram bot: {}", e);
                Err(AppError::Telegram(format!(
                    "Failed to initialize bot: {}",
                    e
                )))
            }
        }
    }

    pub async fn send_message(&self, chat_id: &str, text: &str) -> AppResult<i32> {
        let chat = parse_chat_id(chat_id)?;

        match self.bot.send_message(chat, text).await {
            Ok(sent_message) => {
                tracing::debug!(
                    "Telegram message sent to {}: message_id={}",
                    chat_id,
                    sent_message.id.0
                );
                Ok(sent_message.id.0)
            }
            Err(e) => {
                tracing::error!("Failed to send Telegram message: {}", e);
                Err(AppError::Telegram(format!("Failed to send message: {}", e)))
            }
        }
    }

    /// Start long polling for bot commands in a background task.
    ///
    /// The returned token stops the dispatcher.
    pub fn spawn_dispatcher(
        &self,
        state: Arc<AppState>,
    ) -> (ShutdownToken, tokio::task::JoinHandle<()>) {
        let handler = Update::filter_message()
            .filter_command::<Command>()
            .endpoint(handle_command);

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![state])
            .default_handler(|update| async move {
                tracing::debug!("Ignoring update {:?}", update.id);
            })
            .build();

        let token = dispatcher.shutdown_token();
        let handle = tokio::spawn(async move {
            tracing::info!("Listening for Telegram commands");
            dispatcher.dispatch().await;
        });

        (token, handle)
    }
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    // The chat id doubles as the user id; notifications go back to the same chat.
    let user_id = msg.chat.id.0.to_string();
    tracing::debug!("Command {:?} from {}", cmd, user_id);

    let reply = commands::execute(&state, &user_id, cmd).await;
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

#[async_trait]
impl Notifier for TelegramService {
    async fn send_notification(&self, user_id: &str, message: String) -> AppResult<()> {
        self.send_message(user_id, &message).await.map(|_| ())
    }
}
