use teloxide::utils::command::BotCommands;

use crate::services::notifications::NotificationService;
use crate::AppState;

use std::sync::Arc;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(
    rename_rule = "lowercase",
    description = "Get notified when a court frees up at your usual time.\n\
                   Patterns look like \"Wed 16:00\" or \"Wed 16:00 2\" (weekday, start, hours)."
)]
pub enum Command {
    #[command(description = "show this text")]
    Help,
    #[command(description = "show this text")]
    Start,
    #[command(description = "watch a weekly time, e.g. /subscribe Wed 16:00 2")]
    Subscribe(String),
    #[command(description = "stop watching a time, e.g. /unsubscribe Wed 16:00 2")]
    Unsubscribe(String),
    #[command(description = "list your subscriptions")]
    List,
    #[command(description = "delete all your subscriptions and history")]
    Clear,
    #[command(description = "show courts that are free right now")]
    Check,
}

/// Run `cmd` on behalf of `user_id` and return the reply text.
pub async fn execute(state: &Arc<AppState>, user_id: &str, cmd: Command) -> String {
    match cmd {
        Command::Help | Command::Start => Command::descriptions().to_string(),
        Command::Subscribe(pattern) => match state.store.subscribe(user_id, &pattern).await {
            Ok(subscription) => format!("noted: {}", subscription),
            Err(e) => e.user_message(),
        },
        Command::Unsubscribe(pattern) => match state.store.unsubscribe(user_id, &pattern).await {
            Ok(subscription) => format!("removed: {}", subscription),
            Err(e) => e.user_message(),
        },
        Command::List => {
            let listing = state.store.list_subscriptions(user_id).await;
            if listing.is_empty() {
                "no subscriptions".to_string()
            } else {
                listing
            }
        }
        Command::Clear => match state.store.delete_user(user_id).await {
            Ok(()) => "all your data has been deleted".to_string(),
            Err(e) => e.user_message(),
        },
        Command::Check => match NotificationService::new(state).current_calendar().await {
            Ok(calendar) if calendar.non_empty().is_empty() => "no free courts".to_string(),
            Ok(calendar) => calendar.render(),
            Err(e) => e.user_message(),
        },
    }
}
