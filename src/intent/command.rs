//! Slash commands that bypass classification

use super::{IntentResult, UserIntent};

/// A recognised bot command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlashCommand {
    Start,
    Help,
    Status,
    Today,
    Week,
    Cancel,
    Inbox,
}

impl SlashCommand {
    /// Parse `/name`, `/name@bot` or `/name args`
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let head = text.trim().strip_prefix('/')?.split_whitespace().next()?;
        let name = head.split('@').next().unwrap_or(head).to_lowercase();

        match name.as_str() {
            "start" => Some(Self::Start),
            "help" | "ayuda" => Some(Self::Help),
            "status" => Some(Self::Status),
            "today" | "hoy" => Some(Self::Today),
            "week" | "semana" => Some(Self::Week),
            "cancel" | "cancelar" => Some(Self::Cancel),
            "inbox" => Some(Self::Inbox),
            _ => None,
        }
    }

    /// Intent the command stands for; `None` for commands handled directly
    #[must_use]
    pub const fn intent(self) -> Option<UserIntent> {
        match self {
            Self::Start => Some(UserIntent::Greeting),
            Self::Help => Some(UserIntent::Help),
            Self::Status => Some(UserIntent::Status),
            Self::Today => Some(UserIntent::TaskQuery),
            Self::Week => Some(UserIntent::PlanWeek),
            Self::Cancel | Self::Inbox => None,
        }
    }

    /// Full-confidence classification for an intent-backed command
    #[must_use]
    pub fn as_result(self, raw: &str) -> Option<IntentResult> {
        self.intent().map(|intent| IntentResult::new(intent, 1.0, raw))
    }
}
