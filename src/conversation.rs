//! Per-chat conversation state
//!
//! A chat is either idle or waiting for one specific follow-up. The state is
//! persisted between messages and expires after [`STATE_TTL_MINUTES`].

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{MealType, TaskPriority};

/// Minutes after which a pending state is treated as idle
pub const STATE_TTL_MINUTES: i64 = 30;

/// What the bot is waiting for in a chat
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Idle,
    /// Reminder text captured, time still missing
    AwaitingReminderTime { text: String },
    /// Gym log started without a workout type
    AwaitingWorkoutDetails,
    /// Task draft waiting for confirm/discard (usually a suspected duplicate)
    AwaitingTaskConfirmation {
        title: String,
        priority: TaskPriority,
        due_date: Option<NaiveDate>,
        duplicate_of: Option<String>,
    },
    /// Meal slot known, description missing
    AwaitingNutritionDetails { meal: MealType },
}

/// Input that moves the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event<'a> {
    /// Plain text from the user
    Message(&'a str),
    /// `/cancel`
    Cancel,
    /// `task_confirm` button
    Confirm,
    /// `task_discard` button
    Discard,
}

/// Work the caller must perform after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Run the normal classification pipeline on the text
    Classify(String),
    /// Schedule `text` at the time described by `when`
    ScheduleReminder { text: String, when: String },
    /// Log a workout from the description
    LogWorkout(String),
    /// Log a meal in a known slot
    LogMeal { meal: MealType, description: String },
    /// Create the drafted task
    CreateTask {
        title: String,
        priority: TaskPriority,
        due_date: Option<NaiveDate>,
    },
    /// Drop the drafted task
    DiscardTask { title: String },
    /// A pending flow was cancelled (`false` when nothing was pending)
    Cancelled(bool),
    /// Button press for a flow that is no longer pending
    Expired,
}

impl ConversationState {
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Short name for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingReminderTime { .. } => "awaiting_reminder_time",
            Self::AwaitingWorkoutDetails => "awaiting_workout_details",
            Self::AwaitingTaskConfirmation { .. } => "awaiting_task_confirmation",
            Self::AwaitingNutritionDetails { .. } => "awaiting_nutrition_details",
        }
    }

    /// The state to act on, given when it was stored
    #[must_use]
    pub fn resume(self, updated_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if is_stale(updated_at, now) {
            tracing::debug!(state = self.name(), "conversation state expired");
            Self::Idle
        } else {
            self
        }
    }

    /// Apply an event, returning the next state and what to do
    #[must_use]
    pub fn next(self, event: Event<'_>) -> (Self, Action) {
        match (self, event) {
            (state, Event::Cancel) => (Self::Idle, Action::Cancelled(!state.is_idle())),

            (Self::AwaitingReminderTime { text }, Event::Message(msg)) => (
                Self::Idle,
                Action::ScheduleReminder {
                    text,
                    when: msg.to_string(),
                },
            ),

            (Self::AwaitingWorkoutDetails, Event::Message(msg)) => {
                (Self::Idle, Action::LogWorkout(msg.to_string()))
            }

            (Self::AwaitingNutritionDetails { meal }, Event::Message(msg)) => (
                Self::Idle,
                Action::LogMeal {
                    meal,
                    description: msg.to_string(),
                },
            ),

            (
                Self::AwaitingTaskConfirmation {
                    title,
                    priority,
                    due_date,
                    ..
                },
                Event::Confirm,
            ) => (
                Self::Idle,
                Action::CreateTask {
                    title,
                    priority,
                    due_date,
                },
            ),

            (Self::AwaitingTaskConfirmation { title, .. }, Event::Discard) => {
                (Self::Idle, Action::DiscardTask { title })
            }

            // A new message abandons an unanswered confirmation
            (Self::Idle | Self::AwaitingTaskConfirmation { .. }, Event::Message(msg)) => {
                (Self::Idle, Action::Classify(msg.to_string()))
            }

            (state, Event::Confirm | Event::Discard) => (state, Action::Expired),
        }
    }
}

/// Whether a state stored at `updated_at` has expired
#[must_use]
pub fn is_stale(updated_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - updated_at > Duration::minutes(STATE_TTL_MINUTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> ConversationState {
        ConversationState::AwaitingTaskConfirmation {
            title: "comprar leche".to_string(),
            priority: TaskPriority::High,
            due_date: None,
            duplicate_of: Some("t1".to_string()),
        }
    }

    #[test]
    fn idle_message_is_classified() {
        let (state, action) = ConversationState::Idle.next(Event::Message("hola"));
        assert!(state.is_idle());
        assert_eq!(action, Action::Classify("hola".to_string()));
    }

    #[test]
    fn cancel_from_any_state() {
        for state in [
            draft(),
            ConversationState::AwaitingWorkoutDetails,
            ConversationState::AwaitingReminderTime { text: "x".into() },
        ] {
            let (next, action) = state.next(Event::Cancel);
            assert!(next.is_idle());
            assert_eq!(action, Action::Cancelled(true));
        }

        let (_, action) = ConversationState::Idle.next(Event::Cancel);
        assert_eq!(action, Action::Cancelled(false));
    }

    #[test]
    fn reminder_time_follow_up() {
        let state = ConversationState::AwaitingReminderTime {
            text: "llamar a mamá".into(),
        };
        let (next, action) = state.next(Event::Message("en 2 horas"));
        assert!(next.is_idle());
        assert_eq!(
            action,
            Action::ScheduleReminder {
                text: "llamar a mamá".into(),
                when: "en 2 horas".into()
            }
        );
    }

    #[test]
    fn confirm_and_discard() {
        let (_, action) = draft().next(Event::Confirm);
        let Action::CreateTask { title, priority, .. } = action else {
            panic!("expected CreateTask");
        };
        assert_eq!(title, "comprar leche");
        assert_eq!(priority, TaskPriority::High);

        let (_, action) = draft().next(Event::Discard);
        assert_eq!(action, Action::DiscardTask { title: "comprar leche".into() });
    }

    #[test]
    fn buttons_without_pending_draft_expire() {
        let (state, action) = ConversationState::AwaitingWorkoutDetails.next(Event::Confirm);
        assert_eq!(state, ConversationState::AwaitingWorkoutDetails);
        assert_eq!(action, Action::Expired);
    }

    #[test]
    fn new_message_abandons_draft() {
        let (state, action) = draft().next(Event::Message("qué tengo hoy"));
        assert!(state.is_idle());
        assert!(matches!(action, Action::Classify(_)));
    }

    #[test]
    fn stale_states_resume_as_idle() {
        let now = Utc::now();
        let fresh = draft().resume(now - Duration::minutes(29), now);
        assert!(!fresh.is_idle());
        let stale = draft().resume(now - Duration::minutes(31), now);
        assert!(stale.is_idle());
    }

    #[test]
    fn serde_is_tagged() {
        let json = serde_json::to_value(ConversationState::AwaitingNutritionDetails {
            meal: MealType::Dinner,
        })
        .unwrap();
        assert_eq!(json["state"], "awaiting_nutrition_details");
        assert_eq!(json["meal"], "dinner");

        let back: ConversationState = serde_json::from_value(json).unwrap();
        assert_eq!(back, ConversationState::AwaitingNutritionDetails { meal: MealType::Dinner });
    }
}
