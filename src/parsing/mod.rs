//! Text parsing shared by the classifier, handlers and jobs
//!
//! Handlers depend on the [`TextParsing`] trait rather than on the helper
//! functions, so tests can swap in a fixed parser.

pub mod text;
pub mod time;

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDate};

use crate::db::{
    MealType, NutritionCategory, TaskPriority, TransactionCategory, WorkoutFeeling, WorkoutType,
};

pub use text::{parse_entities, strip_code_fences};

/// Parsing capability injected into handlers
pub trait TextParsing: Send + Sync {
    /// Priority implied by keywords
    fn priority(&self, text: &str) -> Option<TaskPriority>;

    /// Money amount
    fn amount(&self, text: &str) -> Option<f64>;

    /// `project_name` / `project_type` entities
    fn project_info(&self, text: &str) -> HashMap<String, String>;

    /// Point in time relative to `now`
    fn when(&self, text: &str, now: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>>;

    /// Calendar date relative to `today`
    fn due_date(&self, text: &str, today: NaiveDate) -> Option<NaiveDate>;

    /// Text with the time phrases understood by [`TextParsing::when`] removed
    fn strip_when(&self, text: &str) -> String {
        time::strip_when(text)
    }

    /// Percentage, clamped to 100
    fn percent(&self, text: &str) -> Option<u8>;

    /// Training split
    fn workout_type(&self, text: &str) -> Option<WorkoutType>;

    /// How a workout felt
    fn workout_feeling(&self, text: &str) -> WorkoutFeeling;

    /// Meal slot, falling back to the local hour
    fn meal_type(&self, text: &str, hour: u32) -> MealType;

    /// Healthiness of a meal
    fn nutrition_category(&self, text: &str) -> NutritionCategory;

    /// Spending category
    fn expense_category(&self, text: &str) -> TransactionCategory;
}

/// Keyword and regex based parser
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleParser;

impl TextParsing for RuleParser {
    fn priority(&self, text: &str) -> Option<TaskPriority> {
        text::priority(text)
    }

    fn amount(&self, text: &str) -> Option<f64> {
        text::amount(text)
    }

    fn project_info(&self, text: &str) -> HashMap<String, String> {
        text::project_info(text)
    }

    fn when(&self, text: &str, now: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
        time::when(text, now)
    }

    fn due_date(&self, text: &str, today: NaiveDate) -> Option<NaiveDate> {
        time::due_date(text, today)
    }

    fn percent(&self, text: &str) -> Option<u8> {
        text::percent(text)
    }

    fn workout_type(&self, text: &str) -> Option<WorkoutType> {
        text::workout_type(text)
    }

    fn workout_feeling(&self, text: &str) -> WorkoutFeeling {
        text::workout_feeling(text)
    }

    fn meal_type(&self, text: &str, hour: u32) -> MealType {
        text::meal_type(text, hour)
    }

    fn nutrition_category(&self, text: &str) -> NutritionCategory {
        text::nutrition_category(text)
    }

    fn expense_category(&self, text: &str) -> TransactionCategory {
        text::expense_category(text)
    }
}
