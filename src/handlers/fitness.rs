//! Gym and nutrition handlers

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::Duration;
use regex::Regex;
use serde_json::json;

use super::{HandlerContext, HandlerResponse, IntentHandler, Services, quote, short_date, subject};
use crate::conversation::ConversationState;
use crate::db::fitness::Exercise;
use crate::db::{MealType, NutritionCategory, WorkoutFeeling, WorkoutType};
use crate::intent::{IntentResult, UserIntent};
use crate::Result;

/// Sessions per week considered on track
pub(crate) const WEEKLY_TARGET: usize = 4;

/// How far back a lift counts when checking for a personal record
const PR_WINDOW_DAYS: i64 = 90;

const WORKOUT_PROMPT: &str = "🏋️ ¿Qué entrenaste hoy?\n\nEjemplos:\n• \"pierna, sentadilla 4x8 100kg\"\n• \"pecho y tríceps\"\n• \"cardio 30 min\"\n\nEscribe /cancel para cancelar.";

/// `sentadilla 4x8 100kg`
static EXERCISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)([a-záéíóúñü][a-záéíóúñü ]*?)\s+(\d{1,2})\s*x\s*(\d{1,3})(?:\s*(?:@|con|de)?\s*(\d+(?:\.\d+)?)\s*kg)?",
    )
    .expect("valid regex")
});

const MEAL_FILLER: [&str; 18] = [
    "desayuno", "desayuné", "desayune", "comida", "comí", "comi", "almuerzo", "almorcé", "cena",
    "cené", "cene", "snack", "registrar", "registra", "mi", "la", "el", "hoy",
];

const fn feeling_emoji(feeling: WorkoutFeeling) -> &'static str {
    match feeling {
        WorkoutFeeling::Strong => "💪",
        WorkoutFeeling::Normal => "👍",
        WorkoutFeeling::Heavy => "😮‍💨",
        WorkoutFeeling::Pain => "🤕",
    }
}

/// Exercises written as `name SETSxREPS [WEIGHTkg]`, split on commas or lines
fn parse_exercises(text: &str) -> Vec<Exercise> {
    text.split([',', '\n', ';'])
        .filter_map(|part| {
            let caps = EXERCISE.captures(part.trim())?;
            Some(Exercise {
                name: caps[1].trim().to_lowercase(),
                sets: caps[2].parse().ok(),
                reps: caps[3].parse().ok(),
                weight: caps.get(4).and_then(|w| w.as_str().parse().ok()),
                is_pr: false,
            })
        })
        .collect()
}

/// Mark lifts heavier than anything in the recent history
fn mark_records(
    services: &Services,
    ctx: &HandlerContext,
    exercises: &mut [Exercise],
) -> Result<()> {
    let since = ctx.today() - Duration::days(PR_WINDOW_DAYS);
    let mut best: HashMap<String, f64> = HashMap::new();
    for workout in services.fitness.workouts_since(since)? {
        for e in workout.exercises {
            if let Some(w) = e.weight {
                let entry = best.entry(e.name).or_insert(0.0);
                *entry = entry.max(w);
            }
        }
    }

    for e in exercises.iter_mut() {
        if let (Some(w), Some(previous)) = (e.weight, best.get(&e.name)) {
            e.is_pr = w > *previous;
        }
    }
    Ok(())
}

/// Log a workout described in free text
///
/// Keeps asking while no workout type can be read from the text.
///
/// # Errors
///
/// Returns error if the workout cannot be stored
pub(crate) async fn log_workout(
    services: &Services,
    ctx: &HandlerContext,
    text: &str,
) -> Result<HandlerResponse> {
    let Some(kind) = services.parser.workout_type(text) else {
        return Ok(HandlerResponse::failure(WORKOUT_PROMPT)
            .with_state(ConversationState::AwaitingWorkoutDetails));
    };
    let feeling = services.parser.workout_feeling(text);
    let mut exercises = parse_exercises(text);
    mark_records(services, ctx, &mut exercises)?;

    let entry = services.fitness.log_workout(
        ctx.today(),
        kind,
        feeling,
        &exercises,
        Some(text.trim()),
    )?;
    tracing::info!(workout_id = %entry.id, kind = kind.as_str(), "workout logged");

    let mut message = format!(
        "🏋️ <b>Entrenamiento registrado</b>\n\n{} {}\n",
        feeling_emoji(feeling),
        kind.label()
    );
    for e in &entry.exercises {
        let _ = write!(message, "• {}", quote(&e.name, 40));
        if let (Some(sets), Some(reps)) = (e.sets, e.reps) {
            let _ = write!(message, " {sets}x{reps}");
        }
        if let Some(w) = e.weight {
            let _ = write!(message, " {w}kg");
        }
        if e.is_pr {
            message.push_str(" 🏆 PR");
        }
        message.push('\n');
    }
    let volume = entry.total_volume();
    if volume > 0.0 {
        let _ = writeln!(message, "\n📦 Volumen: {volume:.0} kg");
    }
    if feeling == WorkoutFeeling::Pain {
        message.push_str("\n⚠️ Si el dolor sigue, descansa esa zona.");
    }

    Ok(HandlerResponse::new(message)
        .with_data(json!({
            "workout_id": entry.id,
            "workout_type": kind,
            "records": entry.exercises.iter().filter(|e| e.is_pr).count(),
        }))
        .with_state(ConversationState::Idle))
}

/// Log a meal in a known slot
///
/// # Errors
///
/// Returns error if the description is empty or the insert fails
pub(crate) async fn log_meal(
    services: &Services,
    ctx: &HandlerContext,
    meal: MealType,
    description: &str,
) -> Result<HandlerResponse> {
    let category = services.parser.nutrition_category(description);
    let entry = services
        .fitness
        .log_meal(ctx.today(), meal, description, category, None)?;
    let today = services.fitness.meals_on(ctx.today())?;
    tracing::info!(meal_id = %entry.id, meal = meal.as_str(), "meal logged");

    let mut message = format!(
        "🍽️ <b>{} registrado</b>\n\n{} <i>{}</i>\n\nComidas de hoy: {}",
        meal.label(),
        category.emoji(),
        quote(&entry.description, 100),
        today.len()
    );
    if category == NutritionCategory::Heavy {
        message.push_str("\n\n💧 Compénsalo con agua y algo ligero en la próxima comida.");
    }

    Ok(HandlerResponse::new(message)
        .with_data(json!({ "meal_id": entry.id, "category": category }))
        .with_state(ConversationState::Idle))
}

/// Message names a meal but says nothing about what was eaten
fn is_bare_meal(text: &str) -> bool {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphabetic()).to_lowercase())
        .filter(|w| !w.is_empty())
        .all(|w| MEAL_FILLER.contains(&w.as_str()))
}

pub struct GymLogHandler;

#[async_trait]
impl IntentHandler for GymLogHandler {
    fn name(&self) -> &'static str {
        "gym_log"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::GymLog
    }

    async fn handle(
        &self,
        services: &Services,
        ctx: &HandlerContext,
        result: &IntentResult,
    ) -> Result<HandlerResponse> {
        let text = match result.entity("workout_type") {
            Some(kind) => format!("{kind} {}", result.raw_message),
            None => result.raw_message.clone(),
        };
        log_workout(services, ctx, &text).await
    }
}

pub struct GymQueryHandler;

#[async_trait]
impl IntentHandler for GymQueryHandler {
    fn name(&self) -> &'static str {
        "gym_query"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::GymQuery
    }

    async fn handle(
        &self,
        services: &Services,
        ctx: &HandlerContext,
        _result: &IntentResult,
    ) -> Result<HandlerResponse> {
        let week = services
            .fitness
            .workouts_since(ctx.today() - Duration::days(6))?;
        let sessions: Vec<_> = week
            .iter()
            .filter(|w| w.workout_type != WorkoutType::Rest)
            .collect();

        let mut message = format!(
            "🏋️ <b>Gym esta semana</b>\n\nSesiones: {}/{WEEKLY_TARGET}\n\n",
            sessions.len()
        );
        if sessions.is_empty() {
            message.push_str("No has registrado entrenamientos en los últimos 7 días.");
        }
        for w in &sessions {
            let _ = writeln!(
                message,
                "• {} {} {}",
                short_date(w.date),
                w.workout_type.label(),
                feeling_emoji(w.feeling)
            );
        }
        if sessions.len() >= WEEKLY_TARGET {
            message.push_str("\n🔥 ¡Vas en meta!");
        }

        Ok(HandlerResponse::new(message).with_data(json!({
            "sessions": sessions.len(),
            "target": WEEKLY_TARGET,
        })))
    }
}

pub struct NutritionLogHandler;

#[async_trait]
impl IntentHandler for NutritionLogHandler {
    fn name(&self) -> &'static str {
        "nutrition_log"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::NutritionLog
    }

    async fn handle(
        &self,
        services: &Services,
        ctx: &HandlerContext,
        result: &IntentResult,
    ) -> Result<HandlerResponse> {
        let meal = result
            .entity("meal_type")
            .and_then(|m| m.parse().ok())
            .unwrap_or_else(|| services.parser.meal_type(&result.raw_message, ctx.hour()));
        let description = subject(result, "food");

        if is_bare_meal(&description) {
            return Ok(HandlerResponse::failure(format!(
                "🍽️ ¿Qué comiste de {}?\n\nEscribe /cancel para cancelar.",
                meal.label().to_lowercase()
            ))
            .with_state(ConversationState::AwaitingNutritionDetails { meal }));
        }
        log_meal(services, ctx, meal, &description).await
    }
}

pub struct NutritionQueryHandler;

#[async_trait]
impl IntentHandler for NutritionQueryHandler {
    fn name(&self) -> &'static str {
        "nutrition_query"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::NutritionQuery
    }

    async fn handle(
        &self,
        services: &Services,
        ctx: &HandlerContext,
        _result: &IntentResult,
    ) -> Result<HandlerResponse> {
        let today = services.fitness.meals_on(ctx.today())?;
        let week = services
            .fitness
            .meals_since(ctx.today() - Duration::days(6))?;

        let mut message = String::from("🍽️ <b>Alimentación</b>\n\n<b>Hoy</b>\n");
        if today.is_empty() {
            message.push_str("Sin comidas registradas.\n");
        }
        for meal in &today {
            let _ = writeln!(
                message,
                "{} {}: <i>{}</i>",
                meal.category.emoji(),
                meal.meal_type.label(),
                quote(&meal.description, 50)
            );
        }

        let count = |c: NutritionCategory| week.iter().filter(|m| m.category == c).count();
        let (healthy, moderate, heavy) = (
            count(NutritionCategory::Healthy),
            count(NutritionCategory::Moderate),
            count(NutritionCategory::Heavy),
        );
        let _ = write!(
            message,
            "\n<b>Últimos 7 días</b> ({} comidas)\n🟢 {healthy} · 🟡 {moderate} · 🔴 {heavy}",
            week.len()
        );

        Ok(HandlerResponse::new(message).with_data(json!({
            "today": today.len(),
            "week": week.len(),
            "healthy": healthy,
            "heavy": heavy,
        })))
    }
}
