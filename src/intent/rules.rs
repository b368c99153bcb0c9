//! Keyword classification used when no LLM answer is available

use super::{IntentResult, UserIntent};
use crate::parsing::TextParsing;

const GREETING_WORDS: &[&str] = &["hola", "hey", "hi", "holi", "buenas", "buenos", "saludos"];
const GREETING_PHRASES: &[&str] = &["qué tal", "que tal", "buen día", "buen dia"];
const HELP_WORDS: &[&str] = &["ayuda", "help"];
const GYM_WORDS: &[&str] = &[
    "gym", "entreno", "entrené", "entrenamiento", "workout", "ejercicio", "pesas",
];
const FOOD_WORDS: &[&str] = &["comí", "desayuné", "almorcé", "cené", "comida", "desayuno", "cena"];
const PROJECT_WORDS: &[&str] = &["crear proyecto", "nuevo proyecto", "project", "iniciar proyecto"];
const TASK_WORDS: &[&str] = &[
    "tengo que",
    "debo",
    "necesito",
    "hacer",
    "terminar",
    "completar",
    "tarea",
];

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty())
}

fn has_word(text: &str, list: &[&str]) -> bool {
    words(text).any(|w| list.contains(&w))
}

fn has_phrase(text: &str, list: &[&str]) -> bool {
    list.iter().any(|p| text.contains(p))
}

/// Classify with keyword rules, strongest signal first
#[must_use]
pub fn rule_based(message: &str, parser: &dyn TextParsing) -> IntentResult {
    let text = message.trim().to_lowercase();

    if has_word(&text, GREETING_WORDS) || has_phrase(&text, GREETING_PHRASES) {
        return IntentResult::new(UserIntent::Greeting, 0.9, message)
            .with_suggestion("¡Hola! ¿En qué te puedo ayudar?");
    }

    if has_word(&text, HELP_WORDS) {
        return IntentResult::new(UserIntent::Help, 0.9, message);
    }

    if text.contains('$') || has_word(&text, &["pesos"]) {
        let mut result = IntentResult::new(UserIntent::ExpenseAnalyze, 0.8, message);
        if let Some(amount) = parser.amount(&text) {
            result = result.with_entity("amount", format!("{amount}"));
        }
        return result;
    }

    if has_phrase(&text, GYM_WORDS) {
        return IntentResult::new(UserIntent::GymLog, 0.7, message);
    }

    if has_phrase(&text, FOOD_WORDS) {
        return IntentResult::new(UserIntent::NutritionLog, 0.7, message);
    }

    if has_phrase(&text, PROJECT_WORDS) {
        return IntentResult::new(UserIntent::ProjectCreate, 0.8, message)
            .with_entities(parser.project_info(message));
    }

    if has_phrase(&text, TASK_WORDS) {
        let mut result = IntentResult::new(UserIntent::TaskCreate, 0.6, message);
        if let Some(priority) = parser.priority(&text) {
            result = result.with_entity("priority", priority.as_str());
        }
        return result;
    }

    IntentResult::new(UserIntent::Unknown, 0.3, message)
}
