//! Message classification: explicit prefixes, then the LLM, then rules

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use serde_json::Value;

use super::{IntentResult, UserIntent, rule_based};
use crate::db::HistoryEntry;
use crate::llm::{CompletionRequest, LlmClient};
use crate::parsing::{TextParsing, parse_entities, strip_code_fences};
use crate::{Error, Result};

/// Confidence assigned to explicit prefixes
const PREFIX_CONFIDENCE: f32 = 0.95;

/// Prefix, intent and the entity key that receives the rest of the message
const PREFIXES: &[(&str, UserIntent, &str)] = &[
    ("crear tarea:", UserIntent::TaskCreate, "task"),
    ("nueva tarea:", UserIntent::TaskCreate, "task"),
    ("agregar tarea:", UserIntent::TaskCreate, "task"),
    ("tarea:", UserIntent::TaskCreate, "task"),
    ("idea:", UserIntent::Idea, "content"),
    ("nota:", UserIntent::Note, "content"),
    ("recordatorio:", UserIntent::ReminderCreate, "reminder"),
    ("recuérdame", UserIntent::ReminderCreate, "reminder"),
    ("recuerdame", UserIntent::ReminderCreate, "reminder"),
    ("crear proyecto:", UserIntent::ProjectCreate, "project_name"),
    ("proyecto:", UserIntent::ProjectCreate, "project_name"),
];

const SYSTEM_PROMPT: &str = "Eres el clasificador de intenciones de un asistente personal. \
Los mensajes están en español. Responde solo con JSON.";

/// Classifies free text into a [`UserIntent`]
#[derive(Clone)]
pub struct IntentClassifier {
    llm: Option<Arc<dyn LlmClient>>,
    parser: Arc<dyn TextParsing>,
}

impl IntentClassifier {
    /// Create a classifier; without an LLM only prefixes and rules are used
    #[must_use]
    pub fn new(llm: Option<Arc<dyn LlmClient>>, parser: Arc<dyn TextParsing>) -> Self {
        Self { llm, parser }
    }

    /// Whether an LLM is configured
    #[must_use]
    pub fn has_llm(&self) -> bool {
        self.llm.is_some()
    }

    /// Classify one message, optionally with recent conversation turns
    pub async fn classify(&self, message: &str, history: &[HistoryEntry]) -> IntentResult {
        if let Some(result) = explicit_prefix(message) {
            tracing::debug!(intent = %result.intent, "explicit prefix");
            return result;
        }

        let Some(llm) = &self.llm else {
            return rule_based(message, self.parser.as_ref());
        };

        let request =
            CompletionRequest::json(build_prompt(message, history)).with_system(SYSTEM_PROMPT);
        let raw = match llm.complete(&request).await {
            Ok(raw) => raw,
            Err(Error::MalformedLlmOutput(e)) => {
                tracing::warn!(error = %e, "classifier returned no usable text");
                return IntentResult::new(UserIntent::Unknown, 0.0, message);
            }
            Err(e) => {
                tracing::warn!(error = %e, "classifier unavailable, using rules");
                return rule_based(message, self.parser.as_ref());
            }
        };

        match parse_llm_output(&raw, message, self.parser.as_ref()) {
            Ok(result) => {
                tracing::info!(
                    intent = %result.intent,
                    confidence = result.confidence,
                    entities = result.entities.len(),
                    "message classified"
                );
                result
            }
            Err(e) => {
                tracing::warn!(error = %e, "unparsable classifier output");
                IntentResult::new(UserIntent::Unknown, 0.0, message)
            }
        }
    }
}

/// Match an explicit command prefix such as `crear tarea:`
#[must_use]
pub fn explicit_prefix(message: &str) -> Option<IntentResult> {
    let trimmed = message.trim();

    PREFIXES.iter().find_map(|(prefix, intent, key)| {
        let head = trimmed.get(..prefix.len())?;
        if head.to_lowercase() != *prefix {
            return None;
        }
        let rest = trimmed[prefix.len()..]
            .trim_start_matches([':', ','])
            .trim();
        if rest.is_empty() {
            return None;
        }
        Some(IntentResult::new(*intent, PREFIX_CONFIDENCE, message).with_entity(key, rest))
    })
}

/// Prompt listing the catalogue and the expected JSON shape
#[must_use]
pub fn build_prompt(message: &str, history: &[HistoryEntry]) -> String {
    let mut prompt = String::from("Clasifica la intención del usuario. Intenciones posibles:\n");
    for intent in UserIntent::ALL {
        let _ = writeln!(prompt, "- {}: {}", intent.as_str(), intent.description());
    }

    prompt.push_str(
        "\nResponde con un objeto JSON con las claves:\n\
         - intent: una de las intenciones anteriores\n\
         - confidence: número de 0.0 a 1.0\n\
         - entities: texto 'clave:valor|clave:valor' (ej: 'task:terminar reporte|date:mañana|priority:high', \
         'amount:3000|item:airpods', 'meal:desayuno|food:huevos'). Para tareas extrae priority \
         (urgent, high, normal, low) si se menciona. Vacío si no hay entidades.\n\
         - suggested_response: respuesta corta si la intención es simple (greeting, help), si no 'none'\n",
    );

    if !history.is_empty() {
        prompt.push_str("\nContexto reciente:\n");
        for turn in history {
            let _ = writeln!(prompt, "{}: {}", turn.role, turn.content);
        }
    }

    let _ = write!(prompt, "\nMensaje: {message}");
    prompt
}

fn confidence_of(value: Option<&Value>) -> f32 {
    #[allow(clippy::cast_possible_truncation)]
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64().map(|f| f as f32),
        Some(Value::String(s)) => s.trim().parse::<f32>().ok(),
        _ => None,
    };
    parsed.filter(|c| c.is_finite()).map_or(0.5, |c| c.clamp(0.0, 1.0))
}

fn entities_of(value: Option<&Value>) -> HashMap<String, String> {
    match value {
        Some(Value::String(s)) => parse_entities(s),
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s.trim().to_string(),
                    Value::Null => return None,
                    other => other.to_string(),
                };
                (!v.is_empty()).then(|| (k.trim().to_lowercase(), v))
            })
            .collect(),
        _ => HashMap::new(),
    }
}

/// Interpret the model's JSON answer
///
/// # Errors
///
/// Returns `Error::MalformedLlmOutput` if the text is not a JSON object
pub fn parse_llm_output(
    raw: &str,
    message: &str,
    parser: &dyn TextParsing,
) -> Result<IntentResult> {
    let body = strip_code_fences(raw);
    let value: Value = serde_json::from_str(body).map_err(|e| {
        let head: String = body.chars().take(120).collect();
        Error::MalformedLlmOutput(format!("{e}: {head}"))
    })?;
    let Value::Object(obj) = value else {
        return Err(Error::MalformedLlmOutput("expected a JSON object".to_string()));
    };

    let intent = obj
        .get("intent")
        .and_then(Value::as_str)
        .map_or(UserIntent::Unknown, UserIntent::normalize);

    let mut result = IntentResult::new(intent, confidence_of(obj.get("confidence")), message)
        .with_entities(entities_of(obj.get("entities")));

    if intent == UserIntent::TaskCreate && result.entity("priority").is_none() {
        if let Some(priority) = parser.priority(message) {
            result = result.with_entity("priority", priority.as_str());
        }
    }

    result.suggested_response = obj
        .get("suggested_response")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !matches!(s.to_lowercase().as_str(), "none" | "n/a" | "null"))
        .map(str::to_string);

    Ok(result)
}
