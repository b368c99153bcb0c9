//! Intent catalogue and classification

pub mod classifier;
pub mod command;
mod rules;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use classifier::IntentClassifier;
pub use command::SlashCommand;
pub use rules::rule_based;

/// Confidence at or above which an intent is acted on directly
pub const HIGH_CONFIDENCE: f32 = 0.7;

/// Confidence below which an intent is not worth confirming
pub const CONFIRMATION_FLOOR: f32 = 0.4;

/// What the user wants to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserIntent {
    TaskCreate,
    TaskUpdate,
    TaskDelete,
    TaskQuery,
    TaskStatusChange,
    Idea,
    Note,
    ReminderCreate,
    ReminderQuery,
    PlanToday,
    PlanTomorrow,
    PlanWeek,
    Prioritize,
    Reschedule,
    WorkloadCheck,
    ExpenseLog,
    ExpenseAnalyze,
    DebtQuery,
    GymLog,
    GymQuery,
    NutritionLog,
    NutritionQuery,
    ProjectCreate,
    ProjectUpdate,
    ProjectDelete,
    ProjectQuery,
    StudySession,
    Greeting,
    Help,
    Status,
    Unknown,
}

impl UserIntent {
    /// Every intent, in catalogue order
    pub const ALL: [Self; 31] = [
        Self::TaskCreate,
        Self::TaskUpdate,
        Self::TaskDelete,
        Self::TaskQuery,
        Self::TaskStatusChange,
        Self::Idea,
        Self::Note,
        Self::ReminderCreate,
        Self::ReminderQuery,
        Self::PlanToday,
        Self::PlanTomorrow,
        Self::PlanWeek,
        Self::Prioritize,
        Self::Reschedule,
        Self::WorkloadCheck,
        Self::ExpenseLog,
        Self::ExpenseAnalyze,
        Self::DebtQuery,
        Self::GymLog,
        Self::GymQuery,
        Self::NutritionLog,
        Self::NutritionQuery,
        Self::ProjectCreate,
        Self::ProjectUpdate,
        Self::ProjectDelete,
        Self::ProjectQuery,
        Self::StudySession,
        Self::Greeting,
        Self::Help,
        Self::Status,
        Self::Unknown,
    ];

    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TaskCreate => "task_create",
            Self::TaskUpdate => "task_update",
            Self::TaskDelete => "task_delete",
            Self::TaskQuery => "task_query",
            Self::TaskStatusChange => "task_status_change",
            Self::Idea => "idea",
            Self::Note => "note",
            Self::ReminderCreate => "reminder_create",
            Self::ReminderQuery => "reminder_query",
            Self::PlanToday => "plan_today",
            Self::PlanTomorrow => "plan_tomorrow",
            Self::PlanWeek => "plan_week",
            Self::Prioritize => "prioritize",
            Self::Reschedule => "reschedule",
            Self::WorkloadCheck => "workload_check",
            Self::ExpenseLog => "expense_log",
            Self::ExpenseAnalyze => "expense_analyze",
            Self::DebtQuery => "debt_query",
            Self::GymLog => "gym_log",
            Self::GymQuery => "gym_query",
            Self::NutritionLog => "nutrition_log",
            Self::NutritionQuery => "nutrition_query",
            Self::ProjectCreate => "project_create",
            Self::ProjectUpdate => "project_update",
            Self::ProjectDelete => "project_delete",
            Self::ProjectQuery => "project_query",
            Self::StudySession => "study_session",
            Self::Greeting => "greeting",
            Self::Help => "help",
            Self::Status => "status",
            Self::Unknown => "unknown",
        }
    }

    /// One-line description used in the classification prompt
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::TaskCreate => "quiere crear/agregar una tarea o algo que hacer",
            Self::TaskUpdate => "quiere actualizar o modificar una tarea existente",
            Self::TaskDelete => "quiere eliminar, completar o marcar como hecha una tarea",
            Self::TaskQuery => "pregunta sobre sus tareas pendientes",
            Self::TaskStatusChange => "quiere mover una tarea a otro estado (en progreso, pausada, bloqueada)",
            Self::Idea => "tiene una idea que quiere guardar",
            Self::Note => "quiere guardar una nota o información",
            Self::ReminderCreate => "quiere crear un RECORDATORIO (ej: \"recuérdame X\")",
            Self::ReminderQuery => "pregunta sobre sus recordatorios",
            Self::PlanToday => "quiere planificar HOY (ej: \"qué hago hoy\", \"organiza mi día\")",
            Self::PlanTomorrow => "quiere planificar MAÑANA específicamente",
            Self::PlanWeek => "quiere ver o planificar su semana",
            Self::Prioritize => "necesita ayuda para priorizar entre tareas",
            Self::Reschedule => "quiere mover/reprogramar una tarea (ej: \"mueve X para mañana\")",
            Self::WorkloadCheck => "quiere revisar su carga de trabajo",
            Self::ExpenseLog => "quiere registrar un gasto que ya hizo",
            Self::ExpenseAnalyze => "menciona algo que QUIERE comprar (con precio $)",
            Self::DebtQuery => "pregunta sobre sus deudas",
            Self::GymLog => "quiere registrar su entrenamiento de hoy",
            Self::GymQuery => "pregunta sobre su historial de gym",
            Self::NutritionLog => "quiere registrar lo que comió",
            Self::NutritionQuery => "pregunta sobre su alimentación",
            Self::ProjectCreate => "quiere CREAR un nuevo proyecto",
            Self::ProjectUpdate => "quiere actualizar el avance o estado de un proyecto",
            Self::ProjectDelete => "quiere cerrar, cancelar o archivar un proyecto",
            Self::ProjectQuery => "pregunta sobre sus proyectos existentes",
            Self::StudySession => "quiere estudiar o hacer deep work",
            Self::Greeting => "es un saludo simple",
            Self::Help => "pide ayuda sobre el bot",
            Self::Status => "pregunta por el estado del sistema",
            Self::Unknown => "no encaja en ninguna categoría",
        }
    }

    /// Map a model or user supplied label onto the catalogue
    ///
    /// Accepts wire names, space separated variants and common aliases;
    /// anything else is `Unknown`.
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        let key = raw.trim().to_lowercase().replace([' ', '-'], "_");

        if let Some(intent) = Self::ALL.iter().find(|i| i.as_str() == key) {
            return *intent;
        }

        match key.as_str() {
            "create_task" | "nueva_tarea" => Self::TaskCreate,
            "nota" => Self::Note,
            "create_reminder" | "recordatorio" => Self::ReminderCreate,
            "compra" => Self::ExpenseAnalyze,
            "create_project" | "nuevo_proyecto" => Self::ProjectCreate,
            "planificar_manana" => Self::PlanTomorrow,
            "planificar_semana" => Self::PlanWeek,
            "priorizar" => Self::Prioritize,
            "reprogramar" => Self::Reschedule,
            "carga_trabajo" => Self::WorkloadCheck,
            "saludo" => Self::Greeting,
            "ayuda" => Self::Help,
            "estado" => Self::Status,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for UserIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying one message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentResult {
    pub intent: UserIntent,
    pub confidence: f32,
    pub entities: HashMap<String, String>,
    pub suggested_response: Option<String>,
    pub raw_message: String,
}

impl IntentResult {
    /// Result with no entities
    #[must_use]
    pub fn new(intent: UserIntent, confidence: f32, raw_message: impl Into<String>) -> Self {
        Self {
            intent,
            confidence: confidence.clamp(0.0, 1.0),
            entities: HashMap::new(),
            suggested_response: None,
            raw_message: raw_message.into(),
        }
    }

    /// Add an entity
    #[must_use]
    pub fn with_entity(mut self, key: &str, value: impl Into<String>) -> Self {
        self.entities.insert(key.to_string(), value.into());
        self
    }

    /// Replace the entity map
    #[must_use]
    pub fn with_entities(mut self, entities: HashMap<String, String>) -> Self {
        self.entities = entities;
        self
    }

    /// Attach a canned reply
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggested_response = Some(suggestion.into());
        self
    }

    /// Entity value, if present and non-empty
    #[must_use]
    pub fn entity(&self, key: &str) -> Option<&str> {
        self.entities
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    #[must_use]
    pub fn is_high_confidence(&self) -> bool {
        self.confidence >= HIGH_CONFIDENCE
    }

    #[must_use]
    pub fn needs_confirmation(&self) -> bool {
        (CONFIRMATION_FLOOR..HIGH_CONFIDENCE).contains(&self.confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_roundtrip_through_normalize() {
        for intent in UserIntent::ALL {
            assert_eq!(UserIntent::normalize(intent.as_str()), intent);
        }
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&UserIntent::TaskStatusChange).unwrap();
        assert_eq!(json, "\"task_status_change\"");
    }

    #[test]
    fn normalize_variants_and_aliases() {
        assert_eq!(UserIntent::normalize("Task Create"), UserIntent::TaskCreate);
        assert_eq!(UserIntent::normalize(" nueva_tarea "), UserIntent::TaskCreate);
        assert_eq!(UserIntent::normalize("nota"), UserIntent::Note);
        assert_eq!(UserIntent::normalize("compra"), UserIntent::ExpenseAnalyze);
        assert_eq!(UserIntent::normalize("carga_trabajo"), UserIntent::WorkloadCheck);
        assert_eq!(UserIntent::normalize("create_project"), UserIntent::ProjectCreate);
        assert_eq!(UserIntent::normalize("saludo"), UserIntent::Greeting);
        assert_eq!(UserIntent::normalize("dance"), UserIntent::Unknown);
        assert_eq!(UserIntent::normalize(""), UserIntent::Unknown);
    }

    #[test]
    fn confidence_bands() {
        let high = IntentResult::new(UserIntent::Greeting, 0.7, "hola");
        assert!(high.is_high_confidence());
        assert!(!high.needs_confirmation());

        let mid = IntentResult::new(UserIntent::TaskCreate, 0.4, "x");
        assert!(!mid.is_high_confidence());
        assert!(mid.needs_confirmation());

        let low = IntentResult::new(UserIntent::Unknown, 0.39, "x");
        assert!(!low.needs_confirmation());
    }

    #[test]
    fn confidence_is_clamped() {
        let clamped = IntentResult::new(UserIntent::Help, 3.0, "");
        assert!((clamped.confidence - 1.0).abs() < f32::EPSILON);
        assert!(IntentResult::new(UserIntent::Help, -1.0, "").confidence.abs() < f32::EPSILON);
    }

    #[test]
    fn blank_entities_are_absent() {
        let r = IntentResult::new(UserIntent::TaskCreate, 0.9, "x").with_entity("task", "  ");
        assert_eq!(r.entity("task"), None);
    }
}
