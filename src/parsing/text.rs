//! Keyword and pattern extraction from free text

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::db::{
    MealType, NutritionCategory, ProjectType, TaskPriority, TransactionCategory, WorkoutFeeling,
    WorkoutType,
};

const URGENT_KEYWORDS: &[&str] = &[
    "urgente",
    "crítico",
    "critico",
    "inmediato",
    "asap",
    "ya mismo",
    "cuanto antes",
    "emergencia",
];

const HIGH_KEYWORDS: &[&str] = &[
    "importante",
    "alta prioridad",
    "prioridad alta",
    "pronto",
    "lo antes posible",
];

const LOW_KEYWORDS: &[&str] = &[
    "baja prioridad",
    "prioridad baja",
    "cuando pueda",
    "sin prisa",
    "no urgente",
    "algún día",
    "algun dia",
];

static AMOUNT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\$\s*(\d[\d,]*(?:\.\d{1,2})?)",
        r"(\d[\d,]*(?:\.\d{1,2})?)\s*(?:pesos|mxn|usd|dólares|dolares|varos)\b",
        r"\bpor\s+(\d[\d,]*(?:\.\d{1,2})?)",
        r"\b(?:gast[eé]|pagu[eé]|cost[oó]|compr[eé])\D{0,20}?(\d[\d,]*(?:\.\d{1,2})?)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static THOUSANDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+(?:\.\d+)?)\s*k\b").expect("valid regex"));

static PROJECT_NAME: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?i)(?:crear|nuevo|iniciar)\s+proyecto\s*:?\s*["']?([^"',\-]+)["']?"#,
        r#"(?i)proyecto\s*:?\s*["']?([^"',\-]+)["']?"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,3})\s*(?:%|por\s*ciento)").expect("valid regex"));

const PROJECT_TYPE_KEYWORDS: &[(ProjectType, &[&str])] = &[
    (ProjectType::Work, &["trabajo", "work", "oficina"]),
    (ProjectType::Freelance, &["freelance", "cliente", "workana"]),
    (ProjectType::Learning, &["estudio", "aprender", "curso", "estudiar"]),
    (ProjectType::SideProject, &["side project", "hobby", "experimento"]),
    (ProjectType::Personal, &["personal", "casa", "propio"]),
];

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// Priority keywords, strongest first
#[must_use]
pub fn priority(text: &str) -> Option<TaskPriority> {
    let text = text.to_lowercase();
    if contains_any(&text, URGENT_KEYWORDS) {
        Some(TaskPriority::Urgent)
    } else if contains_any(&text, HIGH_KEYWORDS) {
        Some(TaskPriority::High)
    } else if contains_any(&text, LOW_KEYWORDS) {
        Some(TaskPriority::Low)
    } else {
        None
    }
}

/// Money amount such as `$3,000.50`, `3000 pesos` or `3k`
#[must_use]
pub fn amount(text: &str) -> Option<f64> {
    let text = text.to_lowercase();
    for pattern in AMOUNT_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(&text) {
            if let Ok(value) = caps[1].replace(',', "").parse::<f64>() {
                return Some(value);
            }
        }
    }
    THOUSANDS
        .captures(&text)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .map(|v| v * 1000.0)
}

/// `project_name` and `project_type` entities
#[must_use]
pub fn project_info(text: &str) -> HashMap<String, String> {
    let mut entities = HashMap::new();

    for pattern in PROJECT_NAME.iter() {
        if let Some(caps) = pattern.captures(text) {
            let name = caps[1].trim();
            if !name.is_empty() {
                entities.insert("project_name".to_string(), name.to_string());
                break;
            }
        }
    }

    let lower = text.to_lowercase();
    if let Some((kind, _)) = PROJECT_TYPE_KEYWORDS
        .iter()
        .find(|(_, keywords)| contains_any(&lower, keywords))
    {
        entities.insert("project_type".to_string(), kind.as_str().to_string());
    }

    entities
}

/// Percentage mentioned in the text, clamped to 100
#[must_use]
pub fn percent(text: &str) -> Option<u8> {
    PERCENT
        .captures(&text.to_lowercase())
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .map(|p| u8::try_from(p.min(100)).unwrap_or(100))
}

/// Training split named in the text
#[must_use]
pub fn workout_type(text: &str) -> Option<WorkoutType> {
    const TABLE: &[(WorkoutType, &[&str])] = &[
        (WorkoutType::FullBody, &["full body", "cuerpo completo", "fullbody"]),
        (
            WorkoutType::Legs,
            &["pierna", "legs", "sentadilla", "squat", "femoral", "glúteo", "gluteo"],
        ),
        (
            WorkoutType::Push,
            &["pecho", "push", "hombro", "tríceps", "triceps", "press banca", "banca"],
        ),
        (
            WorkoutType::Pull,
            &["espalda", "pull", "bíceps", "biceps", "dominadas", "remo", "jalón", "jalon"],
        ),
        (
            WorkoutType::Cardio,
            &["cardio", "correr", "corrí", "corri", "bici", "nadar", "caminar", "spinning"],
        ),
        (WorkoutType::Rest, &["descanso", "descansé", "descanse"]),
    ];

    let text = text.to_lowercase();
    TABLE
        .iter()
        .find(|(_, keywords)| contains_any(&text, keywords))
        .map(|(kind, _)| *kind)
}

/// How the session felt
#[must_use]
pub fn workout_feeling(text: &str) -> WorkoutFeeling {
    let text = text.to_lowercase();
    if contains_any(&text, &["dolor", "lesión", "lesion", "molestia", "me lastimé"]) {
        WorkoutFeeling::Pain
    } else if contains_any(
        &text,
        &["pesado", "cansado", "cansada", "difícil", "dificil", "agotado"],
    ) {
        WorkoutFeeling::Heavy
    } else if contains_any(
        &text,
        &["fuerte", "excelente", "increíble", "increible", "récord", "record", " pr"],
    ) {
        WorkoutFeeling::Strong
    } else {
        WorkoutFeeling::Normal
    }
}

/// Meal slot from keywords, else from the local hour
#[must_use]
pub fn meal_type(text: &str, hour: u32) -> MealType {
    let text = text.to_lowercase();
    if contains_any(&text, &["desayun", "breakfast"]) {
        MealType::Breakfast
    } else if contains_any(&text, &["cena", "cené", "cene", "dinner"]) {
        MealType::Dinner
    } else if contains_any(&text, &["snack", "botana", "colación", "colacion", "merienda"]) {
        MealType::Snack
    } else if contains_any(&text, &["almuerzo", "almorcé", "almorce", "lunch"]) {
        MealType::Lunch
    } else if hour < 11 {
        MealType::Breakfast
    } else if hour < 18 {
        MealType::Lunch
    } else {
        MealType::Dinner
    }
}

/// Rough healthiness of a meal description
#[must_use]
pub fn nutrition_category(text: &str) -> NutritionCategory {
    const HEAVY: &[&str] = &[
        "pizza",
        "hamburguesa",
        "tacos",
        "frit",
        "refresco",
        "pastel",
        "postre",
        "cerveza",
        "alcohol",
        "chatarra",
        "papas",
        "donas",
        "tamal",
    ];
    const HEALTHY: &[&str] = &[
        "ensalada",
        "pollo",
        "pescado",
        "verdura",
        "fruta",
        "avena",
        "huevo",
        "salmón",
        "salmon",
        "atún",
        "atun",
        "yogur",
        "integral",
    ];

    let text = text.to_lowercase();
    if contains_any(&text, HEAVY) {
        NutritionCategory::Heavy
    } else if contains_any(&text, HEALTHY) {
        NutritionCategory::Healthy
    } else {
        NutritionCategory::Moderate
    }
}

/// Spending category from keywords
#[must_use]
pub fn expense_category(text: &str) -> TransactionCategory {
    const TABLE: &[(TransactionCategory, &[&str])] = &[
        (
            TransactionCategory::Food,
            &[
                "comida", "restaurante", "tacos", "súper", "super", "café", "cafe", "uber eats",
                "rappi", "despensa", "cena", "desayuno",
            ],
        ),
        (
            TransactionCategory::Transport,
            &[
                "uber", "didi", "gasolina", "metro", "taxi", "camión", "camion",
                "estacionamiento", "caseta",
            ],
        ),
        (
            TransactionCategory::Entertainment,
            &["cine", "netflix", "spotify", "juego", "concierto", "fiesta", "bar"],
        ),
        (
            TransactionCategory::Services,
            &["luz", "agua", "internet", "teléfono", "telefono", "renta", "gas", "celular"],
        ),
        (
            TransactionCategory::Health,
            &["doctor", "farmacia", "medicina", "dentista", "consulta", "gimnasio", "gym"],
        ),
        (
            TransactionCategory::Education,
            &["curso", "libro", "udemy", "colegiatura", "platzi"],
        ),
        (
            TransactionCategory::DebtPayment,
            &["tarjeta", "deuda", "préstamo", "prestamo", "abono"],
        ),
        (
            TransactionCategory::Shopping,
            &["ropa", "amazon", "zapatos", "tenis", "mercado libre", "compra"],
        ),
    ];

    let text = text.to_lowercase();
    TABLE
        .iter()
        .find(|(_, keywords)| contains_any(&text, keywords))
        .map_or(TransactionCategory::Other, |(cat, _)| *cat)
}

/// Parse `key:value|key2:value2` entity strings
#[must_use]
pub fn parse_entities(raw: &str) -> HashMap<String, String> {
    let trimmed = raw.trim();
    if matches!(trimmed.to_lowercase().as_str(), "" | "none" | "null" | "vacío" | "n/a") {
        return HashMap::new();
    }

    trimmed
        .split('|')
        .filter_map(|pair| pair.split_once(':'))
        .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
        .filter(|(k, v)| !k.is_empty() && !v.is_empty())
        .collect()
}

/// Drop Markdown code fences around model output
#[must_use]
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip an optional language tag on the opening fence
    let rest = rest.split_once('\n').map_or(rest, |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_keywords() {
        assert_eq!(priority("Es URGENTE llamar"), Some(TaskPriority::Urgent));
        assert_eq!(priority("algo importante"), Some(TaskPriority::High));
        assert_eq!(priority("cuando pueda, sin prisa"), Some(TaskPriority::Low));
        assert_eq!(priority("revisar el informe"), None);
    }

    #[test]
    fn amounts() {
        assert_eq!(amount("unos audífonos de $3,000.50"), Some(3000.5));
        assert_eq!(amount("cuestan 3000 pesos"), Some(3000.0));
        assert_eq!(amount("gasté 250 en comida"), Some(250.0));
        assert_eq!(amount("una tele de 12k"), Some(12000.0));
        assert_eq!(amount("sin números"), None);
    }

    #[test]
    fn project_name_and_type() {
        let info = project_info("crear proyecto Portafolio web - personal");
        assert_eq!(info.get("project_name").map(String::as_str), Some("Portafolio web"));
        assert_eq!(info.get("project_type").map(String::as_str), Some("personal"));

        let info = project_info("nuevo proyecto: curso de Rust");
        assert_eq!(info.get("project_type").map(String::as_str), Some("learning"));
    }

    #[test]
    fn percentages() {
        assert_eq!(percent("voy al 40% del portafolio"), Some(40));
        assert_eq!(percent("250 %"), Some(100));
        assert_eq!(percent("nada"), None);
    }

    #[test]
    fn fitness_keywords() {
        assert_eq!(workout_type("hoy hice pierna"), Some(WorkoutType::Legs));
        assert_eq!(workout_type("pecho y tríceps"), Some(WorkoutType::Push));
        assert_eq!(workout_type("fui al gym"), None);
        assert_eq!(workout_feeling("me sentí muy fuerte"), WorkoutFeeling::Strong);
        assert_eq!(meal_type("desayuné avena", 14), MealType::Breakfast);
        assert_eq!(meal_type("pollo con arroz", 14), MealType::Lunch);
        assert_eq!(nutrition_category("pizza y refresco"), NutritionCategory::Heavy);
        assert_eq!(nutrition_category("ensalada de atún"), NutritionCategory::Healthy);
    }

    #[test]
    fn expense_categories() {
        assert_eq!(expense_category("uber eats pizza"), TransactionCategory::Food);
        assert_eq!(expense_category("uber al aeropuerto"), TransactionCategory::Transport);
        assert_eq!(expense_category("algo raro"), TransactionCategory::Other);
    }

    #[test]
    fn entity_strings() {
        let e = parse_entities("amount:3000|item: airpods |bad");
        assert_eq!(e.get("amount").map(String::as_str), Some("3000"));
        assert_eq!(e.get("item").map(String::as_str), Some("airpods"));
        assert_eq!(e.len(), 2);
        assert!(parse_entities("none").is_empty());
    }

    #[test]
    fn code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
    }
}
