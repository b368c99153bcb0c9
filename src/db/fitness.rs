//! Workout and nutrition logs

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Row, params};
use serde::{Deserialize, Serialize};

use super::{DbPool, conn, new_id, parse_datetime, timestamp};
use crate::cache::{CacheScope, QueryCache};
use crate::{Error, Result};

/// Training split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutType {
    Push,
    Pull,
    Legs,
    Cardio,
    Rest,
    FullBody,
}

impl WorkoutType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Pull => "pull",
            Self::Legs => "legs",
            Self::Cardio => "cardio",
            Self::Rest => "rest",
            Self::FullBody => "full_body",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Push => "Push (pecho/hombro/tríceps)",
            Self::Pull => "Pull (espalda/bíceps)",
            Self::Legs => "Pierna",
            Self::Cardio => "Cardio",
            Self::Rest => "Descanso",
            Self::FullBody => "Full body",
        }
    }
}

impl FromStr for WorkoutType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "push" => Ok(Self::Push),
            "pull" => Ok(Self::Pull),
            "legs" => Ok(Self::Legs),
            "cardio" => Ok(Self::Cardio),
            "rest" => Ok(Self::Rest),
            "full_body" => Ok(Self::FullBody),
            other => Err(Error::Validation(format!("unknown workout type: {other}"))),
        }
    }
}

/// How the session felt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutFeeling {
    Strong,
    #[default]
    Normal,
    Heavy,
    Pain,
}

impl WorkoutFeeling {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strong => "strong",
            Self::Normal => "normal",
            Self::Heavy => "heavy",
            Self::Pain => "pain",
        }
    }
}

impl FromStr for WorkoutFeeling {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "strong" => Ok(Self::Strong),
            "normal" => Ok(Self::Normal),
            "heavy" => Ok(Self::Heavy),
            "pain" => Ok(Self::Pain),
            other => Err(Error::Validation(format!("unknown workout feeling: {other}"))),
        }
    }
}

/// One exercise inside a workout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub name: String,
    #[serde(default)]
    pub sets: Option<u32>,
    #[serde(default)]
    pub reps: Option<u32>,
    /// Kilograms
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub is_pr: bool,
}

/// A logged workout
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkoutEntry {
    pub id: String,
    pub date: NaiveDate,
    pub workout_type: WorkoutType,
    pub feeling: WorkoutFeeling,
    pub exercises: Vec<Exercise>,
    pub duration_minutes: Option<u32>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WorkoutEntry {
    /// Sum of sets × reps × weight
    #[must_use]
    pub fn total_volume(&self) -> f64 {
        self.exercises
            .iter()
            .filter_map(|e| Some(f64::from(e.sets?) * f64::from(e.reps?) * e.weight?))
            .sum()
    }
}

/// Meal slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
            Self::Snack => "snack",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Breakfast => "Desayuno",
            Self::Lunch => "Comida",
            Self::Dinner => "Cena",
            Self::Snack => "Snack",
        }
    }
}

impl FromStr for MealType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "breakfast" => Ok(Self::Breakfast),
            "lunch" => Ok(Self::Lunch),
            "dinner" => Ok(Self::Dinner),
            "snack" => Ok(Self::Snack),
            other => Err(Error::Validation(format!("unknown meal type: {other}"))),
        }
    }
}

/// Rough healthiness of a meal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NutritionCategory {
    Healthy,
    #[default]
    Moderate,
    Heavy,
}

impl NutritionCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Moderate => "moderate",
            Self::Heavy => "heavy",
        }
    }

    #[must_use]
    pub const fn emoji(self) -> &'static str {
        match self {
            Self::Healthy => "🟢",
            Self::Moderate => "🟡",
            Self::Heavy => "🔴",
        }
    }
}

impl FromStr for NutritionCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "healthy" => Ok(Self::Healthy),
            "moderate" => Ok(Self::Moderate),
            "heavy" => Ok(Self::Heavy),
            other => Err(Error::Validation(format!("unknown nutrition category: {other}"))),
        }
    }
}

/// A logged meal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NutritionEntry {
    pub id: String,
    pub date: NaiveDate,
    pub meal_type: MealType,
    pub description: String,
    pub category: NutritionCategory,
    pub calories: Option<u32>,
    pub created_at: DateTime<Utc>,
}

fn parse_date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap_or_default()
}

fn row_to_workout(row: &Row<'_>) -> rusqlite::Result<WorkoutEntry> {
    let kind: String = row.get(2)?;
    let feeling: String = row.get(3)?;
    let exercises: String = row.get(4)?;
    Ok(WorkoutEntry {
        id: row.get(0)?,
        date: parse_date(&row.get::<_, String>(1)?),
        workout_type: kind.parse().unwrap_or(WorkoutType::FullBody),
        feeling: feeling.parse().unwrap_or_default(),
        exercises: serde_json::from_str(&exercises).unwrap_or_default(),
        duration_minutes: row.get(5)?,
        notes: row.get(6)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

fn row_to_meal(row: &Row<'_>) -> rusqlite::Result<NutritionEntry> {
    let meal: String = row.get(2)?;
    let category: String = row.get(4)?;
    Ok(NutritionEntry {
        id: row.get(0)?,
        date: parse_date(&row.get::<_, String>(1)?),
        meal_type: meal.parse().unwrap_or(MealType::Snack),
        description: row.get(3)?,
        category: category.parse().unwrap_or_default(),
        calories: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

/// Fitness repository
#[derive(Clone)]
pub struct FitnessRepo {
    pool: DbPool,
    cache: QueryCache,
}

impl FitnessRepo {
    /// Create a new fitness repository
    #[must_use]
    pub const fn new(pool: DbPool, cache: QueryCache) -> Self {
        Self { pool, cache }
    }

    /// Log a workout
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails
    pub fn log_workout(
        &self,
        date: NaiveDate,
        workout_type: WorkoutType,
        feeling: WorkoutFeeling,
        exercises: &[Exercise],
        notes: Option<&str>,
    ) -> Result<WorkoutEntry> {
        let entry = WorkoutEntry {
            id: new_id(),
            date,
            workout_type,
            feeling,
            exercises: exercises.to_vec(),
            duration_minutes: None,
            notes: notes.map(str::to_string),
            created_at: Utc::now(),
        };

        let conn = conn(&self.pool)?;
        conn.execute(
            "INSERT INTO workouts (id, date, workout_type, feeling, exercises, duration_minutes, \
             notes, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.id,
                date.to_string(),
                workout_type.as_str(),
                feeling.as_str(),
                serde_json::to_string(&entry.exercises)?,
                entry.duration_minutes,
                entry.notes,
                timestamp(&entry.created_at),
            ],
        )?;
        drop(conn);
        self.cache.invalidate(CacheScope::Fitness);
        Ok(entry)
    }

    /// Workouts on or after `since`, newest first
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn workouts_since(&self, since: NaiveDate) -> Result<Vec<WorkoutEntry>> {
        self.cache
            .get_or_load(CacheScope::Fitness, &format!("workouts|{since}"), || {
                let conn = conn(&self.pool)?;
                let mut stmt = conn.prepare(
                    "SELECT id, date, workout_type, feeling, exercises, duration_minutes, notes, \
                     created_at FROM workouts WHERE date >= ?1 ORDER BY date DESC, created_at DESC",
                )?;
                let entries = stmt
                    .query_map([since.to_string()], row_to_workout)?
                    .collect::<rusqlite::Result<_>>()?;
                Ok(entries)
            })
    }

    /// Whether any workout was logged on `date`
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn has_workout_on(&self, date: NaiveDate) -> Result<bool> {
        Ok(self
            .workouts_since(date)?
            .iter()
            .any(|w| w.date == date))
    }

    /// Log a meal
    ///
    /// # Errors
    ///
    /// Returns error if the description is empty or the insert fails
    pub fn log_meal(
        &self,
        date: NaiveDate,
        meal_type: MealType,
        description: &str,
        category: NutritionCategory,
        calories: Option<u32>,
    ) -> Result<NutritionEntry> {
        let description = description.trim();
        if description.is_empty() {
            return Err(Error::Validation("meal description is empty".to_string()));
        }

        let entry = NutritionEntry {
            id: new_id(),
            date,
            meal_type,
            description: description.to_string(),
            category,
            calories,
            created_at: Utc::now(),
        };

        let conn = conn(&self.pool)?;
        conn.execute(
            "INSERT INTO nutrition (id, date, meal_type, description, category, calories, \
             created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.id,
                date.to_string(),
                meal_type.as_str(),
                entry.description,
                category.as_str(),
                calories,
                timestamp(&entry.created_at),
            ],
        )?;
        drop(conn);
        self.cache.invalidate(CacheScope::Fitness);
        Ok(entry)
    }

    /// Meals on or after `since`, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn meals_since(&self, since: NaiveDate) -> Result<Vec<NutritionEntry>> {
        self.cache
            .get_or_load(CacheScope::Fitness, &format!("meals|{since}"), || {
                let conn = conn(&self.pool)?;
                let mut stmt = conn.prepare(
                    "SELECT id, date, meal_type, description, category, calories, created_at \
                     FROM nutrition WHERE date >= ?1 ORDER BY date, created_at",
                )?;
                let entries = stmt
                    .query_map([since.to_string()], row_to_meal)?
                    .collect::<rusqlite::Result<_>>()?;
                Ok(entries)
            })
    }

    /// Meals logged on exactly `date`
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn meals_on(&self, date: NaiveDate) -> Result<Vec<NutritionEntry>> {
        Ok(self
            .meals_since(date)?
            .into_iter()
            .filter(|m| m.date == date)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn repo() -> FitnessRepo {
        FitnessRepo::new(init_memory().unwrap(), QueryCache::default())
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, day).unwrap()
    }

    #[test]
    fn workout_roundtrip_keeps_exercises() {
        let repo = repo();
        let bench = Exercise {
            name: "press banca".to_string(),
            sets: Some(4),
            reps: Some(8),
            weight: Some(60.0),
            is_pr: true,
        };
        repo.log_workout(d(6), WorkoutType::Push, WorkoutFeeling::Strong, &[bench], None)
            .unwrap();

        let entries = repo.workouts_since(d(1)).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].exercises.len(), 1);
        assert!((entries[0].total_volume() - 1920.0).abs() < f64::EPSILON);
        assert!(repo.has_workout_on(d(6)).unwrap());
        assert!(!repo.has_workout_on(d(7)).unwrap());
    }

    #[test]
    fn meals_on_filters_by_day() {
        let repo = repo();
        repo.log_meal(d(6), MealType::Lunch, "ensalada", NutritionCategory::Healthy, None)
            .unwrap();
        repo.log_meal(d(7), MealType::Dinner, "pizza", NutritionCategory::Heavy, Some(900))
            .unwrap();

        assert_eq!(repo.meals_on(d(6)).unwrap().len(), 1);
        assert_eq!(repo.meals_since(d(6)).unwrap().len(), 2);
        assert_eq!(repo.meals_on(d(7)).unwrap()[0].calories, Some(900));
    }
}
