use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AssistantError, Result};

/// A quantified nutrient value. Fields are read-only so the confidence bound
/// checked in [`Estimate::new`] holds for every instance, decoded ones included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEstimate")]
pub struct Estimate {
    nutrient: String,
    estimate: f64,
    units: String,
    confidence: Option<f64>,
}

#[derive(Deserialize)]
struct RawEstimate {
    nutrient: String,
    estimate: f64,
    units: String,
    confidence: Option<f64>,
}

impl TryFrom<RawEstimate> for Estimate {
    type Error = AssistantError;

    fn try_from(raw: RawEstimate) -> Result<Self> {
        Estimate::new(raw.nutrient, raw.estimate, raw.units, raw.confidence)
    }
}

impl Estimate {
    /// Builds an estimate, rejecting confidence scores outside `0..=1`.
    pub fn new(
        nutrient: impl Into<String>,
        estimate: f64,
        units: impl Into<String>,
        confidence: Option<f64>,
    ) -> Result<Self> {
        let nutrient = nutrient.into();
        if let Some(c) = confidence {
            if !(0.0..=1.0).contains(&c) {
                return Err(AssistantError::Validation(format!(
                    "confidence {c} for {nutrient} is outside 0..=1"
                )));
            }
        }
        Ok(Self {
            nutrient,
            estimate,
            units: units.into(),
            confidence,
        })
    }

    pub fn nutrient(&self) -> &str {
        &self.nutrient
    }

    pub fn estimate(&self) -> f64 {
        self.estimate
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn confidence(&self) -> Option<f64> {
        self.confidence
    }
}

impl fmt::Display for Estimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.estimate, self.units)?;
        if let Some(c) = self.confidence {
            write!(f, " (confidence {c})")?;
        }
        Ok(())
    }
}

/// A single logged meal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub meal_id: String,
    /// UTC wall-clock time of estimation, `YYYY-MM-DD HH:MM:SS`.
    pub datetime: String,
    pub calories: Estimate,
    pub protein_g: Estimate,
    pub fat_g: Estimate,
    pub carbs_g: Estimate,
    pub micronutrients: Option<Vec<Estimate>>,
    pub notes: Option<String>,
    pub image_url: Option<String>,
}

/// The meals logged on one day, with macro totals computed once on construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyLog {
    date: String,
    entries: Vec<LogEntry>,
    calories: String,
    protein_g: String,
    fat_g: String,
    carbs_g: String,
}

impl DailyLog {
    pub fn new(date: impl Into<String>, entries: Vec<LogEntry>) -> Self {
        let calories = aggregate(&entries, |e| &e.calories);
        let protein_g = aggregate(&entries, |e| &e.protein_g);
        let fat_g = aggregate(&entries, |e| &e.fat_g);
        let carbs_g = aggregate(&entries, |e| &e.carbs_g);
        Self {
            date: date.into(),
            entries,
            calories,
            protein_g,
            fat_g,
            carbs_g,
        }
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn calories(&self) -> &str {
        &self.calories
    }

    pub fn protein_g(&self) -> &str {
        &self.protein_g
    }

    pub fn fat_g(&self) -> &str {
        &self.fat_g
    }

    pub fn carbs_g(&self) -> &str {
        &self.carbs_g
    }
}

// Totals are rounded to two decimals; `{}` drops the trailing zeros.
const TOTAL_SCALE: f64 = 100.0;

// The unit label always comes from the first entry, even when later entries
// were estimated in different units. Left as-is pending a product decision.
fn aggregate(entries: &[LogEntry], pick: impl Fn(&LogEntry) -> &Estimate) -> String {
    let sum: f64 = entries.iter().map(|e| pick(e).estimate).sum();
    let total = (sum * TOTAL_SCALE).round() / TOTAL_SCALE;
    match entries.first() {
        Some(first) => format!("{} {}", total, pick(first).units),
        None => format!("{total}"),
    }
}

impl fmt::Display for DailyLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Date: {}", self.date)?;
        writeln!(f, "Entries:")?;
        for e in &self.entries {
            write!(
                f,
                "  - {} at {}: calories {}, protein {}, fat {}, carbs {}",
                e.meal_id, e.datetime, e.calories, e.protein_g, e.fat_g, e.carbs_g
            )?;
            if let Some(micros) = &e.micronutrients {
                for m in micros {
                    write!(f, ", {} {}", m.nutrient, m)?;
                }
            }
            if let Some(notes) = &e.notes {
                write!(f, " (notes: {notes})")?;
            }
            writeln!(f)?;
        }
        writeln!(f, "Calories: {}", self.calories)?;
        writeln!(f, "Protein: {}", self.protein_g)?;
        writeln!(f, "Fat: {}", self.fat_g)?;
        write!(f, "Carbs: {}", self.carbs_g)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Active,
    Completed,
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlanStatus::Active => "active",
            PlanStatus::Completed => "completed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MicronutrientGoal {
    pub nutrient: String,
    pub goal: f64,
    pub units: String,
}

/// Daily targets a user is working toward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionPlanModel {
    pub start_date: String,
    pub end_date: String,
    pub status: PlanStatus,
    pub calories: u32,
    pub protein_g: u32,
    pub fat_g: u32,
    pub carbs_g: u32,
    pub micronutrient_goals: Vec<MicronutrientGoal>,
}

impl fmt::Display for NutritionPlanModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Start date: {}", self.start_date)?;
        writeln!(f, "End date: {}", self.end_date)?;
        writeln!(f, "Status: {}", self.status)?;
        writeln!(f, "Calories: {}", self.calories)?;
        writeln!(f, "Protein (g): {}", self.protein_g)?;
        writeln!(f, "Fat (g): {}", self.fat_g)?;
        writeln!(f, "Carbs (g): {}", self.carbs_g)?;
        write!(f, "Micronutrient goals:")?;
        for g in &self.micronutrient_goals {
            write!(f, "\n  - {}: {} {}", g.nutrient, g.goal, g.units)?;
        }
        Ok(())
    }
}

// --- user profile (input shape for plan generation) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Heavy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalCategory {
    Maintain,
    Lose,
    Gain,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub category: GoalCategory,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfileModel {
    pub name: String,
    pub age: u32,
    pub height: u32,
    pub weight: u32,
    pub sex: Sex,
    pub activity_level: ActivityLevel,
    pub goal: Goal,
}
