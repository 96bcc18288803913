use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One registrant as delivered by the registrations API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawRecord")]
pub struct Record {
    pub id: Option<f64>,
    pub full_name: Option<String>,
    pub age: Option<f64>,
    pub gender: Option<String>,
    pub affiliation: Option<String>,
}

/// Wire shape; the affiliation has shipped under three column names.
#[derive(Deserialize)]
struct RawRecord {
    #[serde(rename = "Id", default, deserialize_with = "lenient_number")]
    id: Option<f64>,
    #[serde(rename = "Full Name", default, deserialize_with = "lenient_text")]
    full_name: Option<String>,
    #[serde(rename = "Age", default, deserialize_with = "lenient_number")]
    age: Option<f64>,
    #[serde(rename = "Gender", default, deserialize_with = "lenient_text")]
    gender: Option<String>,
    #[serde(
        rename = "Affiliation (College/Company/Organization Name)",
        default,
        deserialize_with = "lenient_text"
    )]
    affiliation_long: Option<String>,
    #[serde(rename = "Affiliation", default, deserialize_with = "lenient_text")]
    affiliation: Option<String>,
    #[serde(rename = "CollegeName", default, deserialize_with = "lenient_text")]
    college_name: Option<String>,
}

impl From<RawRecord> for Record {
    fn from(raw: RawRecord) -> Self {
        Self {
            id: raw.id,
            full_name: raw.full_name,
            age: raw.age,
            gender: raw.gender,
            affiliation: raw.affiliation_long.or(raw.affiliation).or(raw.college_name),
        }
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|f| f.is_finite()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Cohort {
    Cohort1,
    Cohort2,
}

impl Cohort {
    pub fn label(self) -> &'static str {
        match self {
            Cohort::Cohort1 => "cohort1",
            Cohort::Cohort2 => "cohort2",
        }
    }

    /// Whether a record id falls inside this cohort for the given threshold.
    pub fn contains(self, id: f64, threshold: i64) -> bool {
        let threshold = threshold as f64;
        match self {
            Cohort::Cohort1 => id <= threshold,
            Cohort::Cohort2 => id > threshold,
        }
    }
}

impl fmt::Display for Cohort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Cohort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cohort1" | "1" => Ok(Cohort::Cohort1),
            "cohort2" | "2" => Ok(Cohort::Cohort2),
            other => Err(format!("unknown cohort '{other}', expected cohort1 or cohort2")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InternType {
    Ai,
    TechLead,
}

impl InternType {
    pub fn label(self) -> &'static str {
        match self {
            InternType::Ai => "ai",
            InternType::TechLead => "techlead",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            InternType::Ai => "AI Developer Intern",
            InternType::TechLead => "Tech Lead Intern",
        }
    }
}

impl fmt::Display for InternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for InternType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ai" => Ok(InternType::Ai),
            "techlead" | "tech-lead" => Ok(InternType::TechLead),
            other => Err(format!("unknown intern type '{other}', expected ai or techlead")),
        }
    }
}

/// Id cutoffs separating cohort1 from cohort2, one per intern type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub ai: i64,
    pub techlead: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            ai: 25_000,
            techlead: 1_730,
        }
    }
}

impl Thresholds {
    pub fn for_type(&self, intern_type: InternType) -> i64 {
        match intern_type {
            InternType::Ai => self.ai,
            InternType::TechLead => self.techlead,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollegeAggregate {
    #[serde(rename = "CollegeName")]
    pub college_name: String,
    #[serde(rename = "TotalRegistrations")]
    pub total_registrations: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AgeGroup {
    #[serde(rename = "15-18")]
    From15To18,
    #[serde(rename = "19-21")]
    From18To21,
    #[serde(rename = "22-24")]
    From21To24,
    #[serde(rename = "25-27")]
    From24To27,
    #[serde(rename = "28-30")]
    From27To30,
    #[serde(rename = "30-above")]
    From30,
}

impl AgeGroup {
    /// Buckets in declaration order; lower bounds inclusive, upper exclusive.
    pub const ALL: [AgeGroup; 6] = [
        AgeGroup::From15To18,
        AgeGroup::From18To21,
        AgeGroup::From21To24,
        AgeGroup::From24To27,
        AgeGroup::From27To30,
        AgeGroup::From30,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AgeGroup::From15To18 => "15-18",
            AgeGroup::From18To21 => "19-21",
            AgeGroup::From21To24 => "22-24",
            AgeGroup::From24To27 => "25-27",
            AgeGroup::From27To30 => "28-30",
            AgeGroup::From30 => "30-above",
        }
    }

    pub fn lower_bound(self) -> f64 {
        match self {
            AgeGroup::From15To18 => 15.0,
            AgeGroup::From18To21 => 18.0,
            AgeGroup::From21To24 => 21.0,
            AgeGroup::From24To27 => 24.0,
            AgeGroup::From27To30 => 27.0,
            AgeGroup::From30 => 30.0,
        }
    }

    pub fn upper_bound(self) -> Option<f64> {
        match self {
            AgeGroup::From15To18 => Some(18.0),
            AgeGroup::From18To21 => Some(21.0),
            AgeGroup::From21To24 => Some(24.0),
            AgeGroup::From24To27 => Some(27.0),
            AgeGroup::From27To30 => Some(30.0),
            AgeGroup::From30 => None,
        }
    }

    /// Bucket for an age, or `None` below 15.
    pub fn for_age(age: f64) -> Option<AgeGroup> {
        AgeGroup::ALL.into_iter().find(|group| {
            age >= group.lower_bound() && group.upper_bound().map_or(true, |upper| age < upper)
        })
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgeGroupAggregate {
    #[serde(rename = "AgeGroup")]
    pub age_group: AgeGroup,
    #[serde(rename = "TotalStudents")]
    pub total_students: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenderAggregate {
    #[serde(rename = "Gender")]
    pub gender: String,
    #[serde(rename = "TotalStudents")]
    pub total_students: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregationResult {
    /// Full college aggregate, ranked by registrations descending.
    pub college_table: Vec<CollegeAggregate>,
    pub age_table: Vec<AgeGroupAggregate>,
    pub gender_table: Vec<GenderAggregate>,
    pub total_registrations: u64,
    pub total_colleges: u64,
}
