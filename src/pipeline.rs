use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::{
    AgeGroup, AgeGroupAggregate, AggregationResult, CollegeAggregate, Cohort, GenderAggregate,
    InternType, Record, Thresholds,
};

pub const MIN_TOP_N: usize = 5;
pub const MAX_TOP_N: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    /// Cohort or intern type has not been chosen yet.
    SelectionRequired,
    Ready(AggregationResult),
}

/// Record after cohort filtering and field cleanup.
#[derive(Debug, Clone, PartialEq)]
struct CleanRecord {
    id: f64,
    age: Option<f64>,
    gender: Option<String>,
    college: Option<String>,
}

/// Entry point for callers holding possibly-unset selectors.
pub fn aggregate(
    records: &[Record],
    cohort: Option<Cohort>,
    intern_type: Option<InternType>,
    thresholds: &Thresholds,
) -> Aggregation {
    match (cohort, intern_type) {
        (Some(cohort), Some(intern_type)) => {
            Aggregation::Ready(aggregate_selection(records, cohort, intern_type, thresholds))
        }
        _ => Aggregation::SelectionRequired,
    }
}

pub fn aggregate_selection(
    records: &[Record],
    cohort: Cohort,
    intern_type: InternType,
    thresholds: &Thresholds,
) -> AggregationResult {
    let threshold = thresholds.for_type(intern_type);
    let cleaned: Vec<CleanRecord> = records
        .iter()
        .filter_map(|record| {
            let id = record.id?;
            cohort.contains(id, threshold).then(|| clean(id, record))
        })
        .collect();

    let college_table = college_table(&cleaned);
    let total_registrations = college_table.iter().map(|row| row.total_registrations).sum();
    let total_colleges = college_table.len() as u64;

    AggregationResult {
        college_table,
        age_table: age_table(&cleaned),
        gender_table: gender_table(&cleaned),
        total_registrations,
        total_colleges,
    }
}

/// Trims and normalizes; a blank value stays as its own empty group.
fn clean(id: f64, record: &Record) -> CleanRecord {
    CleanRecord {
        id,
        age: record.age,
        gender: record.gender.as_deref().map(str::trim).map(title_case),
        college: record.affiliation.as_deref().map(str::trim).map(str::to_string),
    }
}

/// Uppercases the first letter of every alphabetic run and lowercases the rest.
pub fn title_case(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    let mut previous_alpha = false;
    for ch in value.chars() {
        if ch.is_alphabetic() {
            if previous_alpha {
                output.extend(ch.to_lowercase());
            } else {
                output.extend(ch.to_uppercase());
            }
            previous_alpha = true;
        } else {
            output.push(ch);
            previous_alpha = false;
        }
    }
    output
}

fn college_table(records: &[CleanRecord]) -> Vec<CollegeAggregate> {
    // Ids keyed by bit pattern; they are finite numbers from the decoder.
    let mut groups: BTreeMap<&str, HashSet<u64>> = BTreeMap::new();
    for record in records {
        if let Some(college) = record.college.as_deref() {
            groups.entry(college).or_default().insert(record.id.to_bits());
        }
    }

    let mut rows: Vec<CollegeAggregate> = groups
        .into_iter()
        .map(|(college_name, ids)| CollegeAggregate {
            college_name: college_name.to_string(),
            total_registrations: ids.len() as u64,
        })
        .collect();

    // Stable sort keeps name order between equal counts.
    rows.sort_by(|a, b| b.total_registrations.cmp(&a.total_registrations));
    rows
}

fn age_table(records: &[CleanRecord]) -> Vec<AgeGroupAggregate> {
    let mut counts: HashMap<AgeGroup, u64> = HashMap::new();
    for group in records.iter().filter_map(|r| r.age).filter_map(AgeGroup::for_age) {
        *counts.entry(group).or_insert(0) += 1;
    }

    if records.is_empty() {
        return Vec::new();
    }

    AgeGroup::ALL
        .into_iter()
        .map(|age_group| AgeGroupAggregate {
            age_group,
            total_students: counts.get(&age_group).copied().unwrap_or(0),
        })
        .collect()
}

fn gender_table(records: &[CleanRecord]) -> Vec<GenderAggregate> {
    let mut rows: Vec<GenderAggregate> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for gender in records.iter().filter_map(|r| r.gender.as_deref()) {
        match index.get(gender) {
            Some(&position) => rows[position].total_students += 1,
            None => {
                index.insert(gender, rows.len());
                rows.push(GenderAggregate {
                    gender: gender.to_string(),
                    total_students: 1,
                });
            }
        }
    }

    rows
}

pub fn clamp_top_n(n: usize) -> usize {
    n.clamp(MIN_TOP_N, MAX_TOP_N)
}

impl AggregationResult {
    /// Highest-ranked colleges; `n` is clamped to the supported range first.
    pub fn top_colleges(&self, n: usize) -> &[CollegeAggregate] {
        let n = clamp_top_n(n).min(self.college_table.len());
        &self.college_table[..n]
    }

    /// Full ranked list narrowed by a case-insensitive substring match.
    /// The query is used as typed, surrounding whitespace included.
    pub fn search_colleges(&self, query: &str) -> Vec<&CollegeAggregate> {
        let needle = query.to_lowercase();
        self.college_table
            .iter()
            .filter(|row| needle.is_empty() || row.college_name.to_lowercase().contains(&needle))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: Option<i64>, age: Option<f64>, gender: &str, college: &str) -> Record {
        Record {
            id: id.map(|id| id as f64),
            full_name: Some("Test Student".to_string()),
            age,
            gender: Some(gender.to_string()),
            affiliation: Some(college.to_string()),
        }
    }

    fn ready(result: Aggregation) -> AggregationResult {
        match result {
            Aggregation::Ready(result) => result,
            Aggregation::SelectionRequired => panic!("expected an aggregation"),
        }
    }

    #[test]
    fn two_mit_students_in_ai_cohort1() {
        let records = vec![
            record(Some(100), Some(20.0), " male ", " MIT "),
            record(Some(200), Some(26.0), "Female", "MIT"),
        ];
        let result = ready(aggregate(
            &records,
            Some(Cohort::Cohort1),
            Some(InternType::Ai),
            &Thresholds::default(),
        ));

        assert_eq!(
            result.college_table,
            vec![CollegeAggregate {
                college_name: "MIT".to_string(),
                total_registrations: 2,
            }]
        );
        assert_eq!(result.total_registrations, 2);
        assert_eq!(result.total_colleges, 1);

        let ages: Vec<(&str, u64)> = result
            .age_table
            .iter()
            .map(|row| (row.age_group.label(), row.total_students))
            .collect();
        assert_eq!(
            ages,
            vec![
                ("15-18", 0),
                ("19-21", 1),
                ("22-24", 0),
                ("25-27", 1),
                ("28-30", 0),
                ("30-above", 0),
            ]
        );

        let genders: Vec<(&str, u64)> = result
            .gender_table
            .iter()
            .map(|row| (row.gender.as_str(), row.total_students))
            .collect();
        assert_eq!(genders, vec![("Male", 1), ("Female", 1)]);
    }

    #[test]
    fn missing_selection_is_not_an_error() {
        let records = vec![record(Some(1), Some(20.0), "Male", "MIT")];
        let thresholds = Thresholds::default();
        assert_eq!(
            aggregate(&records, Some(Cohort::Cohort1), None, &thresholds),
            Aggregation::SelectionRequired
        );
        assert_eq!(
            aggregate(&records, None, Some(InternType::Ai), &thresholds),
            Aggregation::SelectionRequired
        );
    }

    #[test]
    fn cohorts_partition_valid_ids_by_type_threshold() {
        let records = vec![
            record(Some(1_730), None, "Male", "A"),
            record(Some(1_731), None, "Male", "B"),
            record(Some(25_000), None, "Male", "C"),
            record(Some(25_001), None, "Male", "D"),
            record(None, None, "Male", "E"),
        ];
        let thresholds = Thresholds::default();

        for intern_type in [InternType::Ai, InternType::TechLead] {
            let first = aggregate_selection(&records, Cohort::Cohort1, intern_type, &thresholds);
            let second = aggregate_selection(&records, Cohort::Cohort2, intern_type, &thresholds);
            let mut names: Vec<String> = first
                .college_table
                .iter()
                .chain(second.college_table.iter())
                .map(|row| row.college_name.clone())
                .collect();
            names.sort();
            assert_eq!(names, vec!["A", "B", "C", "D"]);
            assert_eq!(first.total_registrations + second.total_registrations, 4);
        }

        let techlead = aggregate_selection(&records, Cohort::Cohort1, InternType::TechLead, &thresholds);
        assert_eq!(techlead.total_registrations, 1);
        let ai = aggregate_selection(&records, Cohort::Cohort1, InternType::Ai, &thresholds);
        assert_eq!(ai.total_registrations, 3);
    }

    #[test]
    fn records_without_id_are_dropped_everywhere() {
        let records = vec![
            record(None, Some(20.0), "Male", "MIT"),
            record(Some(5), Some(22.0), "female", "IIT"),
        ];
        let result =
            aggregate_selection(&records, Cohort::Cohort1, InternType::Ai, &Thresholds::default());
        assert_eq!(result.total_registrations, 1);
        assert_eq!(result.college_table[0].college_name, "IIT");
        assert_eq!(result.gender_table.len(), 1);
        let aged: u64 = result.age_table.iter().map(|row| row.total_students).sum();
        assert_eq!(aged, 1);
    }

    #[test]
    fn empty_input_yields_empty_tables() {
        let result =
            aggregate_selection(&[], Cohort::Cohort2, InternType::TechLead, &Thresholds::default());
        assert!(result.college_table.is_empty());
        assert!(result.age_table.is_empty());
        assert!(result.gender_table.is_empty());
        assert_eq!(result.total_registrations, 0);
        assert_eq!(result.total_colleges, 0);
        assert_eq!(result, AggregationResult::default());
    }

    #[test]
    fn missing_age_only_affects_age_table() {
        let records = vec![
            record(Some(1), None, "Male", "MIT"),
            record(Some(2), Some(12.0), "Male", "MIT"),
            record(Some(3), Some(45.0), "Male", "MIT"),
        ];
        let result =
            aggregate_selection(&records, Cohort::Cohort1, InternType::Ai, &Thresholds::default());
        assert_eq!(result.total_registrations, 3);
        assert_eq!(result.gender_table[0].total_students, 3);
        let aged: u64 = result.age_table.iter().map(|row| row.total_students).sum();
        assert_eq!(aged, 1);
        assert_eq!(result.age_table[5].total_students, 1);
    }

    #[test]
    fn names_collapse_after_normalization() {
        let records = vec![
            record(Some(1), None, "MALE", "  SRM University"),
            record(Some(2), None, " male", "SRM University  "),
            record(Some(3), None, "non-binary", "VIT"),
        ];
        let result =
            aggregate_selection(&records, Cohort::Cohort1, InternType::Ai, &Thresholds::default());
        assert_eq!(result.total_colleges, 2);
        assert_eq!(result.college_table[0].college_name, "SRM University");
        assert_eq!(result.college_table[0].total_registrations, 2);
        assert_eq!(result.gender_table[0].gender, "Male");
        assert_eq!(result.gender_table[0].total_students, 2);
        assert_eq!(result.gender_table[1].gender, "Non-Binary");
    }

    #[test]
    fn colleges_rank_by_count_then_name() {
        let mut records = Vec::new();
        let mut id = 0;
        for (college, count) in [("Zeta", 2), ("Alpha", 1), ("Beta", 3), ("Gamma", 2)] {
            for _ in 0..count {
                id += 1;
                records.push(record(Some(id), None, "Male", college));
            }
        }
        let result =
            aggregate_selection(&records, Cohort::Cohort1, InternType::Ai, &Thresholds::default());
        let order: Vec<&str> = result
            .college_table
            .iter()
            .map(|row| row.college_name.as_str())
            .collect();
        assert_eq!(order, vec!["Beta", "Gamma", "Zeta", "Alpha"]);
        let sum: u64 = result.college_table.iter().map(|r| r.total_registrations).sum();
        assert_eq!(sum, result.total_registrations);
    }

    #[test]
    fn top_colleges_is_a_clamped_prefix() {
        let records: Vec<Record> = (1..=60)
            .map(|id| record(Some(id), None, "Male", &format!("College {id:02}")))
            .collect();
        let result =
            aggregate_selection(&records, Cohort::Cohort1, InternType::Ai, &Thresholds::default());

        assert_eq!(result.top_colleges(10), &result.college_table[..10]);
        assert_eq!(result.top_colleges(1).len(), MIN_TOP_N);
        assert_eq!(result.top_colleges(500).len(), MAX_TOP_N);

        let small = aggregate_selection(
            &records[..3],
            Cohort::Cohort1,
            InternType::Ai,
            &Thresholds::default(),
        );
        assert_eq!(small.top_colleges(10).len(), 3);
    }

    #[test]
    fn search_is_case_insensitive_subset() {
        let records = vec![
            record(Some(1), None, "Male", "NIT Trichy"),
            record(Some(2), None, "Male", "IIT Bombay"),
            record(Some(3), None, "Male", "Anits"),
        ];
        let result =
            aggregate_selection(&records, Cohort::Cohort1, InternType::Ai, &Thresholds::default());

        let hits: Vec<&str> = result
            .search_colleges("nit")
            .into_iter()
            .map(|row| row.college_name.as_str())
            .collect();
        assert_eq!(hits, vec!["Anits", "NIT Trichy"]);
        assert_eq!(result.search_colleges("").len(), 3);
        assert!(result.search_colleges("harvard").is_empty());
    }

    #[test]
    fn search_keeps_surrounding_whitespace() {
        let records = vec![
            record(Some(1), None, "Male", "NIT Trichy"),
            record(Some(2), None, "Male", "IIT Bombay"),
            record(Some(3), None, "Male", "Anits"),
        ];
        let result =
            aggregate_selection(&records, Cohort::Cohort1, InternType::Ai, &Thresholds::default());

        let hits: Vec<&str> = result
            .search_colleges(" trichy")
            .into_iter()
            .map(|row| row.college_name.as_str())
            .collect();
        assert_eq!(hits, vec!["NIT Trichy"]);
        assert!(result.search_colleges(" iit").is_empty());
        assert!(result.search_colleges("   ").is_empty());
    }

    #[test]
    fn blank_college_and_gender_form_their_own_group() {
        let records = vec![
            record(Some(1), Some(20.0), "Male", "MIT"),
            record(Some(2), Some(21.0), "  ", "   "),
        ];
        let result =
            aggregate_selection(&records, Cohort::Cohort1, InternType::Ai, &Thresholds::default());

        assert_eq!(result.total_registrations, 2);
        assert_eq!(result.total_colleges, 2);
        assert!(result
            .college_table
            .iter()
            .any(|row| row.college_name.is_empty() && row.total_registrations == 1));
        let genders: Vec<(&str, u64)> = result
            .gender_table
            .iter()
            .map(|row| (row.gender.as_str(), row.total_students))
            .collect();
        assert_eq!(genders, vec![("Male", 1), ("", 1)]);
        let aged: u64 = result.age_table.iter().map(|row| row.total_students).sum();
        assert_eq!(aged, result.total_registrations);
    }

    #[test]
    fn fractional_ids_are_filtered_and_counted() {
        let mut records = vec![
            record(None, None, "Male", "MIT"),
            record(None, None, "Male", "MIT"),
            record(None, None, "Male", "IIT"),
        ];
        records[0].id = Some(12.5);
        records[1].id = Some(12.75);
        records[2].id = Some(1_730.5);

        let first =
            aggregate_selection(&records, Cohort::Cohort1, InternType::TechLead, &Thresholds::default());
        assert_eq!(first.total_registrations, 2);
        assert_eq!(first.college_table[0].college_name, "MIT");
        assert_eq!(first.college_table[0].total_registrations, 2);

        let second =
            aggregate_selection(&records, Cohort::Cohort2, InternType::TechLead, &Thresholds::default());
        assert_eq!(second.total_registrations, 1);
        assert_eq!(second.college_table[0].college_name, "IIT");
    }

    #[test]
    fn duplicate_ids_count_once_per_college() {
        let records = vec![
            record(Some(9), None, "Male", "MIT"),
            record(Some(9), None, "Male", "MIT"),
        ];
        let result =
            aggregate_selection(&records, Cohort::Cohort1, InternType::Ai, &Thresholds::default());
        assert_eq!(result.total_registrations, 1);
    }

    #[test]
    fn title_case_matches_word_boundaries() {
        assert_eq!(title_case("fEMALE"), "Female");
        assert_eq!(title_case("prefer not to say"), "Prefer Not To Say");
        assert_eq!(title_case("non-binary"), "Non-Binary");
    }
}
