use std::fmt::Write;
use std::io;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{AggregationResult, Cohort, InternType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedRow<T> {
    pub rank: usize,
    pub row: T,
}

#[derive(Serialize)]
struct RankedCollegeRecord<'a> {
    rank: usize,
    #[serde(rename = "CollegeName")]
    college_name: &'a str,
    #[serde(rename = "TotalRegistrations")]
    total_registrations: u64,
}

/// Numbers rows for display, starting at 1.
pub fn rank_rows<T: Clone>(rows: &[T]) -> Vec<RankedRow<T>> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| RankedRow {
            rank: index + 1,
            row: row.clone(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartPoint {
    pub category: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowLink {
    pub source: String,
    pub target: String,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchyNode {
    pub id: String,
    pub parent: Option<String>,
    pub value: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewKind {
    #[default]
    Tabular,
    Sankey,
    Sunburst,
}

impl FromStr for ViewKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tabular" | "table" => Ok(ViewKind::Tabular),
            "sankey" => Ok(ViewKind::Sankey),
            "sunburst" => Ok(ViewKind::Sunburst),
            other => Err(format!(
                "unknown view '{other}', expected tabular, sankey or sunburst"
            )),
        }
    }
}

/// Data handed to an external chart renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum ChartData {
    Tabular {
        colleges: Vec<ChartPoint>,
        ages: Vec<ChartPoint>,
        genders: Vec<ChartPoint>,
    },
    Sankey {
        links: Vec<FlowLink>,
    },
    Sunburst {
        nodes: Vec<HierarchyNode>,
    },
}

pub fn college_series(result: &AggregationResult, top_n: usize) -> Vec<ChartPoint> {
    result
        .top_colleges(top_n)
        .iter()
        .map(|row| ChartPoint {
            category: row.college_name.clone(),
            count: row.total_registrations,
        })
        .collect()
}

pub fn age_series(result: &AggregationResult) -> Vec<ChartPoint> {
    result
        .age_table
        .iter()
        .map(|row| ChartPoint {
            category: row.age_group.label().to_string(),
            count: row.total_students,
        })
        .collect()
}

pub fn gender_series(result: &AggregationResult) -> Vec<ChartPoint> {
    result
        .gender_table
        .iter()
        .map(|row| ChartPoint {
            category: row.gender.clone(),
            count: row.total_students,
        })
        .collect()
}

pub fn chart_data(
    result: &AggregationResult,
    view: ViewKind,
    cohort: Cohort,
    top_n: usize,
) -> ChartData {
    let root = cohort.label().to_uppercase();
    match view {
        ViewKind::Tabular => ChartData::Tabular {
            colleges: college_series(result, top_n),
            ages: age_series(result),
            genders: gender_series(result),
        },
        ViewKind::Sankey => ChartData::Sankey {
            links: college_series(result, top_n)
                .into_iter()
                .map(|point| FlowLink {
                    source: root.clone(),
                    target: point.category,
                    value: point.count,
                })
                .collect(),
        },
        ViewKind::Sunburst => {
            let children = college_series(result, top_n);
            let total = children.iter().map(|point| point.count).sum();
            let mut nodes = vec![HierarchyNode {
                id: root.clone(),
                parent: None,
                value: total,
            }];
            nodes.extend(children.into_iter().map(|point| HierarchyNode {
                id: point.category,
                parent: Some(root.clone()),
                value: point.count,
            }));
            ChartData::Sunburst { nodes }
        }
    }
}

/// `1234567` -> `1,234,567`
pub fn thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut output = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            output.push(',');
        }
        output.push(ch);
    }
    output
}

pub fn summary_text(result: &AggregationResult, top_n: usize) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "Total Registrations: {}", thousands(result.total_registrations));
    let _ = writeln!(output, "Number of Colleges: {}", result.total_colleges);
    let _ = writeln!(output);
    let _ = writeln!(output, "Top colleges:");
    if result.college_table.is_empty() {
        let _ = writeln!(output, "  No registrations for this selection.");
    }
    for ranked in rank_rows(result.top_colleges(top_n)) {
        let _ = writeln!(
            output,
            "{:>4}. {} ({})",
            ranked.rank, ranked.row.college_name, ranked.row.total_registrations
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "Registrations by age:");
    for row in &result.age_table {
        let _ = writeln!(output, "  {:<9} {}", row.age_group.label(), row.total_students);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "Registrations by gender:");
    for row in &result.gender_table {
        let _ = writeln!(output, "  {:<9} {}", row.gender, row.total_students);
    }

    output
}

pub fn search_text(result: &AggregationResult, query: &str) -> String {
    let matches: Vec<_> = result.search_colleges(query).into_iter().cloned().collect();
    let mut output = String::new();

    if !query.is_empty() {
        let _ = writeln!(output, "Found {} matching colleges", matches.len());
    }
    for ranked in rank_rows(&matches) {
        let _ = writeln!(
            output,
            "{:>4}. {} ({})",
            ranked.rank, ranked.row.college_name, ranked.row.total_registrations
        );
    }

    output
}

pub fn build_report(
    result: &AggregationResult,
    cohort: Cohort,
    intern_type: InternType,
    top_n: usize,
    generated_at: DateTime<Utc>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Intern Registrations Report");
    let _ = writeln!(
        output,
        "Generated for {} / {} at {}",
        intern_type.display_name(),
        cohort.label().to_uppercase(),
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "- Total registrations: {}",
        thousands(result.total_registrations)
    );
    let _ = writeln!(output, "- Number of colleges: {}", result.total_colleges);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Registrations by College");
    if result.college_table.is_empty() {
        let _ = writeln!(output, "No registrations for this selection.");
    } else {
        let _ = writeln!(output, "| # | College | Registrations |");
        let _ = writeln!(output, "|---|---------|---------------|");
        for ranked in rank_rows(result.top_colleges(top_n)) {
            let _ = writeln!(
                output,
                "| {} | {} | {} |",
                ranked.rank,
                ranked.row.college_name.replace('|', "\\|"),
                ranked.row.total_registrations
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Registrations by Age");
    if result.age_table.is_empty() {
        let _ = writeln!(output, "No age data for this selection.");
    } else {
        let _ = writeln!(output, "| Age Group | Students |");
        let _ = writeln!(output, "|-----------|----------|");
        for row in &result.age_table {
            let _ = writeln!(output, "| {} | {} |", row.age_group.label(), row.total_students);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Registrations by Gender");
    if result.gender_table.is_empty() {
        let _ = writeln!(output, "No gender data for this selection.");
    } else {
        let _ = writeln!(output, "| Gender | Students |");
        let _ = writeln!(output, "|--------|----------|");
        for row in &result.gender_table {
            let _ = writeln!(output, "| {} | {} |", row.gender, row.total_students);
        }
    }

    output
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Colleges,
    Ages,
    Genders,
}

impl FromStr for Table {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "colleges" | "college" => Ok(Table::Colleges),
            "ages" | "age" => Ok(Table::Ages),
            "genders" | "gender" => Ok(Table::Genders),
            other => Err(format!(
                "unknown table '{other}', expected colleges, ages or genders"
            )),
        }
    }
}

pub fn write_csv<W: io::Write>(
    result: &AggregationResult,
    table: Table,
    writer: W,
) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    match table {
        Table::Colleges => {
            for ranked in rank_rows(&result.college_table) {
                writer.serialize(RankedCollegeRecord {
                    rank: ranked.rank,
                    college_name: &ranked.row.college_name,
                    total_registrations: ranked.row.total_registrations,
                })?;
            }
        }
        Table::Ages => {
            for row in &result.age_table {
                writer.serialize(row)?;
            }
        }
        Table::Genders => {
            for row in &result.gender_table {
                writer.serialize(row)?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}
