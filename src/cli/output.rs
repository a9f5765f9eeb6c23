//! Output formatting for `kprop` commands.
//!
//! Supports two modes: human-readable tables (default) and JSON (`--output json`).

use clap::ValueEnum;
use serde::Serialize;
use tabled::{Table, Tabled};

use crate::domain::{EnsembleResult, PredictionResult};
use crate::features::FeatureSchema;

/// Output mode for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputMode {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Tabled, Serialize)]
pub struct PredictionRow {
    #[tabled(rename = "Subject")]
    pub subject: String,
    #[tabled(rename = "Model")]
    pub model: String,
    #[tabled(rename = "Pred")]
    pub predicted: String,
    #[tabled(rename = "Line")]
    pub line: String,
    #[tabled(rename = "Edge")]
    pub edge: String,
    #[tabled(rename = "Conf")]
    pub confidence: String,
    #[tabled(rename = "Rec")]
    pub recommendation: String,
    #[tabled(rename = "Flags")]
    pub flags: String,
}

impl From<&PredictionResult> for PredictionRow {
    fn from(r: &PredictionResult) -> Self {
        Self {
            subject: r.subject_id.clone(),
            model: r.model_version.clone(),
            predicted: fmt_opt(r.predicted_value, 2),
            line: fmt_opt(r.line, 1),
            edge: fmt_signed(r.edge),
            confidence: format!("{:.1}", r.confidence),
            recommendation: r.recommendation.to_string(),
            flags: note_column(&r.red_flags, r.error.as_deref()),
        }
    }
}

#[derive(Debug, Tabled, Serialize)]
pub struct EnsembleRow {
    #[tabled(rename = "Subject")]
    pub subject: String,
    #[tabled(rename = "Pred")]
    pub predicted: String,
    #[tabled(rename = "Line")]
    pub line: String,
    #[tabled(rename = "Edge")]
    pub edge: String,
    #[tabled(rename = "Conf")]
    pub confidence: String,
    #[tabled(rename = "Agreement")]
    pub agreement: String,
    #[tabled(rename = "Rec")]
    pub recommendation: String,
    #[tabled(rename = "Notes")]
    pub notes: String,
}

impl From<&EnsembleResult> for EnsembleRow {
    fn from(r: &EnsembleResult) -> Self {
        let mut notes = r.red_flags.clone();
        notes.extend(r.notes.iter().cloned());
        Self {
            subject: r.subject_id.clone(),
            predicted: fmt_opt(r.predicted_value, 2),
            line: fmt_opt(r.line, 1),
            edge: fmt_signed(r.edge),
            confidence: format!("{:.1}", r.confidence),
            agreement: r.agreement.to_string(),
            recommendation: r.recommendation.to_string(),
            notes: note_column(&notes, r.error.as_deref()),
        }
    }
}

#[derive(Debug, Tabled, Serialize)]
pub struct SchemaRow {
    #[tabled(rename = "#")]
    pub position: usize,
    #[tabled(rename = "Feature")]
    pub name: String,
    #[tabled(rename = "Default")]
    pub default: f64,
}

pub fn schema_rows(schema: &FeatureSchema) -> Vec<SchemaRow> {
    schema
        .features()
        .iter()
        .enumerate()
        .map(|(position, spec)| SchemaRow {
            position,
            name: spec.name.clone(),
            default: spec.default,
        })
        .collect()
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    value
        .map(|v| format!("{:.*}", precision, v))
        .unwrap_or_else(|| "-".to_string())
}

fn fmt_signed(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:+.2}", v))
        .unwrap_or_else(|| "-".to_string())
}

fn note_column(flags: &[String], error: Option<&str>) -> String {
    match error {
        Some(e) => e.to_string(),
        None => flags.join("; "),
    }
}

/// Print a vec of Tabled items, or the full records as JSON.
pub fn print_results<R, T>(records: &[R], mode: OutputMode) -> anyhow::Result<()>
where
    R: Serialize,
    T: Tabled + for<'a> From<&'a R>,
{
    match mode {
        OutputMode::Table => {
            if records.is_empty() {
                println!("(no results)");
            } else {
                let rows: Vec<T> = records.iter().map(T::from).collect();
                println!("{}", Table::new(rows));
            }
        }
        OutputMode::Json => {
            println!("{}", serde_json::to_string_pretty(records)?);
        }
    }
    Ok(())
}

/// Print a vec of Tabled + Serialize items in the chosen mode.
pub fn print_items<T: Tabled + Serialize>(items: &[T], mode: OutputMode) -> anyhow::Result<()> {
    match mode {
        OutputMode::Table => {
            if items.is_empty() {
                println!("(no results)");
            } else {
                println!("{}", Table::new(items));
            }
        }
        OutputMode::Json => {
            println!("{}", serde_json::to_string_pretty(items)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_rows_show_the_message() {
        let result = PredictionResult::error("592450", "k_regressor_v2", Some(6.5), "model missing");
        let row = PredictionRow::from(&result);
        assert_eq!(row.predicted, "-");
        assert_eq!(row.line, "6.5");
        assert_eq!(row.recommendation, "ERROR");
        assert_eq!(row.flags, "model missing");
    }

    #[test]
    fn schema_rows_keep_order() {
        let schema =
            FeatureSchema::from_pairs(&[("k_avg_season", 5.0), ("opponent_k_rate", 0.22)]).unwrap();
        let rows = schema_rows(&schema);
        assert_eq!(rows[1].position, 1);
        assert_eq!(rows[1].name, "opponent_k_rate");
    }
}
