use std::io::Write;

use serde::Serialize;
use crate::error::BenchResult;
use crate::harness::{BenchmarkResults, CombinationRecord, Outcome};

/// Receives results as combinations resolve and once the run is over
pub trait Reporter {
    fn record(&mut self, _record: &CombinationRecord) -> BenchResult<()> {
        Ok(())
    }

    fn finish(&mut self, results: &BenchmarkResults) -> BenchResult<()>;
}

/// Console comparison table followed by the best and fastest combinations
pub struct TableReporter<W: Write> {
    out: W,
}

impl<W: Write> TableReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl TableReporter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> Reporter for TableReporter<W> {
    /// One progress line per resolved combination
    fn record(&mut self, record: &CombinationRecord) -> BenchResult<()> {
        let r = &record.result;
        match &record.outcome {
            Outcome::Recorded => writeln!(
                self.out,
                "{}: {} matches, {} good, {:.1} ms, homography {}",
                record.key,
                r.total_matches,
                r.good_matches,
                r.elapsed_ms(),
                if r.homography_success { "ok" } else { "failed" }
            )?,
            Outcome::Failed { stage, reason } => {
                writeln!(self.out, "{}: failed while {stage}: {reason}", record.key)?
            }
        }
        Ok(())
    }

    fn finish(&mut self, results: &BenchmarkResults) -> BenchResult<()> {
        let out = &mut self.out;
        writeln!(out)?;
        writeln!(out, "=== COMPARATIVE RESULTS ===")?;
        writeln!(
            out,
            "{:<25}{:>12}{:>12}{:>12}{:>15}",
            "Combination", "Matches", "Good", "Time (ms)", "Homography"
        )?;
        writeln!(out, "{}", "-".repeat(76))?;
        for record in results {
            let r = &record.result;
            let homography = match &record.outcome {
                Outcome::Recorded if r.homography_success => "Yes",
                Outcome::Recorded => "No",
                Outcome::Failed { .. } => "Failed",
            };
            writeln!(
                out,
                "{:<25}{:>12}{:>12}{:>12.1}{:>15}",
                record.key.to_string(),
                r.total_matches,
                r.good_matches,
                r.elapsed_ms(),
                homography
            )?;
        }

        if let Some(best) = results.best_by_quality() {
            writeln!(out)?;
            writeln!(
                out,
                "Best combination (most good matches): {} with {} good matches",
                best.key, best.result.good_matches
            )?;
        }
        if let Some(fastest) = results.fastest() {
            writeln!(
                out,
                "Fastest combination: {} with {:.1} ms",
                fastest.key,
                fastest.result.elapsed_ms()
            )?;
        }
        out.flush()?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct RecordJson<'a> {
    detector: &'a str,
    descriptor: &'a str,
    matcher: &'a str,
    total_matches: usize,
    good_matches: usize,
    elapsed_ms: f64,
    homography_success: bool,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl<'a> From<&'a CombinationRecord> for RecordJson<'a> {
    fn from(record: &'a CombinationRecord) -> Self {
        let (status, error) = match &record.outcome {
            Outcome::Recorded => ("recorded".to_string(), None),
            Outcome::Failed { stage, reason } => (format!("failed while {stage}"), Some(reason.as_str())),
        };
        Self {
            detector: &record.key.detector,
            descriptor: &record.key.descriptor,
            matcher: &record.key.matcher,
            total_matches: record.result.total_matches,
            good_matches: record.result.good_matches,
            elapsed_ms: record.result.elapsed_ms(),
            homography_success: record.result.homography_success,
            status,
            error,
        }
    }
}

#[derive(Debug, Serialize)]
struct SummaryJson<'a> {
    results: Vec<RecordJson<'a>>,
    best: Option<String>,
    fastest: Option<String>,
}

/// Whole run as one pretty-printed JSON document
pub struct JsonReporter<W: Write> {
    out: W,
}

impl<W: Write> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn finish(&mut self, results: &BenchmarkResults) -> BenchResult<()> {
        let summary = SummaryJson {
            results: results.iter().map(RecordJson::from).collect(),
            best: results.best_by_quality().map(|r| r.key.to_string()),
            fastest: results.fastest().map(|r| r.key.to_string()),
        };
        serde_json::to_writer_pretty(&mut self.out, &summary)?;
        writeln!(self.out)?;
        Ok(())
    }
}
