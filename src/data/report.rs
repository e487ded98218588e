use crate::core::{
    Assignment, Criteria, Curriculum, Reporter, SolutionRecord, SweepFailure, SweepReport,
    WeightTriple,
};
use chrono::{DateTime, Local, TimeZone};
use std::fmt::{Display, Formatter, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Human-readable report of one solved weight triple.
#[derive(Clone, Debug)]
pub struct Iteration<'a> {
    title: String,
    curriculum: &'a Curriculum,
    weights: WeightTriple,
    criteria: Criteria,
    objective: f64,
    assignment: &'a Assignment,
}

impl<'a> Iteration<'a> {
    /// Evaluates criteria and objective of the assignment under the given weights.
    #[must_use]
    pub fn new(curriculum: &'a Curriculum, weights: WeightTriple, assignment: &'a Assignment) -> Self {
        let criteria = curriculum.criteria(assignment);
        Self {
            title: weights.to_string(),
            curriculum,
            weights,
            criteria,
            objective: curriculum.objective(&weights, &criteria),
            assignment,
        }
    }

    #[must_use]
    pub fn from_record(curriculum: &'a Curriculum, record: &'a SolutionRecord) -> Self {
        Self {
            title: record.step.to_string(),
            curriculum,
            weights: record.weights,
            criteria: record.criteria,
            objective: record.objective,
            assignment: &record.assignment,
        }
    }
}

impl Display for Iteration<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        writeln!(f, "Solution {}", self.title)?;
        writeln!(f)?;

        writeln!(f, "WEIGHTS")?;
        writeln!(f, "load weight: {:?}", self.weights.load)?;
        writeln!(f, "retention weight: {:?}", self.weights.retention)?;
        writeln!(f, "relation weight: {:?}", self.weights.relation)?;
        writeln!(f)?;

        writeln!(f, "CRITERIA")?;
        writeln!(f, "C = {}", self.criteria.load)?;
        writeln!(f, "IR = {}", self.criteria.retention)?;
        writeln!(f, "RD = {}", self.criteria.relation)?;
        writeln!(f)?;

        let summaries = self.curriculum.summarize(self.assignment);

        writeln!(f, "PERIOD LOADS")?;
        for summary in &summaries {
            writeln!(f, "period {} load = {}", summary.period, summary.load)?;
        }
        writeln!(f)?;

        writeln!(f, "PERIOD RETENTION")?;
        for summary in &summaries {
            writeln!(f, "period {} retention = {}", summary.period, summary.retention)?;
        }
        writeln!(f)?;

        for summary in &summaries {
            writeln!(
                f,
                "Period {} - load: {} - retention: {}",
                summary.period, summary.load, summary.retention
            )?;
            for &course in &summary.courses {
                let course = self.curriculum.course(course);
                writeln!(
                    f,
                    "{} {} - credits: {} - retention: {}",
                    course.code, course.title, course.credits, course.retention
                )?;
            }
            writeln!(f)?;
        }

        writeln!(f, "objective: {:.6}", self.objective)
    }
}

/// One `C;IR;RD;wLoad;wRetention;wRelation` line of the Pareto file.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParetoRow {
    pub criteria: Criteria,
    pub weights: WeightTriple,
}

impl From<&SolutionRecord> for ParetoRow {
    fn from(record: &SolutionRecord) -> Self {
        Self {
            criteria: record.criteria,
            weights: record.weights,
        }
    }
}

impl Display for ParetoRow {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "{};{};{};{:?};{:?};{:?}",
            self.criteria.load,
            self.criteria.retention,
            self.criteria.relation,
            self.weights.load,
            self.weights.retention,
            self.weights.relation
        )
    }
}

/// Writes iteration reports and Pareto rows to two sinks.
#[derive(Debug)]
pub struct TextReporter<W: Write> {
    iterations: W,
    pareto: W,
}

/// Reporter writing the timestamped files of one sweep run.
pub type FileReporter = TextReporter<BufWriter<File>>;

impl<W: Write> TextReporter<W> {
    pub const fn new(iterations: W, pareto: W) -> Self {
        Self { iterations, pareto }
    }

    /// Returns the iteration and Pareto sinks.
    pub fn into_inner(self) -> (W, W) {
        (self.iterations, self.pareto)
    }
}

impl TextReporter<BufWriter<File>> {
    /// Creates `iterations_<name>_<timestamp>.txt` and `pareto_<name>_<timestamp>.txt` in
    /// the directory, creating it if needed. Returns the reporter and both paths.
    ///
    /// # Errors
    /// - If the directory or the files cannot be created.
    pub fn create(dir: &Path, name: &str) -> anyhow::Result<(Self, [PathBuf; 2])> {
        if !dir.try_exists()? {
            std::fs::create_dir_all(dir)?;
        }

        let [iterations, pareto] = file_names(name, &Local::now()).map(|file| dir.join(file));
        let reporter = Self::new(
            BufWriter::new(File::create(&iterations)?),
            BufWriter::new(File::create(&pareto)?),
        );
        Ok((reporter, [iterations, pareto]))
    }
}

impl<W: Write> Reporter for TextReporter<W> {
    fn record(&mut self, curriculum: &Curriculum, record: &SolutionRecord) -> anyhow::Result<()> {
        writeln!(self.iterations, "{}", Iteration::from_record(curriculum, record))?;
        writeln!(self.pareto, "{}", ParetoRow::from(record))?;
        Ok(())
    }

    fn failure(&mut self, failure: &SweepFailure) -> anyhow::Result<()> {
        writeln!(self.iterations, "Solution {}", failure.step)?;
        writeln!(self.iterations)?;
        writeln!(self.iterations, "FAILED: {}", failure.error)?;
        writeln!(self.iterations)?;
        Ok(())
    }

    fn finish(&mut self, report: &SweepReport) -> anyhow::Result<()> {
        writeln!(
            self.iterations,
            "{} solved, {} failed, solver time {:.3} s",
            report.records.len(),
            report.failures.len(),
            report.runtime
        )?;
        self.iterations.flush()?;
        self.pareto.flush()?;
        Ok(())
    }
}

/// Prints every report to stdout, Pareto rows prefixed with `Pareto: `.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdoutReporter;

impl Reporter for StdoutReporter {
    fn record(&mut self, curriculum: &Curriculum, record: &SolutionRecord) -> anyhow::Result<()> {
        println!("{}", Iteration::from_record(curriculum, record));
        println!("Pareto: {}", ParetoRow::from(record));
        println!();
        Ok(())
    }

    fn failure(&mut self, failure: &SweepFailure) -> anyhow::Result<()> {
        println!("Solution {} failed: {}", failure.step, failure.error);
        println!();
        Ok(())
    }

    fn finish(&mut self, report: &SweepReport) -> anyhow::Result<()> {
        println!("runtime is {:.3} s", report.runtime);
        Ok(())
    }
}

/// Returns the iteration and Pareto file names for a run started at `time`.
#[must_use]
pub fn file_names<Tz: TimeZone>(name: &str, time: &DateTime<Tz>) -> [String; 2]
where
    Tz::Offset: Display,
{
    let stamp = time
        .format("%Y-%m-%d %H:%M:%S%.6f")
        .to_string()
        .replace([':', ' '], "_");
    let name: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    [
        format!("iterations_{name}_{stamp}.txt"),
        format!("pareto_{name}_{stamp}.txt"),
    ]
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::dataset::test::{small, small_config};
    use crate::core::weights::enumerate;
    use crate::core::{Error, SolveStatus};
    use chrono::Utc;

    fn record(curriculum: &Curriculum) -> SolutionRecord {
        let step = enumerate(10)
            .find(|step| (step.load(), step.retention()) == (3, 2))
            .unwrap_or_else(|| panic!("missing step"));
        SolutionRecord::new(curriculum, step, Assignment::from_periods(2, &[0, 1, 0, 1, 0, 1]))
    }

    #[test]
    fn pareto_row_format() {
        let curriculum = small();
        let row = ParetoRow::from(&record(&curriculum));
        assert_eq!(row.to_string(), "12;65;13;0.3;0.2;0.5");
    }

    #[test]
    fn pareto_row_keeps_fractional_retention() -> anyhow::Result<()> {
        let mut config = small_config();
        config.retention[0] = 10.25;
        let curriculum = Curriculum::try_from(config)?;

        let row = ParetoRow::from(&record(&curriculum));
        assert_eq!(row.to_string(), "12;65.25;13;0.3;0.2;0.5");
        Ok(())
    }

    #[test]
    fn iteration_lists_periods() {
        let curriculum = small();
        let record = record(&curriculum);
        let text = Iteration::from_record(&curriculum, &record).to_string();

        assert!(text.starts_with("Solution 3/2/5\n"));
        assert!(text.contains("C = 12\nIR = 65\nRD = 13\n"));
        assert!(text.contains("period 1 load = 12\n"));
        assert!(text.contains("Period 0 - load: 12 - retention: 65\n"));
        assert!(text.contains("- credits: 4 - retention: 30\n"));
        assert!(text.trim_end().ends_with(&format!("objective: {:.6}", record.objective)));
    }

    #[test]
    fn text_reporter_writes_both_sinks() -> anyhow::Result<()> {
        let curriculum = small();
        let record = record(&curriculum);
        let failure = SweepFailure {
            step: record.step,
            error: Error::Solver {
                solver: "microlp".into(),
                status: SolveStatus::Infeasible,
            },
            runtime: 0.25,
        };

        let mut reporter = TextReporter::new(Vec::new(), Vec::new());
        reporter.record(&curriculum, &record)?;
        reporter.failure(&failure)?;
        reporter.finish(&SweepReport::default())?;
        let (iterations, pareto) = reporter.into_inner();

        assert_eq!(String::from_utf8(pareto)?, "12;65;13;0.3;0.2;0.5\n");
        let iterations = String::from_utf8(iterations)?;
        assert!(iterations.contains("FAILED: solver `microlp` failed: infeasible"));
        assert!(iterations.ends_with("0 solved, 0 failed, solver time 0.000 s\n"));
        Ok(())
    }

    #[test]
    fn timestamped_file_names() {
        let time = Utc
            .with_ymd_and_hms(2024, 3, 5, 14, 7, 9)
            .single()
            .unwrap_or_else(|| panic!("ambiguous time"));
        assert_eq!(
            file_names("sin ufvjm", &time),
            [
                "iterations_sin_ufvjm_2024-03-05_14_07_09.000000.txt".to_string(),
                "pareto_sin_ufvjm_2024-03-05_14_07_09.000000.txt".to_string(),
            ]
        );
    }
}
