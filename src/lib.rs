#![deny(clippy::all, clippy::cargo, clippy::expect_used, clippy::unwrap_used)]
#![deny(clippy::pedantic, clippy::nursery, unsafe_code)]
#![warn(clippy::unimplemented, clippy::redundant_type_annotations)]

use anyhow::Result;
use std::io::BufRead;

pub mod algo;
pub mod core;
pub mod data;

/// Reads a curriculum from the reader and sweeps every weight triple of a grid with `steps`
/// steps, handing each result to the reporter.
///
/// # Errors
/// - If the curriculum could not be read or is invalid.
/// - If the reporter fails.
///
/// # Panics
/// - If a solved timetable breaks a curriculum rule in debug mode.
pub fn run_reader(
    reader: &mut impl BufRead,
    solver: &mut dyn core::Solver,
    reporter: &mut dyn core::Reporter,
    steps: u32,
) -> Result<core::SweepReport> {
    let curriculum: core::Curriculum = data::deserialize(reader)?;
    core::Sweep::new(&curriculum, steps).run(solver, reporter)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::dataset::test::small_config;

    #[test]
    fn sweeps_curriculum_from_reader() -> Result<()> {
        let text = data::to_string(&small_config())?;
        let mut reporter = data::TextReporter::new(Vec::new(), Vec::new());
        let report = run_reader(&mut text.as_bytes(), &mut algo::MicroLp, &mut reporter, 2)?;

        assert_eq!(report.records.len(), 6);
        let (_, pareto) = reporter.into_inner();
        assert_eq!(String::from_utf8(pareto)?.lines().count(), 6);
        Ok(())
    }

    #[test]
    fn invalid_curriculum_aborts_before_solving() -> Result<()> {
        let mut config = small_config();
        config.normalization.load.max = config.normalization.load.min;
        let text = data::to_string(&config)?;
        let mut reporter = data::TextReporter::new(Vec::new(), Vec::new());

        let err = run_reader(&mut text.as_bytes(), &mut algo::MicroLp, &mut reporter, 2);
        assert!(err.is_err());
        let (iterations, pareto) = reporter.into_inner();
        assert!(iterations.is_empty() && pareto.is_empty());
        Ok(())
    }
}
