use super::weights::{self, WeightStep};
use super::{Assignment, Curriculum, CurriculumModel, Error, SolutionRecord, Solver, WeightTriple};
use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Consumer of sweep results. Receives records and failures in sweep order.
pub trait Reporter {
    /// Called once per solved weight triple.
    ///
    /// # Errors
    /// - If the record could not be persisted.
    fn record(&mut self, curriculum: &Curriculum, record: &SolutionRecord) -> Result<()>;

    /// Called once per weight triple that could not be solved.
    ///
    /// # Errors
    /// - If the failure could not be persisted.
    fn failure(&mut self, failure: &SweepFailure) -> Result<()>;

    /// Called after the last triple.
    ///
    /// # Errors
    /// - If the summary could not be persisted.
    fn finish(&mut self, _report: &SweepReport) -> Result<()> {
        Ok(())
    }
}

/// A weight triple whose model could not be built or solved.
#[derive(Clone, Debug, PartialEq)]
pub struct SweepFailure {
    pub step: WeightStep,
    pub error: Error,
    /// Solver wall time spent before the failure, in seconds.
    pub runtime: f64,
}

/// Everything a sweep produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SweepReport {
    /// Solved triples in enumeration order.
    pub records: Vec<SolutionRecord>,
    pub failures: Vec<SweepFailure>,
    /// Accumulated solver wall time in seconds.
    pub runtime: f64,
}

impl SweepReport {
    /// Returns the `(C, IR, RD)` points of the frontier approximation.
    #[must_use]
    pub fn pareto_points(&self) -> Vec<(u32, f64, u64)> {
        let points = self.records.iter().map(|record| &record.criteria);
        points
            .map(|criteria| (criteria.load, criteria.retention, criteria.relation))
            .collect()
    }
}

/// Builds and solves a fresh model for the given weights.
/// Returns the rounded assignment and the solver wall time in seconds.
///
/// # Errors
/// - If the model cannot be built, the solver fails or a value is missing.
pub fn solve(
    curriculum: &Curriculum,
    weights: WeightTriple,
    solver: &mut dyn Solver,
) -> Result<(Assignment, f64), Error> {
    let model = CurriculumModel::build(curriculum, weights)?;
    let solved = solver.solve(model.model())?;
    Ok((model.assignment(&solved)?, solved.runtime))
}

/// Solves one grid position of the sweep.
/// The returned solver wall time also covers solves that ended in an error.
pub fn solve_step(
    curriculum: &Curriculum,
    step: WeightStep,
    solver: &mut dyn Solver,
) -> (Result<SolutionRecord, Error>, f64) {
    let model = match CurriculumModel::build(curriculum, step.weights()) {
        Ok(model) => model,
        Err(error) => return (Err(error), 0.0),
    };

    let start = Instant::now();
    match solver.solve(model.model()) {
        Ok(solved) => {
            let record = model
                .assignment(&solved)
                .map(|assignment| SolutionRecord::new(curriculum, step, assignment));
            (record, solved.runtime)
        }
        Err(error) => (Err(error), start.elapsed().as_secs_f64()),
    }
}

type Outcome = (WeightStep, (Result<SolutionRecord, Error>, f64));

/// Weighted-sum sweep over every weight triple of a grid.
#[derive(Clone, Copy, Debug)]
pub struct Sweep<'a> {
    curriculum: &'a Curriculum,
    steps: u32,
}

impl<'a> Sweep<'a> {
    #[must_use]
    pub const fn new(curriculum: &'a Curriculum, steps: u32) -> Self {
        Self { curriculum, steps }
    }

    /// Returns the grid positions in sweep order.
    pub fn steps(&self) -> impl Iterator<Item = WeightStep> {
        weights::enumerate(self.steps)
    }

    /// Solves every triple one after another with a single solver.
    ///
    /// # Errors
    /// - If the reporter fails or a fatal error occurs. Per-triple errors are reported and
    ///   the sweep continues.
    pub fn run(&self, solver: &mut dyn Solver, reporter: &mut dyn Reporter) -> Result<SweepReport> {
        log::info!(
            "sweeping {} with {} using {} weight triples",
            self.curriculum.name(),
            solver.name(),
            weights::combinations(self.steps)
        );

        let mut report = SweepReport::default();
        for step in self.steps() {
            let outcome = solve_step(self.curriculum, step, solver);
            self.collect((step, outcome), &mut report, reporter)?;
        }
        self.finish(report, reporter)
    }

    /// Solves the triples on `jobs` scoped threads, each owning a solver built by `factory`.
    /// Results are reported in the same order as [`Sweep::run`].
    ///
    /// # Errors
    /// - See [`Sweep::run`].
    pub fn run_parallel(
        &self,
        factory: fn() -> Box<dyn Solver>,
        jobs: usize,
        reporter: &mut dyn Reporter,
    ) -> Result<SweepReport> {
        let steps: Vec<WeightStep> = self.steps().collect();
        let jobs = jobs.clamp(1, steps.len().max(1));
        let next = AtomicUsize::new(0);

        log::info!(
            "sweeping {} with {} weight triples on {jobs} workers",
            self.curriculum.name(),
            steps.len()
        );

        let mut outcomes: Vec<Outcome> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..jobs)
                .map(|_| {
                    scope.spawn(|| {
                        let mut solver = factory();
                        let mut outcomes = Vec::new();
                        while let Some(&step) = steps.get(next.fetch_add(1, Ordering::Relaxed)) {
                            let outcome = solve_step(self.curriculum, step, solver.as_mut());
                            outcomes.push((step, outcome));
                        }
                        outcomes
                    })
                })
                .collect();

            workers
                .into_iter()
                .flat_map(|worker| {
                    worker
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .collect()
        });
        outcomes.sort_by_key(|(step, _)| *step);

        let mut report = SweepReport::default();
        for outcome in outcomes {
            self.collect(outcome, &mut report, reporter)?;
        }
        self.finish(report, reporter)
    }

    fn collect(
        &self,
        (step, (outcome, runtime)): Outcome,
        report: &mut SweepReport,
        reporter: &mut dyn Reporter,
    ) -> Result<()> {
        report.runtime += runtime;
        match outcome {
            Ok(record) => {
                debug_assert!(
                    record.verify(self.curriculum),
                    "Record {step} breaks a curriculum rule: {record:?}"
                );
                log::info!(
                    "{step}: C={} IR={} RD={} objective={:.6} in {runtime:.3}s",
                    record.criteria.load,
                    record.criteria.retention,
                    record.criteria.relation,
                    record.objective
                );
                reporter.record(self.curriculum, &record)?;
                report.records.push(record);
            }
            Err(error) if error.is_fatal() => return Err(error.into()),
            Err(error) => {
                log::warn!("{step}: {error}");
                let failure = SweepFailure {
                    step,
                    error,
                    runtime,
                };
                reporter.failure(&failure)?;
                report.failures.push(failure);
            }
        }
        Ok(())
    }

    fn finish(&self, report: SweepReport, reporter: &mut dyn Reporter) -> Result<SweepReport> {
        log::info!(
            "{}: {} solved, {} failed, solver time {:.3}s",
            self.curriculum.name(),
            report.records.len(),
            report.failures.len(),
            report.runtime
        );
        reporter.finish(&report)?;
        Ok(report)
    }
}
