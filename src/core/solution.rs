use super::{CourseId, Curriculum, WeightStep, WeightTriple};
use serde::{Deserialize, Serialize};

/// Course-to-period assignment matrix: `matrix[course][period]` is set iff the course
/// is taught in that period.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Assignment {
    matrix: Vec<Vec<bool>>,
}

impl Assignment {
    /// Creates an assignment from a raw matrix.
    #[must_use]
    pub const fn from_matrix(matrix: Vec<Vec<bool>>) -> Self {
        Self { matrix }
    }

    /// Creates an assignment placing course `i` in period `periods_of[i]`.
    #[must_use]
    pub fn from_periods(periods: usize, periods_of: &[usize]) -> Self {
        let matrix = periods_of
            .iter()
            .map(|&period| (0..periods).map(|p| p == period).collect())
            .collect();
        Self { matrix }
    }

    #[must_use]
    pub fn matrix(&self) -> &[Vec<bool>] {
        &self.matrix
    }

    /// Returns whether the course is placed in the period.
    #[must_use]
    pub fn is_placed(&self, course: CourseId, period: usize) -> bool {
        self.matrix
            .get(course.index())
            .and_then(|row| row.get(period))
            .copied()
            .unwrap_or(false)
    }

    /// Returns the period of the course if it occupies exactly one.
    #[must_use]
    pub fn period_of(&self, course: CourseId) -> Option<usize> {
        let row = self.matrix.get(course.index())?;
        let mut periods = row.iter().enumerate().filter(|(_, &set)| set);
        match (periods.next(), periods.next()) {
            (Some((period, _)), None) => Some(period),
            _ => None,
        }
    }

    /// Returns the courses placed in the period, ordered by id.
    pub fn courses_in<'a>(
        &'a self,
        curriculum: &'a Curriculum,
        period: usize,
    ) -> impl Iterator<Item = CourseId> + 'a {
        curriculum
            .course_ids()
            .filter(move |&course| self.is_placed(course, period))
    }
}

/// Realized values of the three criteria.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Criteria {
    /// Maximum credit load over all periods (C).
    pub load: u32,
    /// Maximum retention sum over all periods (IR).
    pub retention: f64,
    /// Relatedness-weighted distance sum (RD).
    pub relation: u64,
}

/// Per-period totals of a timetable.
#[derive(Clone, Debug, PartialEq)]
pub struct PeriodSummary {
    pub period: usize,
    pub load: u32,
    pub retention: f64,
    pub courses: Vec<CourseId>,
}

impl Curriculum {
    /// Returns the credit load of every period.
    #[must_use]
    pub fn period_loads(&self, assignment: &Assignment) -> Vec<u32> {
        (0..self.periods())
            .map(|period| {
                assignment
                    .courses_in(self, period)
                    .map(|course| self.course(course).credits)
                    .sum()
            })
            .collect()
    }

    /// Returns the retention sum of every period.
    #[must_use]
    pub fn period_retention(&self, assignment: &Assignment) -> Vec<f64> {
        (0..self.periods())
            .map(|period| {
                assignment
                    .courses_in(self, period)
                    .map(|course| self.course(course).retention)
                    .sum()
            })
            .collect()
    }

    /// Returns the sum of `relatedness(ii, i) * distance(jj, j)` over every course `i`
    /// placed in `j` and course `ii` placed in `jj`.
    #[must_use]
    pub fn relation_distance(&self, assignment: &Assignment) -> u64 {
        let placements: Vec<Vec<usize>> = self
            .course_ids()
            .map(|course| {
                (0..self.periods())
                    .filter(|&period| assignment.is_placed(course, period))
                    .collect()
            })
            .collect();

        let mut total = 0;
        for i in self.course_ids() {
            for ii in self.course_ids() {
                let degree = u64::from(self.relatedness(ii, i));
                if degree == 0 {
                    continue;
                }
                for &j in &placements[i.index()] {
                    for &jj in &placements[ii.index()] {
                        total += degree * u64::from(self.distances().get(jj, j));
                    }
                }
            }
        }
        total
    }

    /// Evaluates the three criteria of an assignment.
    #[must_use]
    pub fn criteria(&self, assignment: &Assignment) -> Criteria {
        Criteria {
            load: self.period_loads(assignment).into_iter().max().unwrap_or_default(),
            retention: self
                .period_retention(assignment)
                .into_iter()
                .fold(0.0, f64::max),
            relation: self.relation_distance(assignment),
        }
    }

    /// Evaluates the normalized weighted-sum objective for the given criteria.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn objective(&self, weights: &WeightTriple, criteria: &Criteria) -> f64 {
        let bounds = self.normalization();
        weights.load * bounds.load.normalize(f64::from(criteria.load))
            + weights.retention * bounds.retention.normalize(criteria.retention)
            + weights.relation * bounds.relation.normalize(criteria.relation as f64)
    }

    /// Summarizes every period of an assignment.
    #[must_use]
    pub fn summarize(&self, assignment: &Assignment) -> Vec<PeriodSummary> {
        let loads = self.period_loads(assignment);
        let retention = self.period_retention(assignment);
        loads
            .into_iter()
            .zip(retention)
            .enumerate()
            .map(|(period, (load, retention))| PeriodSummary {
                period,
                load,
                retention,
                courses: assignment.courses_in(self, period).collect(),
            })
            .collect()
    }
}

/// Outcome of solving the model for one weight triple. Never mutated after creation.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub struct SolutionRecord {
    pub step: WeightStep,
    pub weights: WeightTriple,
    pub criteria: Criteria,
    /// Normalized objective value of the realized criteria.
    pub objective: f64,
    pub assignment: Assignment,
}

impl SolutionRecord {
    /// Creates a record, evaluating criteria and objective from the assignment.
    #[must_use]
    pub fn new(curriculum: &Curriculum, step: WeightStep, assignment: Assignment) -> Self {
        let weights = step.weights();
        let criteria = curriculum.criteria(&assignment);
        let objective = curriculum.objective(&weights, &criteria);
        Self {
            step,
            weights,
            criteria,
            objective,
            assignment,
        }
    }

    /// Returns whether the assignment satisfies every curriculum rule.
    #[must_use]
    pub fn verify(&self, curriculum: &Curriculum) -> bool {
        super::check::violations(curriculum, &self.assignment, &self.criteria).is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::dataset::test::{chain, small};

    #[test]
    fn period_totals() {
        let curriculum = small();
        let assignment = Assignment::from_periods(2, &[0, 1, 0, 1, 0, 1]);
        assert_eq!(curriculum.period_loads(&assignment), vec![12, 12]);
        assert_eq!(curriculum.period_retention(&assignment), vec![65.0, 40.0]);

        let criteria = curriculum.criteria(&assignment);
        assert_eq!(criteria.load, 12);
        assert_eq!(criteria.retention, 65.0);
    }

    #[test]
    fn relation_distance_follows_direction() {
        let curriculum = small();
        // 0 -> 1 is degree 9, 2 -> 3 is degree 4.
        let forward = Assignment::from_periods(2, &[0, 1, 0, 1, 0, 1]);
        assert_eq!(curriculum.relation_distance(&forward), 9 + 4);

        let same = Assignment::from_periods(2, &[0, 1, 1, 1, 0, 0]);
        assert_eq!(curriculum.relation_distance(&same), 9);

        let backward = Assignment::from_periods(2, &[0, 1, 1, 0, 0, 1]);
        assert_eq!(curriculum.relation_distance(&backward), 9 + 4 * 100);
    }

    #[test]
    fn period_of_requires_single_placement() {
        let curriculum = chain();
        let assignment = Assignment::from_matrix(vec![
            vec![true, false, false, false],
            vec![false, false, false, false],
            vec![false, true, true, false],
        ]);
        let id = |i| curriculum.course_id(i).unwrap_or_else(|| panic!("course {i}"));
        assert_eq!(assignment.period_of(id(0)), Some(0));
        assert_eq!(assignment.period_of(id(1)), None);
        assert_eq!(assignment.period_of(id(2)), None);
        assert_eq!(assignment.period_of(id(5)), None);
    }

    #[test]
    fn objective_is_normalized() {
        let curriculum = small();
        let assignment = Assignment::from_periods(2, &[0, 1, 0, 1, 0, 1]);
        let step = WeightStep::new(10, 0, 10).unwrap_or_else(|e| panic!("{e}"));
        let record = SolutionRecord::new(&curriculum, step, assignment);
        assert_eq!(record.objective, 0.0);

        let step = WeightStep::new(0, 0, 10).unwrap_or_else(|e| panic!("{e}"));
        let assignment = record.assignment.clone();
        let record = SolutionRecord::new(&curriculum, step, assignment);
        assert!((record.objective - 0.13).abs() < 1e-12);
    }
}
