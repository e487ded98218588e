use super::dataset::{
    Bounds, LAST_LEVELING_PERIOD, MAX_PREREQUISITE_GAP, MODERATE_RELATION, PREREQUISITE_RELATION,
};
use super::model::{Direction, LinExpr, Model, Sense, VarId, VarKind};
use super::{Assignment, CourseId, Curriculum, Error, Solved, WeightTriple};
use ahash::{HashMap, HashMapExt};

/// The MILP of one curriculum for one weight triple.
///
/// Variables: `X[course][period]` binaries, the integer load envelope `C` bounded by the
/// per-period load range, the non-negative integer retention envelope `IR`, and one
/// continuous `y` per product `X[i][j] * X[ii][jj]` needed by the relatedness-distance
/// term `RD`. Each `y` is tied to its factors by the exact McCormick envelope, so the
/// emitted model stays linear while `RD` keeps its quadratic meaning.
#[derive(Clone, Debug)]
pub struct CurriculumModel<'a> {
    curriculum: &'a Curriculum,
    weights: WeightTriple,
    model: Model,
    x: Vec<Vec<VarId>>,
    max_load: VarId,
    max_retention: VarId,
    products: Vec<(VarId, VarId, VarId)>,
    relation_distance: LinExpr,
}

impl<'a> CurriculumModel<'a> {
    /// Builds variables, constraints and the normalized objective.
    ///
    /// # Errors
    /// - If the weight triple is malformed.
    /// - If a constraint references a course or period outside the curriculum.
    pub fn build(curriculum: &'a Curriculum, weights: WeightTriple) -> Result<Self, Error> {
        weights.validate()?;

        let mut model = Model::new(&format!("curriculum_{}", curriculum.name()));
        let x = assignment_vars(&mut model, curriculum);
        let load = curriculum.load_per_period();
        let max_load = model.add_var(
            "C",
            VarKind::Integer,
            f64::from(load.min),
            Some(f64::from(load.max)),
        );
        let max_retention = model.add_var("IR", VarKind::Integer, 0.0, None);

        let mut result = Self {
            curriculum,
            weights,
            model,
            x,
            max_load,
            max_retention,
            products: Vec::new(),
            relation_distance: LinExpr::new(),
        };

        result.single_assignment()?;
        result.leveling_placement()?;
        result.fixed_periods()?;
        result.prerequisites_not_first()?;
        result.prerequisite_ordering()?;
        result.period_bounds()?;
        result.relatedness_placement()?;
        result.relation_distance = result.linearized_relation_distance()?;
        result.set_objective();

        log::debug!(
            "model {} has {} variables and {} constraints",
            result.model.name(),
            result.model.variables().len(),
            result.model.constraints().len()
        );

        Ok(result)
    }

    #[must_use]
    pub const fn model(&self) -> &Model {
        &self.model
    }

    #[must_use]
    pub const fn weights(&self) -> WeightTriple {
        self.weights
    }

    /// Returns the load envelope variable `C`.
    #[must_use]
    pub const fn max_load(&self) -> VarId {
        self.max_load
    }

    /// Returns the retention envelope variable `IR`.
    #[must_use]
    pub const fn max_retention(&self) -> VarId {
        self.max_retention
    }

    /// Returns the linear form of the relatedness-distance sum `RD`.
    #[must_use]
    pub const fn relation_distance(&self) -> &LinExpr {
        &self.relation_distance
    }

    /// Returns the assignment variable of a course and period.
    ///
    /// # Errors
    /// - If the course or period is out of range.
    pub fn x(&self, course: CourseId, period: usize) -> Result<VarId, Error> {
        self.x
            .get(course.index())
            .and_then(|row| row.get(period))
            .copied()
            .ok_or_else(|| Error::construction(format!("X[{course}][{period}] is out of range")))
    }

    /// Reads the assignment back from solver values.
    ///
    /// # Errors
    /// - If the solver did not return a value for some `X` variable.
    pub fn assignment(&self, solved: &Solved) -> Result<Assignment, Error> {
        let matrix = self
            .x
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&var| solved.value(var).map(|value| value > 0.5))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Assignment::from_matrix(matrix))
    }

    /// Returns variable values encoding the given assignment, with `C` and `IR` set to the
    /// realized envelopes and every product variable set to the product of its factors.
    #[must_use]
    pub fn values_for(&self, assignment: &Assignment) -> Vec<f64> {
        let mut values = vec![0.0; self.model.variables().len()];

        for (row, vars) in assignment.matrix().iter().zip(&self.x) {
            for (&placed, var) in row.iter().zip(vars) {
                if placed {
                    values[var.index()] = 1.0;
                }
            }
        }

        let criteria = self.curriculum.criteria(assignment);
        values[self.max_load.index()] = f64::from(criteria.load);
        values[self.max_retention.index()] = criteria.retention.ceil();

        for &(y, a, b) in &self.products {
            values[y.index()] = values[a.index()] * values[b.index()];
        }

        values
    }

    /// Sum of `period * X[course][period]`, the period index of a placed course.
    fn weighted_period(&self, course: CourseId) -> Result<LinExpr, Error> {
        let mut expr = LinExpr::new();
        for period in 0..self.curriculum.periods() {
            expr.add_term(period_coefficient(period), self.x(course, period)?);
        }
        Ok(expr)
    }

    fn single_assignment(&mut self) -> Result<(), Error> {
        let curriculum = self.curriculum;
        for course in curriculum.course_ids() {
            let mut row = LinExpr::new();
            for period in 0..curriculum.periods() {
                row.add_term(1.0, self.x(course, period)?);
            }
            self.model
                .add_constr(&format!("single_{course}"), row, Sense::Equal, 1.0);
        }
        Ok(())
    }

    fn leveling_placement(&mut self) -> Result<(), Error> {
        for &course in self.curriculum.leveling() {
            let expr = self.weighted_period(course)?;
            self.model.add_constr(
                &format!("leveling_{course}"),
                expr,
                Sense::LessEqual,
                period_coefficient(LAST_LEVELING_PERIOD),
            );
        }
        Ok(())
    }

    fn fixed_periods(&mut self) -> Result<(), Error> {
        let curriculum = self.curriculum;
        let periods = curriculum.periods();
        let penultimate = periods
            .checked_sub(2)
            .ok_or_else(|| Error::construction("no penultimate period"))?;
        let last = periods
            .checked_sub(1)
            .ok_or_else(|| Error::construction("no last period"))?;

        for (prefix, courses, period) in [
            ("penultimate", curriculum.penultimate(), penultimate),
            ("last", curriculum.last(), last),
        ] {
            for &course in courses {
                let expr: LinExpr = [(1.0, self.x(course, period)?)].into_iter().collect();
                self.model
                    .add_constr(&format!("{prefix}_{course}"), expr, Sense::Equal, 1.0);
            }
        }
        Ok(())
    }

    fn prerequisites_not_first(&mut self) -> Result<(), Error> {
        let curriculum = self.curriculum;
        for course in curriculum.courses() {
            if !course.prerequisites.is_empty() {
                let expr: LinExpr = [(1.0, self.x(course.id, 0)?)].into_iter().collect();
                self.model
                    .add_constr(&format!("no_first_{}", course.id), expr, Sense::Equal, 0.0);
            }
        }
        Ok(())
    }

    /// A course may only be in period `j` if each prerequisite is in some period before `j`.
    fn prerequisite_ordering(&mut self) -> Result<(), Error> {
        let curriculum = self.curriculum;
        for course in curriculum.courses() {
            for &pr in &course.prerequisites {
                for period in 1..curriculum.periods() {
                    let mut expr = LinExpr::new();
                    for before in 0..period {
                        expr.add_term(1.0, self.x(pr, before)?);
                    }
                    expr.add_term(-1.0, self.x(course.id, period)?);
                    self.model.add_constr(
                        &format!("prerequisite_{}_{pr}_{period}", course.id),
                        expr,
                        Sense::GreaterEqual,
                        0.0,
                    );
                }
            }
        }
        Ok(())
    }

    /// Load, course count and retention limits of every period. `C` and `IR` become upper
    /// envelopes of the period loads and retention sums.
    fn period_bounds(&mut self) -> Result<(), Error> {
        let curriculum = self.curriculum;
        let load = curriculum.load_per_period();
        let count = curriculum.courses_per_period();

        for period in 0..curriculum.periods() {
            let mut credits = LinExpr::new();
            let mut courses = LinExpr::new();
            let mut retention = LinExpr::new();
            for course in curriculum.courses() {
                let var = self.x(course.id, period)?;
                credits.add_term(f64::from(course.credits), var);
                courses.add_term(1.0, var);
                retention.add_term(course.retention, var);
            }

            let mut envelope = credits.clone();
            envelope.add_term(-1.0, self.max_load);
            retention.add_term(-1.0, self.max_retention);

            let min_load = f64::from(load.min);
            self.model
                .add_constr(&format!("load_min_{period}"), credits, Sense::GreaterEqual, min_load);
            self.model
                .add_constr(&format!("load_max_{period}"), envelope, Sense::LessEqual, 0.0);
            self.model.add_constr(
                &format!("count_min_{period}"),
                courses.clone(),
                Sense::GreaterEqual,
                count_coefficient(count.min),
            );
            self.model.add_constr(
                &format!("count_max_{period}"),
                courses,
                Sense::LessEqual,
                count_coefficient(count.max),
            );
            self.model
                .add_constr(&format!("retention_{period}"), retention, Sense::LessEqual, 0.0);
        }
        Ok(())
    }

    /// Moderately related courses keep their order; prerequisite-strength pairs also stay
    /// within `MAX_PREREQUISITE_GAP` periods.
    fn relatedness_placement(&mut self) -> Result<(), Error> {
        let curriculum = self.curriculum;
        for from in curriculum.course_ids() {
            for to in curriculum.course_ids() {
                let degree = curriculum.relatedness(from, to);
                if from == to || degree < MODERATE_RELATION {
                    continue;
                }

                let mut gap = self.weighted_period(to)?;
                gap.add_scaled(-1.0, &self.weighted_period(from)?);

                if degree == PREREQUISITE_RELATION {
                    self.model.add_constr(
                        &format!("proximity_{from}_{to}"),
                        gap.clone(),
                        Sense::LessEqual,
                        period_coefficient(MAX_PREREQUISITE_GAP),
                    );
                }
                self.model
                    .add_constr(&format!("order_{from}_{to}"), gap, Sense::GreaterEqual, 0.0);
            }
        }
        Ok(())
    }

    /// `RD = sum relatedness(ii, i) * distance(jj, j) * X[i][j] * X[ii][jj]`, with every
    /// product replaced by a shared auxiliary variable.
    fn linearized_relation_distance(&mut self) -> Result<LinExpr, Error> {
        let curriculum = self.curriculum;
        let distances = curriculum.distances();
        let mut cache: HashMap<(VarId, VarId), VarId> = HashMap::new();
        let mut rd = LinExpr::new();

        for i in curriculum.course_ids() {
            for ii in curriculum.course_ids() {
                let degree = curriculum.relatedness(ii, i);
                // Distinct periods of one course never coexist, equal ones have distance 0.
                if i == ii || degree == 0 {
                    continue;
                }
                for j in 0..curriculum.periods() {
                    for jj in 0..curriculum.periods() {
                        let distance = distances.get(jj, j);
                        if distance == 0 {
                            continue;
                        }
                        let (a, b) = (self.x(i, j)?, self.x(ii, jj)?);
                        let key = (a.min(b), a.max(b));
                        let y = match cache.get(&key) {
                            Some(&y) => y,
                            None => {
                                let y = self.product(key.0, key.1);
                                cache.insert(key, y);
                                y
                            }
                        };
                        rd.add_term(f64::from(degree) * f64::from(distance), y);
                    }
                }
            }
        }

        Ok(rd)
    }

    fn product(&mut self, a: VarId, b: VarId) -> VarId {
        let name = format!("y_{}_{}", a.index(), b.index());
        let y = self
            .model
            .add_var(&name, VarKind::Continuous, 0.0, Some(1.0));

        let upper_a: LinExpr = [(1.0, y), (-1.0, a)].into_iter().collect();
        let upper_b: LinExpr = [(1.0, y), (-1.0, b)].into_iter().collect();
        let lower: LinExpr = [(1.0, y), (-1.0, a), (-1.0, b)].into_iter().collect();

        self.model
            .add_constr(&format!("{name}_a"), upper_a, Sense::LessEqual, 0.0);
        self.model
            .add_constr(&format!("{name}_b"), upper_b, Sense::LessEqual, 0.0);
        self.model
            .add_constr(&format!("{name}_ab"), lower, Sense::GreaterEqual, -1.0);

        self.products.push((y, a, b));
        y
    }

    fn set_objective(&mut self) {
        let bounds = *self.curriculum.normalization();
        let weights = self.weights;

        let load: LinExpr = [(1.0, self.max_load)].into_iter().collect();
        let retention: LinExpr = [(1.0, self.max_retention)].into_iter().collect();

        let mut objective = LinExpr::new();
        objective.add_scaled(weights.load, &normalized(&load, bounds.load));
        objective.add_scaled(weights.retention, &normalized(&retention, bounds.retention));
        objective.add_scaled(
            weights.relation,
            &normalized(&self.relation_distance, bounds.relation),
        );

        self.model.set_objective(objective, Direction::Minimize);
    }
}

fn assignment_vars(model: &mut Model, curriculum: &Curriculum) -> Vec<Vec<VarId>> {
    curriculum
        .course_ids()
        .map(|course| {
            (0..curriculum.periods())
                .map(|period| model.add_binvar(&format!("x_{course}_{period}")))
                .collect()
        })
        .collect()
}

/// `(expr - min) / (max - min)`.
fn normalized(expr: &LinExpr, bounds: Bounds<f64>) -> LinExpr {
    let mut result = LinExpr::constant(-bounds.min / bounds.span());
    result.add_scaled(1.0 / bounds.span(), expr);
    result
}

#[allow(clippy::cast_precision_loss)]
fn period_coefficient(period: usize) -> f64 {
    period as f64
}

#[allow(clippy::cast_precision_loss)]
fn count_coefficient(count: usize) -> f64 {
    count as f64
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::check::violations;
    use crate::core::dataset::test::{chain, chain_config, small};
    use proptest::prelude::*;

    fn weights(load: f64, retention: f64, relation: f64) -> WeightTriple {
        WeightTriple::new(load, retention, relation).unwrap_or_else(|err| panic!("{err}"))
    }

    fn count(model: &Model, prefix: &str) -> usize {
        let prefix = format!("{prefix}_");
        model
            .constraints()
            .iter()
            .filter(|c| c.name.starts_with(&prefix))
            .count()
    }

    #[test]
    fn constraint_families_are_emitted() -> anyhow::Result<()> {
        let curriculum = small();
        let built = CurriculumModel::build(&curriculum, weights(1.0, 0.0, 0.0))?;
        let model = built.model();

        assert_eq!(count(model, "single"), 6);
        assert_eq!(count(model, "leveling"), 1);
        assert_eq!(count(model, "penultimate") + count(model, "last"), 0);
        assert_eq!(count(model, "no_first"), 1);
        assert_eq!(count(model, "prerequisite"), 1);
        assert_eq!(count(model, "load_min") + count(model, "load_max"), 4);
        assert_eq!(count(model, "count_min") + count(model, "count_max"), 4);
        assert_eq!(count(model, "retention"), 2);
        assert_eq!(count(model, "order"), 2);
        assert_eq!(count(model, "proximity"), 1);
        assert_eq!(count(model, "y"), 4 * 3);

        // 12 assignments, C, IR and four products.
        assert_eq!(model.variables().len(), 12 + 2 + 4);
        Ok(())
    }

    #[test]
    fn envelope_bounds() -> anyhow::Result<()> {
        let curriculum = chain();
        let built = CurriculumModel::build(&curriculum, weights(0.2, 0.3, 0.5))?;
        let c = built.model().variable(built.max_load());
        assert_eq!((c.lower, c.upper), (2.0, Some(12.0)));
        let ir = built.model().variable(built.max_retention());
        assert_eq!((ir.kind, ir.lower, ir.upper), (VarKind::Integer, 0.0, None));
        Ok(())
    }

    #[test]
    fn feasible_timetable_satisfies_model() -> anyhow::Result<()> {
        let curriculum = chain();
        let built = CurriculumModel::build(&curriculum, weights(0.2, 0.3, 0.5))?;
        let assignment = Assignment::from_periods(4, &[0, 0, 1, 1, 2, 3, 2, 3]);
        let values = built.values_for(&assignment);

        assert!(built.model().violated(&values)?.is_empty());

        let rd = built.relation_distance().evaluate(&values)?;
        #[allow(clippy::cast_precision_loss)]
        let expected = curriculum.relation_distance(&assignment) as f64;
        assert!((rd - expected).abs() < 1e-9);

        let criteria = curriculum.criteria(&assignment);
        let objective = built.model().objective().evaluate(&values)?;
        let expected = curriculum.objective(&built.weights(), &criteria);
        assert!((objective - expected).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn explicit_distances_feed_relation_distance() -> anyhow::Result<()> {
        let mut config = chain_config();
        config.distances = Some(vec![
            vec![0, 1, 4, 9],
            vec![50, 0, 2, 9],
            vec![50, 50, 0, 1],
            vec![50, 50, 50, 0],
        ]);
        let curriculum = Curriculum::try_from(config)?;
        let built = CurriculumModel::build(&curriculum, weights(0.0, 0.0, 1.0))?;
        let assignment = Assignment::from_periods(4, &[0, 1, 1, 2, 3, 1, 2, 3]);
        let values = built.values_for(&assignment);

        // Degree times explicit distance for 0->2, 2->4, 6->7, 1->3 and the backward 3->5.
        let expected = curriculum.relation_distance(&assignment);
        assert_eq!(expected, 9 * 1 + 9 * 9 + 9 * 1 + 5 * 2 + 2 * 50);
        assert!((built.relation_distance().evaluate(&values)? - 209.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn prerequisite_breach_violates_model() -> anyhow::Result<()> {
        let curriculum = small();
        let built = CurriculumModel::build(&curriculum, weights(1.0, 0.0, 0.0))?;
        let violated = |periods_of: &[usize]| {
            let assignment = Assignment::from_periods(2, periods_of);
            built.model().violated(&built.values_for(&assignment))
        };

        let early = violated(&[1, 0, 0, 1, 0, 1])?;
        assert!(early.iter().any(|name| name == "no_first_1"));

        let together = violated(&[1, 1, 0, 1, 0, 0])?;
        assert_eq!(together, vec!["prerequisite_1_0_1".to_string()]);
        Ok(())
    }

    #[test]
    fn malformed_weights_fail_construction() {
        let curriculum = small();
        let malformed = WeightTriple {
            load: 0.6,
            retention: 0.6,
            relation: 0.0,
        };
        assert!(matches!(
            CurriculumModel::build(&curriculum, malformed),
            Err(Error::ModelConstruction(_))
        ));
    }

    #[test]
    fn out_of_range_index_fails_construction() -> anyhow::Result<()> {
        let curriculum = small();
        let built = CurriculumModel::build(&curriculum, weights(1.0, 0.0, 0.0))?;
        let course = curriculum
            .course_id(0)
            .ok_or_else(|| anyhow::anyhow!("missing course"))?;
        assert!(matches!(built.x(course, 2), Err(Error::ModelConstruction(_))));
        Ok(())
    }

    proptest! {
        #[test]
        fn prop_model_agrees_with_checker(periods_of in proptest::collection::vec(0usize..4, 8)) {
            let curriculum = chain();
            let built = CurriculumModel::build(&curriculum, weights(0.4, 0.3, 0.3))
                .unwrap_or_else(|err| panic!("{err}"));
            let assignment = Assignment::from_periods(4, &periods_of);
            let criteria = curriculum.criteria(&assignment);

            let model_ok = built
                .model()
                .violated(&built.values_for(&assignment))
                .unwrap_or_else(|err| panic!("{err}"))
                .is_empty();
            let checker_ok = violations(&curriculum, &assignment, &criteria).is_empty();
            prop_assert_eq!(model_ok, checker_ok);
        }
    }
}
