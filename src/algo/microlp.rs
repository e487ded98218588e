use crate::core::{Direction, Error, Model, Sense, SolveStatus, Solved, Solver, VarKind};
use good_lp::solvers::microlp::microlp;
use good_lp::{
    constraint, variable, Expression, ProblemVariables, ResolutionError, Solution, SolverModel,
    Variable,
};
use std::time::Instant;

/// Pure Rust branch and bound backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct MicroLp;

impl Solver for MicroLp {
    fn solve(&mut self, model: &Model) -> Result<Solved, Error> {
        let start = Instant::now();

        let mut problem = ProblemVariables::new();
        let vars: Vec<Variable> = model
            .variables()
            .iter()
            .map(|var| {
                let definition = match var.kind {
                    VarKind::Binary => variable().binary(),
                    VarKind::Integer => variable().integer().min(var.lower),
                    VarKind::Continuous => variable().min(var.lower),
                };
                let definition = match (var.kind, var.upper) {
                    (VarKind::Binary, _) | (_, None) => definition,
                    (_, Some(upper)) => definition.max(upper),
                };
                problem.add(definition.name(&var.name))
            })
            .collect();

        let expression = |expr: &crate::core::LinExpr| {
            let mut result = Expression::from(expr.constant_term());
            for &(var, coefficient) in expr.terms() {
                result.add_mul(coefficient, vars[var.index()]);
            }
            result
        };

        let objective = expression(model.objective());
        let mut lp = match model.direction() {
            Direction::Minimize => problem.minimise(objective).using(microlp),
            Direction::Maximize => problem.maximise(objective).using(microlp),
        };

        for c in model.constraints() {
            let lhs = expression(&c.expr);
            lp.add_constraint(match c.sense {
                Sense::Equal => constraint!(lhs == c.rhs),
                Sense::LessEqual => constraint!(lhs <= c.rhs),
                Sense::GreaterEqual => constraint!(lhs >= c.rhs),
            });
        }

        let solution = lp
            .solve()
            .map_err(|err| Error::solver(self.name(), status(err)))?;

        let values: Vec<f64> = vars.iter().map(|&var| solution.value(var)).collect();
        let objective = model.objective().evaluate(&values)?;
        let runtime = start.elapsed().as_secs_f64();

        log::debug!("{} solved in {runtime:.3}s", model.name());

        Ok(Solved::new(values, objective, runtime))
    }

    fn name(&self) -> &'static str {
        "microlp"
    }
}

#[allow(unsafe_code)]
#[linkme::distributed_slice(super::SOLVERS)]
static INSTANCE: fn() -> Box<dyn Solver> = || Box::new(MicroLp);

fn status(err: ResolutionError) -> SolveStatus {
    match err {
        ResolutionError::Infeasible => SolveStatus::Infeasible,
        ResolutionError::Unbounded => SolveStatus::Unbounded,
        other => SolveStatus::Other(other.to_string()),
    }
}
