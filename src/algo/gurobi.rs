use crate::core::{Direction, Error, LinExpr, Model, Sense, SolveStatus, Solved, Solver, VarKind};
use grb::prelude::*;
use grb::{ModelSense, Status, VarType};

/// Gurobi backend. Requires a licensed installation at `GUROBI_PATH`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Gurobi;

impl Solver for Gurobi {
    fn solve(&mut self, model: &Model) -> Result<Solved, Error> {
        let mut gurobi = create_model(model.name()).map_err(fault)?;

        let vars = model
            .variables()
            .iter()
            .map(|var| match var.kind {
                VarKind::Binary => add_binvar!(gurobi, name: &var.name),
                VarKind::Integer => gurobi.add_var(
                    &var.name,
                    VarType::Integer,
                    0.0,
                    var.lower,
                    var.upper.unwrap_or(grb::INFINITY),
                    [],
                ),
                VarKind::Continuous => gurobi.add_var(
                    &var.name,
                    VarType::Continuous,
                    0.0,
                    var.lower,
                    var.upper.unwrap_or(grb::INFINITY),
                    [],
                ),
            })
            .collect::<grb::Result<Vec<Var>>>()
            .map_err(fault)?;

        let expression = |expr: &LinExpr| {
            let mut result = grb::expr::LinExpr::new();
            for &(var, coefficient) in expr.terms() {
                result.add_term(coefficient, vars[var.index()]);
            }
            result.add_constant(expr.constant_term());
            result
        };

        for constraint in model.constraints() {
            let lhs = expression(&constraint.expr);
            let rhs = constraint.rhs;
            let constraint_expr = match constraint.sense {
                Sense::Equal => c!(lhs == rhs),
                Sense::LessEqual => c!(lhs <= rhs),
                Sense::GreaterEqual => c!(lhs >= rhs),
            };
            gurobi
                .add_constr(&constraint.name, constraint_expr)
                .map_err(fault)?;
        }

        let sense = match model.direction() {
            Direction::Minimize => ModelSense::Minimize,
            Direction::Maximize => ModelSense::Maximize,
        };
        gurobi
            .set_objective(expression(model.objective()), sense)
            .map_err(fault)?;
        gurobi.optimize().map_err(fault)?;

        match gurobi.status().map_err(fault)? {
            Status::Optimal => {}
            Status::Infeasible => return Err(Error::solver(NAME, SolveStatus::Infeasible)),
            Status::Unbounded => return Err(Error::solver(NAME, SolveStatus::Unbounded)),
            Status::InfOrUnbd => {
                return Err(Error::solver(NAME, SolveStatus::InfeasibleOrUnbounded))
            }
            other => return Err(Error::solver(NAME, SolveStatus::Other(format!("{other:?}")))),
        }

        let values = vars
            .iter()
            .map(|var| gurobi.get_obj_attr(attr::X, var))
            .collect::<grb::Result<Vec<f64>>>()
            .map_err(|err| Error::AttributeAccess(err.to_string()))?;
        let objective = gurobi
            .get_attr(attr::ObjVal)
            .map_err(|err| Error::AttributeAccess(err.to_string()))?;
        let runtime = gurobi.get_attr(attr::Runtime).map_err(fault)?;

        Ok(Solved::new(values, objective, runtime))
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

#[allow(unsafe_code)]
#[linkme::distributed_slice(super::SOLVERS)]
static INSTANCE: fn() -> Box<dyn Solver> = || Box::new(Gurobi);

const NAME: &str = "gurobi";

fn create_model(name: &str) -> grb::Result<grb::Model> {
    let mut env = Env::new("")?;
    env.set(param::OutputFlag, 0)?;
    env.set(param::LogToConsole, 0)?;
    grb::Model::with_env(name, env)
}

fn fault(err: grb::Error) -> Error {
    Error::solver(NAME, SolveStatus::Other(err.to_string()))
}
