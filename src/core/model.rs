use super::{Error, SolveStatus};
use std::fmt::{Display, Formatter};

/// Tolerance for constraint checks on solver output.
pub const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// Handle of a variable inside a [`Model`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct VarId(usize);

impl VarId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Domain of a variable.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VarKind {
    Binary,
    Integer,
    Continuous,
}

/// A decision variable with its bounds. `upper == None` means unbounded above.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    pub name: String,
    pub kind: VarKind,
    pub lower: f64,
    pub upper: Option<f64>,
}

/// Affine expression `sum(coefficient * variable) + constant`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinExpr {
    terms: Vec<(VarId, f64)>,
    constant: f64,
}

impl LinExpr {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an expression that is just a constant.
    #[must_use]
    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    /// Adds `coefficient * var`. Zero coefficients are dropped.
    pub fn add_term(&mut self, coefficient: f64, var: VarId) -> &mut Self {
        if coefficient != 0.0 {
            self.terms.push((var, coefficient));
        }
        self
    }

    pub fn add_constant(&mut self, value: f64) -> &mut Self {
        self.constant += value;
        self
    }

    /// Adds `factor * other`.
    pub fn add_scaled(&mut self, factor: f64, other: &Self) -> &mut Self {
        for &(var, coefficient) in &other.terms {
            self.add_term(factor * coefficient, var);
        }
        self.constant += factor * other.constant;
        self
    }

    #[must_use]
    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    #[must_use]
    pub const fn constant_term(&self) -> f64 {
        self.constant
    }

    /// Evaluates the expression for the given variable values.
    ///
    /// # Errors
    /// - If a referenced variable has no value.
    pub fn evaluate(&self, values: &[f64]) -> Result<f64, Error> {
        self.terms.iter().try_fold(self.constant, |sum, &(var, coefficient)| {
            value_of(values, var).map(|value| sum + coefficient * value)
        })
    }
}

impl FromIterator<(f64, VarId)> for LinExpr {
    fn from_iter<T: IntoIterator<Item = (f64, VarId)>>(iter: T) -> Self {
        let mut expr = Self::new();
        for (coefficient, var) in iter {
            expr.add_term(coefficient, var);
        }
        expr
    }
}

/// Comparison operator of a constraint.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Sense {
    Equal,
    LessEqual,
    GreaterEqual,
}

impl Display for Sense {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Equal => write!(f, "="),
            Self::LessEqual => write!(f, "<="),
            Self::GreaterEqual => write!(f, ">="),
        }
    }
}

/// Linear constraint `expr <sense> rhs`.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub expr: LinExpr,
    pub sense: Sense,
    pub rhs: f64,
}

impl Constraint {
    /// Returns whether the constraint holds for the given values.
    ///
    /// # Errors
    /// - If a referenced variable has no value.
    pub fn is_satisfied(&self, values: &[f64]) -> Result<bool, Error> {
        let lhs = self.expr.evaluate(values)?;
        Ok(match self.sense {
            Sense::Equal => (lhs - self.rhs).abs() <= FEASIBILITY_TOLERANCE,
            Sense::LessEqual => lhs <= self.rhs + FEASIBILITY_TOLERANCE,
            Sense::GreaterEqual => lhs >= self.rhs - FEASIBILITY_TOLERANCE,
        })
    }
}

/// Optimization direction.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Direction {
    #[default]
    Minimize,
    Maximize,
}

/// Solver-neutral mixed-integer linear program.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Model {
    name: String,
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
    objective: LinExpr,
    direction: Direction,
}

impl Model {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Declares a variable and returns its handle.
    pub fn add_var(
        &mut self,
        name: &str,
        kind: VarKind,
        lower: f64,
        upper: Option<f64>,
    ) -> VarId {
        let (lower, upper) = match kind {
            VarKind::Binary => (0.0, Some(1.0)),
            _ => (lower, upper),
        };
        self.variables.push(Variable {
            name: name.into(),
            kind,
            lower,
            upper,
        });
        VarId(self.variables.len() - 1)
    }

    pub fn add_binvar(&mut self, name: &str) -> VarId {
        self.add_var(name, VarKind::Binary, 0.0, Some(1.0))
    }

    pub fn add_constr(&mut self, name: &str, expr: LinExpr, sense: Sense, rhs: f64) {
        self.constraints.push(Constraint {
            name: name.into(),
            expr,
            sense,
            rhs,
        });
    }

    pub fn set_objective(&mut self, objective: LinExpr, direction: Direction) {
        self.objective = objective;
        self.direction = direction;
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    #[must_use]
    pub fn variable(&self, var: VarId) -> &Variable {
        &self.variables[var.0]
    }

    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    #[must_use]
    pub const fn objective(&self) -> &LinExpr {
        &self.objective
    }

    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns the constraints violated by the given values, including variable bounds
    /// and integrality.
    ///
    /// # Errors
    /// - If fewer values than variables are given.
    pub fn violated(&self, values: &[f64]) -> Result<Vec<String>, Error> {
        let mut violated = Vec::new();

        for (index, var) in self.variables.iter().enumerate() {
            let value = value_of(values, VarId(index))?;
            let integral = var.kind == VarKind::Continuous
                || (value - value.round()).abs() <= FEASIBILITY_TOLERANCE;
            let within = value >= var.lower - FEASIBILITY_TOLERANCE
                && var.upper.map_or(true, |upper| value <= upper + FEASIBILITY_TOLERANCE);
            if !integral || !within {
                violated.push(var.name.clone());
            }
        }

        for constraint in &self.constraints {
            if !constraint.is_satisfied(values)? {
                violated.push(constraint.name.clone());
            }
        }

        Ok(violated)
    }
}

/// Result of a successful solve.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub struct Solved {
    pub status: SolveStatus,
    /// Values indexed by [`VarId::index`].
    pub values: Vec<f64>,
    pub objective: f64,
    /// Wall time of the solve in seconds.
    pub runtime: f64,
}

impl Solved {
    #[must_use]
    pub const fn new(values: Vec<f64>, objective: f64, runtime: f64) -> Self {
        Self {
            status: SolveStatus::Optimal,
            values,
            objective,
            runtime,
        }
    }

    /// Returns the value of a variable.
    ///
    /// # Errors
    /// - If the solver returned no value for the variable.
    pub fn value(&self, var: VarId) -> Result<f64, Error> {
        value_of(&self.values, var)
    }
}

fn value_of(values: &[f64], var: VarId) -> Result<f64, Error> {
    values
        .get(var.0)
        .copied()
        .ok_or_else(|| Error::AttributeAccess(format!("X[{}]", var.0)))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn expressions_evaluate() -> anyhow::Result<()> {
        let mut model = Model::new("test");
        let x = model.add_binvar("x");
        let y = model.add_var("y", VarKind::Integer, 0.0, Some(10.0));

        let mut expr: LinExpr = [(2.0, x), (3.0, y)].into_iter().collect();
        expr.add_constant(1.0);
        assert_eq!(expr.evaluate(&[1.0, 4.0])?, 15.0);

        let mut scaled = LinExpr::constant(-1.0);
        scaled.add_scaled(0.5, &expr);
        assert_eq!(scaled.evaluate(&[0.0, 2.0])?, 2.5);
        Ok(())
    }

    #[test]
    fn zero_coefficients_are_dropped() {
        let mut expr = LinExpr::new();
        expr.add_term(0.0, VarId(0)).add_term(1.0, VarId(1));
        assert_eq!(expr.terms().len(), 1);
    }

    #[test]
    fn missing_values_are_attribute_errors() {
        let expr: LinExpr = [(1.0, VarId(3))].into_iter().collect();
        assert!(matches!(
            expr.evaluate(&[0.0]),
            Err(Error::AttributeAccess(_))
        ));
    }

    #[test]
    fn violations_cover_bounds_and_constraints() -> anyhow::Result<()> {
        let mut model = Model::new("test");
        let x = model.add_binvar("x");
        let c = model.add_var("c", VarKind::Integer, 2.0, Some(5.0));
        model.add_constr("link", [(1.0, c), (-4.0, x)].into_iter().collect(), Sense::LessEqual, 0.0);

        assert!(model.violated(&[1.0, 4.0])?.is_empty());
        assert_eq!(model.violated(&[0.0, 4.0])?, vec!["link".to_string()]);
        assert_eq!(model.violated(&[1.0, 1.0])?, vec!["c".to_string()]);
        assert_eq!(model.violated(&[0.5, 3.0])?, vec!["x".to_string(), "link".to_string()]);
        Ok(())
    }
}
