use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Termination status reported by a solver backend.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    InfeasibleOrUnbounded,
    /// Anything else, including internal faults of the backend.
    Other(String),
}

impl Display for SolveStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Optimal => write!(f, "optimal"),
            Self::Infeasible => write!(f, "infeasible"),
            Self::Unbounded => write!(f, "unbounded"),
            Self::InfeasibleOrUnbounded => write!(f, "infeasible or unbounded"),
            Self::Other(message) => write!(f, "{message}"),
        }
    }
}

/// Failure kinds of dataset validation, model construction and solving.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    /// Static curriculum data violates an invariant. Aborts before any solve.
    #[error("invalid dataset: {0}")]
    InvalidDataset(String),
    /// A weight triple is malformed or an index is out of range while emitting constraints.
    #[error("cannot build model: {0}")]
    ModelConstruction(String),
    /// The solver did not reach an optimal solution.
    #[error("solver `{solver}` failed: {status}")]
    Solver { solver: String, status: SolveStatus },
    /// A result value was read that the solver never produced.
    #[error("attribute `{0}` is not available")]
    AttributeAccess(String),
}

impl Error {
    pub(crate) fn dataset(message: impl Into<String>) -> Self {
        Self::InvalidDataset(message.into())
    }

    pub(crate) fn construction(message: impl Into<String>) -> Self {
        Self::ModelConstruction(message.into())
    }

    pub(crate) fn solver(solver: &str, status: SolveStatus) -> Self {
        Self::Solver {
            solver: solver.into(),
            status,
        }
    }

    /// Returns whether the error must stop a whole sweep rather than a single weight triple.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidDataset(_))
    }
}
