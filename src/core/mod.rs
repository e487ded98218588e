mod builder;
pub mod check;
pub(crate) mod dataset;
mod error;
mod model;
mod solution;
pub mod sweep;
pub mod weights;

pub use builder::*;
pub use dataset::*;
pub use error::*;
pub use model::*;
pub use solution::*;
pub use sweep::{Reporter, Sweep, SweepFailure, SweepReport};
pub use weights::{WeightStep, WeightTriple};

/// Solves mixed-integer linear programs.
pub trait Solver {
    /// Solves the model to optimality.
    ///
    /// # Errors
    /// - If the backend fails or the model has no optimal solution.
    fn solve(&mut self, model: &Model) -> Result<Solved, Error>;

    /// Returns the name the solver is registered under.
    fn name(&self) -> &'static str;
}
