#[cfg(feature = "gurobi")]
mod gurobi;
mod microlp;

use crate::core::Solver;

#[cfg(feature = "gurobi")]
pub use gurobi::Gurobi;
pub use microlp::MicroLp;

/// Every solver backend compiled into the binary.
#[allow(unsafe_code)]
#[linkme::distributed_slice]
pub static SOLVERS: [fn() -> Box<dyn Solver>];

/// Creates the solver registered under the given name.
#[must_use]
pub fn by_name(name: &str) -> Option<Box<dyn Solver>> {
    SOLVERS
        .iter()
        .map(|init| init())
        .find(|solver| solver.name() == name)
}
