#![allow(clippy::cast_precision_loss)]
use super::Error;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Default number of steps the unit weight is divided into (granularity 0.1).
pub const DEFAULT_STEPS: u32 = 10;
/// Tolerance used when checking that a weight triple sums to one.
pub const WEIGHT_TOLERANCE: f64 = 1e-9;

/// Scalarization coefficients of the load, retention and relatedness criteria.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct WeightTriple {
    pub load: f64,
    pub retention: f64,
    pub relation: f64,
}

impl WeightTriple {
    /// Creates a weight triple.
    ///
    /// # Errors
    /// - If a weight is outside `[0, 1]` or the weights do not sum to 1.
    pub fn new(load: f64, retention: f64, relation: f64) -> Result<Self, Error> {
        let weights = Self {
            load,
            retention,
            relation,
        };
        weights.validate()?;
        Ok(weights)
    }

    /// Checks that every weight is within `[0, 1]` and that they sum to 1.
    ///
    /// # Errors
    /// - If the triple is malformed.
    pub fn validate(&self) -> Result<(), Error> {
        let weights = [self.load, self.retention, self.relation];

        if weights.iter().any(|w| !w.is_finite() || *w < 0.0 || *w > 1.0) {
            return Err(Error::construction(format!(
                "weights must lie within [0, 1], got {self}"
            )));
        }

        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(Error::construction(format!(
                "weights must sum to 1, got {self} (sum {sum})"
            )));
        }

        Ok(())
    }
}

impl Display for WeightTriple {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?}, {:?}, {:?})", self.load, self.retention, self.relation)
    }
}

/// Integer position of a weight triple in the sweep grid.
/// The relation share is implied: `steps - load - retention`.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct WeightStep {
    load: u32,
    retention: u32,
    steps: u32,
}

impl WeightStep {
    /// Creates a grid position.
    ///
    /// # Errors
    /// - If `steps` is zero or `load + retention` exceeds it.
    pub fn new(load: u32, retention: u32, steps: u32) -> Result<Self, Error> {
        if steps == 0 || !matches!(load.checked_add(retention), Some(sum) if sum <= steps) {
            return Err(Error::construction(format!(
                "{load}/{retention} is not a position of a {steps} step grid"
            )));
        }
        Ok(Self {
            load,
            retention,
            steps,
        })
    }

    #[must_use]
    pub const fn load(&self) -> u32 {
        self.load
    }

    #[must_use]
    pub const fn retention(&self) -> u32 {
        self.retention
    }

    /// Returns the relation share of the step.
    #[must_use]
    pub const fn relation(&self) -> u32 {
        self.steps - self.load - self.retention
    }

    /// Returns the number of steps the unit weight is divided into.
    #[must_use]
    pub const fn steps(&self) -> u32 {
        self.steps
    }

    /// Converts the grid position into weights.
    #[must_use]
    pub fn weights(&self) -> WeightTriple {
        let steps = f64::from(self.steps);
        WeightTriple {
            load: f64::from(self.load) / steps,
            retention: f64::from(self.retention) / steps,
            relation: f64::from(self.relation()) / steps,
        }
    }
}

impl Display for WeightStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.load, self.retention, self.relation())
    }
}

/// Enumerates every weight grid position with `load + retention + relation == steps`.
/// Load is the outer loop and retention the inner one, so the order is stable across runs.
pub fn enumerate(steps: u32) -> impl Iterator<Item = WeightStep> {
    (0..=steps).flat_map(move |load| {
        (0..=steps - load).map(move |retention| WeightStep {
            load,
            retention,
            steps,
        })
    })
}

/// Returns the number of grid positions for `steps`, `C(steps + 2, 2)`.
#[must_use]
pub const fn combinations(steps: u32) -> usize {
    let steps = steps as usize;
    (steps + 1) * (steps + 2) / 2
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_grid_has_66_triples() {
        let steps: Vec<_> = enumerate(DEFAULT_STEPS).collect();
        assert_eq!(steps.len(), 66);
        assert_eq!(combinations(DEFAULT_STEPS), 66);

        let mut unique = steps.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 66);
    }

    #[test]
    fn every_triple_sums_to_one() {
        for step in enumerate(DEFAULT_STEPS) {
            let weights = step.weights();
            let sum = weights.load + weights.retention + weights.relation;
            assert!((sum - 1.0).abs() < WEIGHT_TOLERANCE, "{step} sums to {sum}");
            assert!(weights.validate().is_ok());
        }
    }

    #[test]
    fn enumeration_order_is_nested() {
        let steps: Vec<_> = enumerate(DEFAULT_STEPS).collect();
        assert_eq!(steps[0].weights(), WeightTriple::new(0.0, 0.0, 1.0).unwrap_or_else(|e| panic!("{e}")));
        assert_eq!((steps[1].load(), steps[1].retention(), steps[1].relation()), (0, 1, 9));
        assert_eq!((steps[10].load(), steps[10].retention(), steps[10].relation()), (0, 10, 0));
        assert_eq!((steps[11].load(), steps[11].retention(), steps[11].relation()), (1, 0, 9));
        assert_eq!((steps[65].load(), steps[65].retention(), steps[65].relation()), (10, 0, 0));
        assert!(steps.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn grid_positions_stay_on_the_grid() -> Result<(), Error> {
        let step = WeightStep::new(3, 2, 10)?;
        assert_eq!(step.relation(), 5);
        assert_eq!(step.to_string(), "3/2/5");
        assert_eq!(Some(step), enumerate(10).find(|s| (s.load(), s.retention()) == (3, 2)));

        assert!(WeightStep::new(10, 0, 10).is_ok());
        assert!(matches!(WeightStep::new(6, 5, 10), Err(Error::ModelConstruction(_))));
        assert!(WeightStep::new(u32::MAX, 1, 10).is_err());
        assert!(WeightStep::new(0, 0, 0).is_err());
        Ok(())
    }

    #[test]
    fn malformed_triples_are_rejected() {
        assert!(matches!(
            WeightTriple::new(0.5, 0.5, 0.5),
            Err(Error::ModelConstruction(_))
        ));
        assert!(WeightTriple::new(1.2, -0.2, 0.0).is_err());
        assert!(WeightTriple::new(f64::NAN, 0.5, 0.5).is_err());
        assert!(WeightTriple::new(0.1, 0.2, 0.7).is_ok());
    }

    proptest! {
        #[test]
        fn prop_grid_covers_all_integer_triples(steps in 1u32..25) {
            let grid: Vec<_> = enumerate(steps).collect();
            prop_assert_eq!(grid.len(), combinations(steps));
            for step in &grid {
                prop_assert_eq!(step.load() + step.retention() + step.relation(), steps);
                let weights = step.weights();
                prop_assert!((weights.load + weights.retention + weights.relation - 1.0).abs() < WEIGHT_TOLERANCE);
            }
        }

        #[test]
        fn prop_off_simplex_triples_are_rejected(
            load in 0.0f64..1.0,
            retention in 0.0f64..1.0,
            excess in 0.001f64..0.5,
        ) {
            let relation = (1.0 - load - retention).max(0.0) + excess;
            prop_assert!(WeightTriple::new(load, retention, relation).is_err());
        }
    }
}
