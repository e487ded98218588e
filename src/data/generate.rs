#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
use crate::core::{
    Bounds, CourseLabel, Curriculum, CurriculumConfig, DistanceMatrix, NormalizationBounds,
    MODERATE_RELATION, PREREQUISITE_RELATION,
};
use anyhow::{bail, Result};
use rand::prelude::*;
use rand::rngs::StdRng;
use std::collections::BTreeMap;

const CREDITS: [u32; 4] = [2, 3, 4, 6];

/// Parameters of a random curriculum.
#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    pub name: String,
    pub courses: usize,
    pub periods: usize,
    /// Chance that a course outside the first period gets a prerequisite.
    pub prerequisite_ratio: f64,
    /// Chance that an ordered pair of courses gets a moderate relation.
    pub relation_ratio: f64,
    pub seed: Option<u64>,
}

impl GeneratorConfig {
    #[must_use]
    pub fn new(courses: usize, periods: usize) -> Self {
        Self {
            name: format!("generated_{courses}_{periods}"),
            courses,
            periods,
            prerequisite_ratio: 0.3,
            relation_ratio: 0.05,
            seed: None,
        }
    }
}

/// Generates a random curriculum that is feasible by construction.
///
/// Every course gets a target period spreading courses evenly. Prerequisites come from one
/// or two periods earlier and carry relatedness 9, other relations never point backwards,
/// and the load and count ranges are taken from the target layout.
///
/// # Errors
/// - If there are fewer than two periods or fewer courses than periods.
pub fn generate(config: &GeneratorConfig) -> Result<Curriculum> {
    let (n, periods) = (config.courses, config.periods);
    if periods < 2 || n < periods {
        bail!("cannot spread {n} courses over {periods} periods");
    }

    let mut rng = config
        .seed
        .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);

    let target: Vec<usize> = (0..n).map(|i| i * periods / n).collect();
    let credits: Vec<u32> = (0..n)
        .map(|_| CREDITS.choose(&mut rng).copied().unwrap_or(4))
        .collect();
    let retention: Vec<f64> = (0..n).map(|_| f64::from(rng.gen_range(1..=60u32))).collect();

    let mut relatedness = vec![vec![0u8; n]; n];
    let mut prerequisites: BTreeMap<usize, Vec<usize>> = BTreeMap::new();

    for course in 0..n {
        if target[course] == 0 || !rng.gen_bool(config.prerequisite_ratio) {
            continue;
        }
        let candidates: Vec<usize> = (0..n)
            .filter(|&pr| target[pr] < target[course] && target[course] - target[pr] <= 2)
            .collect();
        if let Some(&pr) = candidates.choose(&mut rng) {
            prerequisites.entry(course).or_default().push(pr);
            relatedness[pr][course] = PREREQUISITE_RELATION;
        }
    }

    for from in 0..n {
        for to in 0..n {
            if from != to
                && relatedness[from][to] == 0
                && target[from] <= target[to]
                && rng.gen_bool(config.relation_ratio)
            {
                relatedness[from][to] = rng.gen_range(1..PREREQUISITE_RELATION);
            }
        }
    }

    let mut loads = vec![0; periods];
    let mut counts = vec![0; periods];
    for (course, &period) in target.iter().enumerate() {
        loads[period] += credits[course];
        counts[period] += 1;
    }
    let min_load = loads.iter().copied().min().unwrap_or_default();
    let max_load = loads.iter().copied().max().unwrap_or_default();
    let max_count = counts.iter().copied().max().unwrap_or_default();

    let in_period = |period: usize| {
        let courses = target.iter().enumerate();
        courses.filter(move |&(_, &p)| p == period).map(|(course, _)| course)
    };
    let leveling: Vec<usize> = in_period(0)
        .filter(|course| !prerequisites.contains_key(course))
        .take(3)
        .collect();
    let penultimate: Vec<usize> = in_period(periods - 2).take(1).collect();
    let last: Vec<usize> = in_period(periods - 1).take(1).collect();

    let total_load: u32 = credits.iter().sum();
    let total_retention: f64 = retention.iter().sum();
    let distances = DistanceMatrix::quadratic(periods);
    let worst_distance = (0..periods)
        .flat_map(|from| (0..periods).map(move |to| (from, to)))
        .map(|(from, to)| distances.get(from, to))
        .max()
        .unwrap_or_default();
    let total_relation: u32 = relatedness.iter().flatten().map(|&d| u32::from(d)).sum();

    let balanced_load = (f64::from(total_load) / periods as f64).ceil();
    let normalization = NormalizationBounds {
        load: Bounds::new(balanced_load, f64::from(max_load + 4).max(balanced_load + 1.0)),
        retention: Bounds::new(total_retention / periods as f64, total_retention),
        relation: Bounds::new(0.0, f64::from((total_relation * worst_distance).max(1))),
    };

    log::debug!(
        "generated {n} courses over {periods} periods with {} prerequisites and {} moderate relations",
        prerequisites.len(),
        relatedness
            .iter()
            .flatten()
            .filter(|&&d| (MODERATE_RELATION..PREREQUISITE_RELATION).contains(&d))
            .count()
    );

    let config = CurriculumConfig {
        name: config.name.clone(),
        periods,
        courses_per_period: Bounds::new(1, max_count + 1),
        load_per_period: Bounds::new(min_load, max_load + 4),
        normalization,
        leveling,
        penultimate,
        last,
        courses: (0..n)
            .map(|i| CourseLabel {
                code: format!("GEN{i:03}"),
                title: format!("Course {i}"),
            })
            .collect(),
        credits,
        retention,
        prerequisites,
        relatedness,
        distances: None,
    };

    Ok(Curriculum::try_from(config)?)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::check::violations;
    use crate::core::Assignment;

    fn layout(curriculum: &Curriculum) -> Assignment {
        let n = curriculum.courses().len();
        let periods = curriculum.periods();
        let target: Vec<usize> = (0..n).map(|i| i * periods / n).collect();
        Assignment::from_periods(periods, &target)
    }

    #[test]
    fn seeded_generation_is_reproducible() -> Result<()> {
        let mut config = GeneratorConfig::new(20, 5);
        config.seed = Some(7);
        assert_eq!(generate(&config)?, generate(&config)?);
        Ok(())
    }

    #[test]
    fn target_layout_is_feasible() -> Result<()> {
        for seed in 0..20 {
            let mut config = GeneratorConfig::new(24, 6);
            config.seed = Some(seed);
            config.prerequisite_ratio = 0.6;
            config.relation_ratio = 0.2;
            let curriculum = generate(&config)?;

            let assignment = layout(&curriculum);
            let criteria = curriculum.criteria(&assignment);
            let found = violations(&curriculum, &assignment, &criteria);
            assert!(found.is_empty(), "seed {seed}: {found:?}");
        }
        Ok(())
    }

    #[test]
    fn too_few_courses_are_rejected() {
        assert!(generate(&GeneratorConfig::new(3, 4)).is_err());
        assert!(generate(&GeneratorConfig::new(3, 1)).is_err());
    }
}
