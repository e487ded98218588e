use super::Error;
use ahash::{HashSet, HashSetExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Relatedness degree from which a course may not precede the course it relates to.
pub const MODERATE_RELATION: u8 = 3;
/// Relatedness degree reserved for direct prerequisite pairs.
pub const PREREQUISITE_RELATION: u8 = 9;
/// Maximum period gap between the two courses of a prerequisite-strength pair.
pub const MAX_PREREQUISITE_GAP: usize = 2;
/// Last period index a leveling course may occupy.
pub const LAST_LEVELING_PERIOD: usize = 1;

/// Validated index of a course in its curriculum.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CourseId(usize);

impl CourseId {
    /// Returns the position of the course in the curriculum.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl Display for CourseId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive `[min, max]` range.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Bounds<T> {
    pub min: T,
    pub max: T,
}

impl<T> Bounds<T> {
    #[must_use]
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }
}

impl Bounds<f64> {
    /// Rescales `value` so that `min` maps to 0 and `max` maps to 1.
    #[must_use]
    pub fn normalize(&self, value: f64) -> f64 {
        (value - self.min) / self.span()
    }

    /// Returns `max - min`.
    #[must_use]
    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Empirical bounds used to bring the three criteria to a comparable range.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct NormalizationBounds {
    pub load: Bounds<f64>,
    pub retention: Bounds<f64>,
    pub relation: Bounds<f64>,
}

/// A course of the curriculum.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub struct Course {
    pub id: CourseId,
    pub code: String,
    pub title: String,
    pub credits: u32,
    /// Historical failure percentage.
    pub retention: f64,
    pub prerequisites: Vec<CourseId>,
}

/// Code and title of a course as written in a curriculum file.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct CourseLabel {
    pub code: String,
    #[serde(default)]
    pub title: String,
}

/// Unvalidated curriculum as found in configuration files.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CurriculumConfig {
    #[serde(default)]
    pub name: String,
    pub periods: usize,
    pub courses_per_period: Bounds<usize>,
    pub load_per_period: Bounds<u32>,
    pub normalization: NormalizationBounds,
    #[serde(default)]
    pub leveling: Vec<usize>,
    #[serde(default)]
    pub penultimate: Vec<usize>,
    #[serde(default)]
    pub last: Vec<usize>,
    pub courses: Vec<CourseLabel>,
    pub credits: Vec<u32>,
    pub retention: Vec<f64>,
    #[serde(default)]
    pub prerequisites: BTreeMap<usize, Vec<usize>>,
    pub relatedness: Vec<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distances: Option<Vec<Vec<u32>>>,
}

/// Penalty for placing related courses `from` one period `to` another.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DistanceMatrix {
    periods: usize,
    values: Vec<u32>,
}

impl DistanceMatrix {
    /// Distance used when the later course would be placed before the earlier one.
    pub const BACKWARD: u32 = 100;

    /// Creates the default matrix: squared forward gap, `BACKWARD` otherwise.
    #[must_use]
    pub fn quadratic(periods: usize) -> Self {
        let mut values = Vec::with_capacity(periods * periods);
        for from in 0..periods {
            for to in 0..periods {
                values.push(match to.checked_sub(from) {
                    Some(gap) => u32::try_from(gap * gap).unwrap_or(u32::MAX),
                    None => Self::BACKWARD,
                });
            }
        }
        Self { periods, values }
    }

    /// Creates a matrix from explicit rows.
    ///
    /// # Errors
    /// - If the matrix is not `periods` x `periods`.
    /// - If a diagonal entry is not zero.
    /// - If a row is not strictly increasing after its diagonal.
    /// - If a backward entry is zero.
    pub fn from_rows(periods: usize, rows: &[Vec<u32>]) -> Result<Self, Error> {
        if rows.len() != periods || rows.iter().any(|row| row.len() != periods) {
            return Err(Error::dataset(format!(
                "distance matrix must be {periods}x{periods}"
            )));
        }

        for (from, row) in rows.iter().enumerate() {
            if row[from] != 0 {
                return Err(Error::dataset(format!("distance({from}, {from}) must be 0")));
            }
            if row[from..].windows(2).any(|pair| pair[0] >= pair[1]) {
                return Err(Error::dataset(format!(
                    "distances from period {from} must grow with the forward gap"
                )));
            }
            if row[..from].contains(&0) {
                return Err(Error::dataset(format!(
                    "backward distances from period {from} must be positive"
                )));
            }
        }

        let values = rows.iter().flatten().copied().collect();
        Ok(Self { periods, values })
    }

    /// Returns the distance between two periods.
    #[must_use]
    pub fn get(&self, from: usize, to: usize) -> u32 {
        self.values[from * self.periods + to]
    }

    /// Returns the matrix as rows.
    #[must_use]
    pub fn rows(&self) -> Vec<Vec<u32>> {
        self.values.chunks(self.periods).map(<[u32]>::to_vec).collect()
    }
}

/// A validated curriculum. Immutable after construction.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(try_from = "CurriculumConfig", into = "CurriculumConfig")]
pub struct Curriculum {
    name: String,
    courses: Vec<Course>,
    relatedness: Vec<Vec<u8>>,
    periods: usize,
    courses_per_period: Bounds<usize>,
    load_per_period: Bounds<u32>,
    normalization: NormalizationBounds,
    leveling: Vec<CourseId>,
    penultimate: Vec<CourseId>,
    last: Vec<CourseId>,
    distances: DistanceMatrix,
    explicit_distances: bool,
}

impl Curriculum {
    /// Returns the instance label.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns all courses ordered by id.
    #[must_use]
    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    /// Returns the course with the given id.
    #[must_use]
    pub fn course(&self, id: CourseId) -> &Course {
        &self.courses[id.0]
    }

    /// Returns the id of the course at `index`, if there is one.
    #[must_use]
    pub fn course_id(&self, index: usize) -> Option<CourseId> {
        (index < self.courses.len()).then_some(CourseId(index))
    }

    /// Returns an iterator over all course ids.
    pub fn course_ids(&self) -> impl Iterator<Item = CourseId> {
        (0..self.courses.len()).map(CourseId)
    }

    /// Returns the relatedness degree of `from` towards `to`.
    #[must_use]
    pub fn relatedness(&self, from: CourseId, to: CourseId) -> u8 {
        self.relatedness[from.0][to.0]
    }

    /// Returns the number of periods.
    #[must_use]
    pub const fn periods(&self) -> usize {
        self.periods
    }

    #[must_use]
    pub const fn courses_per_period(&self) -> Bounds<usize> {
        self.courses_per_period
    }

    #[must_use]
    pub const fn load_per_period(&self) -> Bounds<u32> {
        self.load_per_period
    }

    #[must_use]
    pub const fn normalization(&self) -> &NormalizationBounds {
        &self.normalization
    }

    /// Courses that must be placed in one of the first two periods.
    #[must_use]
    pub fn leveling(&self) -> &[CourseId] {
        &self.leveling
    }

    /// Courses fixed to the period before the last one.
    #[must_use]
    pub fn penultimate(&self) -> &[CourseId] {
        &self.penultimate
    }

    /// Courses fixed to the last period.
    #[must_use]
    pub fn last(&self) -> &[CourseId] {
        &self.last
    }

    #[must_use]
    pub const fn distances(&self) -> &DistanceMatrix {
        &self.distances
    }
}

impl TryFrom<CurriculumConfig> for Curriculum {
    type Error = Error;

    fn try_from(config: CurriculumConfig) -> Result<Self, Self::Error> {
        let n = config.courses.len();

        if config.credits.len() != n {
            return Err(Error::dataset(format!(
                "{} credit values given for {n} courses",
                config.credits.len()
            )));
        }
        if config.retention.len() != n {
            return Err(Error::dataset(format!(
                "{} retention values given for {n} courses",
                config.retention.len()
            )));
        }
        if config.relatedness.len() != n || config.relatedness.iter().any(|row| row.len() != n) {
            return Err(Error::dataset(format!("relatedness matrix must be {n}x{n}")));
        }
        if let Some(i) = config.credits.iter().position(|&credits| credits == 0) {
            return Err(Error::dataset(format!("course {i} has no credits")));
        }
        if let Some(i) = config.retention.iter().position(|r| !r.is_finite() || *r < 0.0) {
            return Err(Error::dataset(format!(
                "course {i} has an invalid retention index"
            )));
        }
        if config.relatedness.iter().flatten().any(|&degree| degree > PREREQUISITE_RELATION) {
            return Err(Error::dataset(format!(
                "relatedness degrees must be at most {PREREQUISITE_RELATION}"
            )));
        }

        validate_periods(&config)?;
        validate_normalization(&config.normalization)?;

        let id = |index: usize, what: &str| {
            (index < n)
                .then_some(CourseId(index))
                .ok_or_else(|| Error::dataset(format!("{what} references unknown course {index}")))
        };

        let mut prerequisites = vec![Vec::new(); n];
        for (&course, required) in &config.prerequisites {
            let course = id(course, "prerequisite map")?;
            for &pr in required {
                let pr = id(pr, "prerequisite list")?;
                if pr == course {
                    return Err(Error::dataset(format!("course {course} requires itself")));
                }
                if !prerequisites[course.0].contains(&pr) {
                    prerequisites[course.0].push(pr);
                }
            }
        }
        check_acyclic(&prerequisites)?;

        for (from, row) in config.relatedness.iter().enumerate() {
            for (to, &degree) in row.iter().enumerate() {
                if degree == PREREQUISITE_RELATION && !prerequisites[to].contains(&CourseId(from)) {
                    return Err(Error::dataset(format!(
                        "relatedness {from}->{to} is {PREREQUISITE_RELATION} but course {from} is not a prerequisite of course {to}"
                    )));
                }
            }
        }

        let ids = |list: &[usize], what: &str| -> Result<Vec<CourseId>, Error> {
            list.iter().map(|&index| id(index, what)).collect()
        };
        let leveling = ids(&config.leveling, "leveling set")?;
        let penultimate = ids(&config.penultimate, "penultimate set")?;
        let last = ids(&config.last, "last period set")?;

        if let Some(course) = penultimate.iter().find(|course| last.contains(course)) {
            return Err(Error::dataset(format!(
                "course {course} is fixed to both the penultimate and the last period"
            )));
        }

        let (distances, explicit_distances) = match &config.distances {
            Some(rows) => (DistanceMatrix::from_rows(config.periods, rows)?, true),
            None => (DistanceMatrix::quadratic(config.periods), false),
        };

        let courses = config
            .courses
            .into_iter()
            .zip(config.credits)
            .zip(config.retention)
            .zip(prerequisites)
            .enumerate()
            .map(|(i, (((label, credits), retention), prerequisites))| Course {
                id: CourseId(i),
                code: label.code,
                title: label.title,
                credits,
                retention,
                prerequisites,
            })
            .collect();

        Ok(Self {
            name: config.name,
            courses,
            relatedness: config.relatedness,
            periods: config.periods,
            courses_per_period: config.courses_per_period,
            load_per_period: config.load_per_period,
            normalization: config.normalization,
            leveling,
            penultimate,
            last,
            distances,
            explicit_distances,
        })
    }
}

impl From<Curriculum> for CurriculumConfig {
    fn from(curriculum: Curriculum) -> Self {
        let distances = curriculum
            .explicit_distances
            .then(|| curriculum.distances.rows());
        let raw = |ids: Vec<CourseId>| ids.into_iter().map(CourseId::index).collect();

        let mut courses = Vec::with_capacity(curriculum.courses.len());
        let mut credits = Vec::with_capacity(curriculum.courses.len());
        let mut retention = Vec::with_capacity(curriculum.courses.len());
        let mut prerequisites = BTreeMap::new();

        for course in curriculum.courses {
            if !course.prerequisites.is_empty() {
                prerequisites.insert(course.id.0, raw(course.prerequisites));
            }
            courses.push(CourseLabel {
                code: course.code,
                title: course.title,
            });
            credits.push(course.credits);
            retention.push(course.retention);
        }

        Self {
            name: curriculum.name,
            periods: curriculum.periods,
            courses_per_period: curriculum.courses_per_period,
            load_per_period: curriculum.load_per_period,
            normalization: curriculum.normalization,
            leveling: raw(curriculum.leveling),
            penultimate: raw(curriculum.penultimate),
            last: raw(curriculum.last),
            courses,
            credits,
            retention,
            prerequisites,
            relatedness: curriculum.relatedness,
            distances,
        }
    }
}

fn validate_periods(config: &CurriculumConfig) -> Result<(), Error> {
    if config.periods < 2 {
        return Err(Error::dataset(format!(
            "at least 2 periods are required, got {}",
            config.periods
        )));
    }
    if config.courses_per_period.min > config.courses_per_period.max {
        return Err(Error::dataset("minimum courses per period exceeds the maximum"));
    }
    if config.load_per_period.min > config.load_per_period.max {
        return Err(Error::dataset("minimum load per period exceeds the maximum"));
    }
    Ok(())
}

fn validate_normalization(bounds: &NormalizationBounds) -> Result<(), Error> {
    let criteria = [
        ("load", bounds.load),
        ("retention", bounds.retention),
        ("relation", bounds.relation),
    ];

    for (name, range) in criteria {
        if !range.min.is_finite() || !range.max.is_finite() {
            return Err(Error::dataset(format!("{name} normalization bounds must be finite")));
        }
        if range.max <= range.min {
            return Err(Error::dataset(format!(
                "{name} normalization requires max > min, got [{}, {}]",
                range.min, range.max
            )));
        }
    }
    Ok(())
}

/// Rejects prerequisite cycles with an iterative depth-first search.
fn check_acyclic(prerequisites: &[Vec<CourseId>]) -> Result<(), Error> {
    let mut finished = HashSet::new();

    for root in 0..prerequisites.len() {
        if finished.contains(&root) {
            continue;
        }

        let mut on_path = vec![false; prerequisites.len()];
        let mut stack = vec![(root, 0)];
        on_path[root] = true;

        while let Some((course, next)) = stack.pop() {
            if let Some(&pr) = prerequisites[course].get(next) {
                stack.push((course, next + 1));
                if on_path[pr.0] {
                    return Err(Error::dataset(format!(
                        "prerequisite cycle through course {}",
                        pr.0
                    )));
                }
                if !finished.contains(&pr.0) {
                    on_path[pr.0] = true;
                    stack.push((pr.0, 0));
                }
            } else {
                on_path[course] = false;
                finished.insert(course);
            }
        }
    }

    Ok(())
}
