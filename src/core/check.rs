use super::dataset::{
    LAST_LEVELING_PERIOD, MAX_PREREQUISITE_GAP, MODERATE_RELATION, PREREQUISITE_RELATION,
};
use super::{Assignment, CourseId, Criteria, Curriculum};
use std::fmt::{Display, Formatter};

/// A broken curriculum rule.
#[derive(Clone, Debug, PartialEq)]
pub enum Violation {
    /// The course does not occupy exactly one period.
    SingleAssignment { course: CourseId },
    /// A leveling course lies after the second period.
    Leveling { course: CourseId, period: usize },
    /// A course is not in the period it is fixed to.
    FixedPeriod { course: CourseId, expected: usize },
    /// A course with prerequisites lies in the first period.
    PrerequisiteInFirstPeriod { course: CourseId },
    /// A course is not strictly after one of its prerequisites.
    PrerequisiteOrder { course: CourseId, prerequisite: CourseId },
    /// A period load is below the minimum or above the load envelope `C`.
    PeriodLoad { period: usize, load: u32 },
    /// The load envelope `C` is outside the allowed per-period load range.
    LoadEnvelope { load: u32 },
    /// A period holds too few or too many courses.
    PeriodCourseCount { period: usize, count: usize },
    /// A period retention sum exceeds the retention envelope `IR`.
    PeriodRetention { period: usize, retention: f64 },
    /// A course is placed before a course it is moderately related to.
    RelatednessOrder { from: CourseId, to: CourseId },
    /// A prerequisite-strength pair is more than two periods apart.
    RelatednessProximity { from: CourseId, to: CourseId },
}

impl Display for Violation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SingleAssignment { course } => {
                write!(f, "course {course} does not occupy exactly one period")
            }
            Self::Leveling { course, period } => {
                write!(f, "leveling course {course} is in period {period}")
            }
            Self::FixedPeriod { course, expected } => {
                write!(f, "course {course} must be in period {expected}")
            }
            Self::PrerequisiteInFirstPeriod { course } => {
                write!(f, "course {course} has prerequisites but is in the first period")
            }
            Self::PrerequisiteOrder {
                course,
                prerequisite,
            } => write!(f, "course {course} is not after its prerequisite {prerequisite}"),
            Self::PeriodLoad { period, load } => {
                write!(f, "period {period} has load {load} outside the allowed range")
            }
            Self::LoadEnvelope { load } => write!(f, "maximum load {load} is out of bounds"),
            Self::PeriodCourseCount { period, count } => {
                write!(f, "period {period} holds {count} courses")
            }
            Self::PeriodRetention { period, retention } => {
                write!(f, "period {period} retention {retention} exceeds the envelope")
            }
            Self::RelatednessOrder { from, to } => {
                write!(f, "course {to} is placed before related course {from}")
            }
            Self::RelatednessProximity { from, to } => write!(
                f,
                "course {to} is more than {MAX_PREREQUISITE_GAP} periods after course {from}"
            ),
        }
    }
}

/// Re-evaluates every constraint family of the model against an assignment.
/// `envelope` supplies the values of the load (`C`) and retention (`IR`) envelopes.
#[must_use]
pub fn violations(
    curriculum: &Curriculum,
    assignment: &Assignment,
    envelope: &Criteria,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    let periods = curriculum.periods();
    let period_of = |course| assignment.period_of(course);

    for course in curriculum.course_ids() {
        let row = assignment.matrix().get(course.index());
        let placed = row.map_or(0, |row| row.iter().take(periods).filter(|&&x| x).count());
        let extra = row.map_or(false, |row| row.iter().skip(periods).any(|&x| x));
        if placed != 1 || extra {
            violations.push(Violation::SingleAssignment { course });
        }
    }

    for &course in curriculum.leveling() {
        if let Some(period) = period_of(course).filter(|&p| p > LAST_LEVELING_PERIOD) {
            violations.push(Violation::Leveling { course, period });
        }
    }

    let fixed = [
        (curriculum.penultimate(), periods - 2),
        (curriculum.last(), periods - 1),
    ];
    for (courses, expected) in fixed {
        for &course in courses {
            if !assignment.is_placed(course, expected) {
                violations.push(Violation::FixedPeriod { course, expected });
            }
        }
    }

    for course in curriculum.courses() {
        if course.prerequisites.is_empty() {
            continue;
        }
        if assignment.is_placed(course.id, 0) {
            violations.push(Violation::PrerequisiteInFirstPeriod { course: course.id });
        }
        for &prerequisite in &course.prerequisites {
            let ordered = match (period_of(course.id), period_of(prerequisite)) {
                (Some(at), Some(before)) => before < at,
                _ => false,
            };
            if !ordered {
                violations.push(Violation::PrerequisiteOrder {
                    course: course.id,
                    prerequisite,
                });
            }
        }
    }

    let bounds = curriculum.load_per_period();
    if envelope.load < bounds.min || envelope.load > bounds.max {
        violations.push(Violation::LoadEnvelope {
            load: envelope.load,
        });
    }

    let counts = curriculum.courses_per_period();
    let summaries = curriculum.summarize(assignment);
    for summary in summaries {
        if summary.load < bounds.min || summary.load > envelope.load {
            violations.push(Violation::PeriodLoad {
                period: summary.period,
                load: summary.load,
            });
        }
        let count = summary.courses.len();
        if count < counts.min || count > counts.max {
            violations.push(Violation::PeriodCourseCount {
                period: summary.period,
                count,
            });
        }
        if summary.retention > envelope.retention + super::model::FEASIBILITY_TOLERANCE {
            violations.push(Violation::PeriodRetention {
                period: summary.period,
                retention: summary.retention,
            });
        }
    }

    for from in curriculum.course_ids() {
        for to in curriculum.course_ids() {
            let degree = curriculum.relatedness(from, to);
            if degree < MODERATE_RELATION {
                continue;
            }
            let (Some(first), Some(second)) = (period_of(from), period_of(to)) else {
                continue;
            };
            if second < first {
                violations.push(Violation::RelatednessOrder { from, to });
            }
            if degree == PREREQUISITE_RELATION
                && second.saturating_sub(first) > MAX_PREREQUISITE_GAP
            {
                violations.push(Violation::RelatednessProximity { from, to });
            }
        }
    }

    violations
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::dataset::test::{chain, small};

    fn check(curriculum: &Curriculum, periods_of: &[usize]) -> Vec<Violation> {
        let assignment = Assignment::from_periods(curriculum.periods(), periods_of);
        let criteria = curriculum.criteria(&assignment);
        violations(curriculum, &assignment, &criteria)
    }

    fn id(curriculum: &Curriculum, index: usize) -> CourseId {
        curriculum
            .course_id(index)
            .unwrap_or_else(|| panic!("course {index}"))
    }

    #[test]
    fn balanced_timetable_has_no_violations() {
        let curriculum = small();
        assert!(check(&curriculum, &[0, 1, 0, 1, 0, 1]).is_empty());

        let curriculum = chain();
        assert!(check(&curriculum, &[0, 0, 1, 1, 2, 3, 2, 3]).is_empty());
    }

    #[test]
    fn prerequisite_violations() {
        let curriculum = small();
        let found = check(&curriculum, &[0, 0, 1, 1, 1, 1]);
        assert!(found.contains(&Violation::PrerequisiteInFirstPeriod {
            course: id(&curriculum, 1)
        }));
        assert!(found.contains(&Violation::PrerequisiteOrder {
            course: id(&curriculum, 1),
            prerequisite: id(&curriculum, 0)
        }));
    }

    #[test]
    fn leveling_and_fixed_periods() {
        let curriculum = chain();
        let found = check(&curriculum, &[0, 2, 1, 1, 2, 3, 3, 2]);
        assert!(found.contains(&Violation::Leveling {
            course: id(&curriculum, 1),
            period: 2
        }));
        assert!(found.contains(&Violation::FixedPeriod {
            course: id(&curriculum, 6),
            expected: 2
        }));
        assert!(found.contains(&Violation::FixedPeriod {
            course: id(&curriculum, 7),
            expected: 3
        }));
    }

    #[test]
    fn relatedness_violations() {
        let curriculum = chain();
        // 3 before 1 breaks the degree 5 ordering.
        let found = check(&curriculum, &[0, 1, 1, 0, 2, 3, 2, 3]);
        assert!(found.contains(&Violation::RelatednessOrder {
            from: id(&curriculum, 1),
            to: id(&curriculum, 3)
        }));
        // Degree 2 pairs are unconstrained.
        assert!(!found
            .iter()
            .any(|v| matches!(v, Violation::RelatednessOrder { to, .. } if to.index() == 5)));
    }

    #[test]
    fn proximity_violation() -> anyhow::Result<()> {
        let mut config = crate::core::dataset::test::chain_config();
        config.periods = 5;
        config.courses_per_period = crate::core::Bounds::new(1, 4);
        let curriculum = Curriculum::try_from(config)?;
        let found = check(&curriculum, &[0, 0, 1, 1, 4, 2, 3, 4]);
        assert!(found.contains(&Violation::RelatednessProximity {
            from: id(&curriculum, 2),
            to: id(&curriculum, 4)
        }));
        Ok(())
    }

    #[test]
    fn single_assignment_and_counts() {
        let curriculum = small();
        let assignment = Assignment::from_matrix(vec![
            vec![true, false],
            vec![false, true],
            vec![true, true],
            vec![false, false],
            vec![true, false],
            vec![false, true],
        ]);
        let criteria = curriculum.criteria(&assignment);
        let found = violations(&curriculum, &assignment, &criteria);
        assert!(found.contains(&Violation::SingleAssignment {
            course: id(&curriculum, 2)
        }));
        assert!(found.contains(&Violation::SingleAssignment {
            course: id(&curriculum, 3)
        }));

        let empty = check(&curriculum, &[1, 1, 1, 1, 1, 1]);
        assert!(empty.contains(&Violation::PeriodLoad { period: 0, load: 0 }));
        assert!(empty.contains(&Violation::PeriodCourseCount { period: 0, count: 0 }));
    }

    #[test]
    fn envelopes_are_checked() {
        let curriculum = small();
        let assignment = Assignment::from_periods(2, &[0, 1, 0, 1, 0, 1]);
        let envelope = Criteria {
            load: 10,
            retention: 50.0,
            relation: 0,
        };
        let found = violations(&curriculum, &assignment, &envelope);
        assert!(found.contains(&Violation::PeriodLoad { period: 0, load: 12 }));
        assert!(found.contains(&Violation::PeriodRetention {
            period: 0,
            retention: 65.0
        }));
    }
}
