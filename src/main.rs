use clap::{Parser, ValueEnum};
use curriculum_balancing::core::{
    CourseId, Curriculum, CurriculumModel, Reporter, Solver, Sweep, WeightTriple,
};
use curriculum_balancing::data::{self, FileReporter, GeneratorConfig, Iteration, StdoutReporter};
use curriculum_balancing::{algo, run_reader};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::num::NonZero;
use std::path::PathBuf;

#[derive(Copy, Clone, Debug)]
struct Backend(usize, &'static str);

impl Backend {
    fn factory(self) -> fn() -> Box<dyn Solver> {
        algo::SOLVERS[self.0]
    }
}

impl From<Backend> for Box<dyn Solver> {
    fn from(value: Backend) -> Box<dyn Solver> {
        value.factory()()
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.1)
    }
}

impl ValueEnum for Backend {
    fn value_variants<'a>() -> &'a [Self] {
        static BACKENDS: std::sync::LazyLock<Vec<Backend>> = std::sync::LazyLock::new(|| {
            let iter = algo::SOLVERS.iter().enumerate();
            iter.map(|(i, init)| Backend(i, init().name())).collect()
        });

        BACKENDS.as_slice()
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.1))
    }
}

/// Curriculum balancing by weighted-sum sweeps over load, retention and relatedness.
#[derive(Debug, Parser)]
enum Application {
    /// Solve every weight triple of the grid and report the Pareto frontier.
    Sweep {
        /// The curriculum file. Reads stdin when omitted.
        input: Option<PathBuf>,
        /// The solver backend.
        #[clap(short, long, default_value = "microlp")]
        solver: Backend,
        /// Number of steps the unit weight is divided into.
        #[clap(long, default_value = "10")]
        steps: NonZero<u32>,
        /// Directory for the iteration and Pareto files. Prints to stdout when omitted.
        #[clap(short, long)]
        output: Option<PathBuf>,
        /// Number of weight triples solved concurrently.
        #[clap(short, long, default_value = "1")]
        jobs: NonZero<usize>,
    },
    /// Solve a single weight triple.
    Solve {
        /// The curriculum file.
        input: PathBuf,
        /// Weight of the maximum period load.
        load: f64,
        /// Weight of the maximum period retention.
        retention: f64,
        /// Weight of the relatedness distance.
        relation: f64,
        /// The solver backend.
        #[clap(short, long, default_value = "microlp")]
        solver: Backend,
        /// Also write the model in LP format to this file.
        #[clap(long)]
        lp: Option<PathBuf>,
    },
    /// Validate a curriculum file and print a summary.
    Check {
        /// The curriculum file.
        input: PathBuf,
    },
    /// Generate a random curriculum that admits a feasible timetable.
    Gen {
        /// The number of courses.
        courses: NonZero<usize>,
        /// The number of periods.
        periods: NonZero<usize>,
        /// Seed of the random generator.
        #[clap(short, long)]
        seed: Option<u64>,
        /// Output file. Prints to stdout when omitted.
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
}

fn sweep(
    curriculum: &Curriculum,
    solver: Backend,
    steps: u32,
    output: Option<PathBuf>,
    jobs: usize,
) -> anyhow::Result<()> {
    let mut reporter: Box<dyn Reporter> = match output {
        Some(dir) => {
            let (reporter, [iterations, pareto]) = FileReporter::create(&dir, curriculum.name())?;
            log::info!("writing {} and {}", iterations.display(), pareto.display());
            Box::new(reporter)
        }
        None => Box::new(StdoutReporter),
    };

    let sweep = Sweep::new(curriculum, steps);
    if jobs > 1 {
        sweep.run_parallel(solver.factory(), jobs, reporter.as_mut())?;
    } else {
        sweep.run(Box::<dyn Solver>::from(solver).as_mut(), reporter.as_mut())?;
    }
    Ok(())
}

fn summary(curriculum: &Curriculum) {
    let codes = |courses: &[CourseId]| {
        let codes: Vec<&str> = courses
            .iter()
            .map(|&course| curriculum.course(course).code.as_str())
            .collect();
        codes.join(", ")
    };
    let count = curriculum.courses_per_period();
    let load = curriculum.load_per_period();
    let prerequisites: usize = curriculum
        .courses()
        .iter()
        .map(|course| course.prerequisites.len())
        .sum();

    println!(
        "{}: {} courses over {} periods",
        curriculum.name(),
        curriculum.courses().len(),
        curriculum.periods()
    );
    println!("courses per period: {}..={}", count.min, count.max);
    println!("load per period: {}..={}", load.min, load.max);
    println!("prerequisite links: {prerequisites}");
    println!("leveling: {}", codes(curriculum.leveling()));
    println!("penultimate period: {}", codes(curriculum.penultimate()));
    println!("last period: {}", codes(curriculum.last()));
    println!("distances:");
    for row in curriculum.distances().rows() {
        let row: Vec<String> = row.iter().map(ToString::to_string).collect();
        println!("  {}", row.join(" "));
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Application::parse() {
        Application::Sweep {
            input,
            solver,
            steps,
            output,
            jobs,
        } => match input {
            Some(path) => {
                let curriculum = data::load_curriculum(&path)?;
                sweep(&curriculum, solver, steps.get(), output, jobs.get())
            }
            None if output.is_none() && jobs.get() == 1 => {
                let mut solver = Box::<dyn Solver>::from(solver);
                let mut reporter = StdoutReporter;
                let reader = &mut std::io::stdin().lock();
                run_reader(reader, solver.as_mut(), &mut reporter, steps.get()).map(|_| ())
            }
            None => {
                let curriculum: Curriculum = data::deserialize(&mut std::io::stdin().lock())?;
                sweep(&curriculum, solver, steps.get(), output, jobs.get())
            }
        },
        Application::Solve {
            input,
            load,
            retention,
            relation,
            solver,
            lp,
        } => {
            let curriculum = data::load_curriculum(&input)?;
            let weights = WeightTriple::new(load, retention, relation)?;
            let model = CurriculumModel::build(&curriculum, weights)?;

            if let Some(path) = lp {
                let mut writer = BufWriter::new(File::create(path)?);
                data::write_lp(model.model(), &mut writer)?;
                writer.flush()?;
            }

            let solved = Box::<dyn Solver>::from(solver).solve(model.model())?;
            let assignment = model.assignment(&solved)?;
            println!("{}", Iteration::new(&curriculum, weights, &assignment));
            println!("runtime is {:.3} s", solved.runtime);
            Ok(())
        }
        Application::Check { input } => {
            summary(&data::load_curriculum(&input)?);
            Ok(())
        }
        Application::Gen {
            courses,
            periods,
            seed,
            output,
        } => {
            let mut config = GeneratorConfig::new(courses.get(), periods.get());
            config.seed = seed;
            let curriculum = data::generate(&config)?;
            let text = data::to_string(&curriculum)?;
            match output {
                Some(path) => File::create(path)?.write_all(text.as_bytes())?,
                None => println!("{text}"),
            }
            Ok(())
        }
    }
}
