use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cypher_fuzz::{reduce, BugReport, FuzzProfile, FuzzingStrategy, QueryResultType, Session, SessionConfig};
use cypher_generation::{Seed, Target};
use rand::RngCore;

/// Grammar-driven fuzzer for OpenCypher databases.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON profile, see `cypher-fuzz schema`
    #[arg(short, long, global = true)]
    profile: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate and run queries, writing a bug report for every bug found.
    Fuzz {
        /// Number of queries to run.
        #[arg(short = 'n', long, default_value_t = 100)]
        queries: usize,
        /// Seed of the first query, the following ones count up from it.
        #[arg(short, long, default_value_t = rand::rng().next_u64())]
        seed: u64,
        /// Directory bug reports are written to.
        #[arg(short, long, default_value = "bugreports")]
        reports: PathBuf,
    },
    /// Regenerate the query of a bug report or a byte string and run it.
    #[command(alias = "regen")]
    Regenerate {
        /// Bug report to regenerate.
        #[arg(required_unless_present = "byte_string", conflicts_with = "byte_string")]
        report: Option<PathBuf>,
        /// Base64 byte string to regenerate instead of a report.
        #[arg(short, long)]
        byte_string: Option<String>,
        /// Overrides the profile's target.
        #[arg(short, long)]
        target: Option<Target>,
        /// Overrides the profile's strategy.
        #[arg(short, long)]
        strategy: Option<FuzzingStrategy>,
    },
    /// Reduce the query of a bug report into `<report>_reduced.json`.
    Reduce {
        report: PathBuf,
        /// Repeat the reduction until the statements stop changing.
        #[arg(short, long)]
        full_reduction: bool,
    },
    /// Run the statements of a bug report again.
    Rerun { report: PathBuf },
    /// Print the JSON schema of profiles.
    Schema,
}

fn main() -> Result<()> {
    let mut subscriber = tracing_subscriber::fmt().with_env_filter(
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
    );
    if !std::io::stdout().is_terminal() {
        subscriber = subscriber.with_ansi(false);
    }
    subscriber.init();

    let args = Args::parse();
    let profile = match &args.profile {
        Some(path) => FuzzProfile::parse(path)?,
        None => FuzzProfile::default(),
    };

    match args.command {
        Command::Fuzz { queries, seed, reports } => fuzz(&profile, queries, seed, &reports),
        Command::Regenerate {
            report,
            byte_string,
            target,
            strategy,
        } => {
            let mut config = profile.session_config()?;
            let bytes = match (report, byte_string) {
                (Some(path), _) => {
                    let report = BugReport::read(path)?;
                    apply_report(&mut config, &report)?;
                    report.bytes()?
                }
                (None, Some(encoded)) => Seed::from_base64(&encoded)
                    .context("invalid byte string")?
                    .byte_string()
                    .to_vec(),
                (None, None) => anyhow::bail!("either a report or a byte string is required"),
            };
            config.target = target.unwrap_or(config.target);
            config.strategy = strategy.unwrap_or(config.strategy);
            regenerate(&profile, config, &bytes)
        }
        Command::Reduce {
            report: path,
            full_reduction,
        } => {
            let report = BugReport::read(&path)?;
            let mut config = profile.session_config()?;
            apply_report(&mut config, &report)?;
            let mut session = Session::new(config, Box::new(profile.mock.driver()));

            let bytes = report.bytes()?;
            tracing::info!("reducing bug report {}", path.display());
            let reduction = reduce(&mut session, &bytes, full_reduction || profile.full_reduction)?;
            let reduced = BugReport::new(
                &report.target,
                report.strategy,
                &bytes,
                reduction.statements,
                &reduction.last_result,
            );
            let name = format!("{}_reduced", report_name(&path));
            let dir = path.parent().unwrap_or(Path::new("."));
            reduced.write_into(dir, &name)?;
            Ok(())
        }
        Command::Rerun { report: path } => {
            let report = BugReport::read(&path)?;
            let mut config = profile.session_config()?;
            apply_report(&mut config, &report)?;
            let mut session = Session::new(config, Box::new(profile.mock.driver()));
            session.connect()?;
            let ty = session.rerun(&report.query)?;
            println!("{ty}");
            if ty.is_bug() {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Schema => {
            println!("{}", FuzzProfile::json_schema());
            Ok(())
        }
    }
}

fn apply_report(config: &mut SessionConfig, report: &BugReport) -> Result<()> {
    config.target = report
        .target
        .parse()
        .with_context(|| format!("bug report has an unknown target `{}`", report.target))?;
    config.strategy = report.strategy;
    Ok(())
}

fn report_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".into())
}

fn fuzz(profile: &FuzzProfile, queries: usize, first_seed: u64, reports: &Path) -> Result<()> {
    let config = profile.session_config()?;
    tracing::info!(dialect = %config.target, strategy = %config.strategy, first_seed, "starting fuzzer");
    let mut session = Session::new(config.clone(), Box::new(profile.mock.driver()));
    session.connect()?;

    let (mut statements, mut bugs) = (0, 0);
    for i in 0..queries as u64 {
        let rng_seed = first_seed.wrapping_add(i);
        let mut seed = Seed::from_rng_seed(rng_seed);
        let execution = session.execute_query(&mut seed)?;
        statements += execution.statements.len();

        let Some(index) = execution.first_bug() else {
            continue;
        };
        bugs += 1;
        let query = execution.statements[..=index].to_vec();
        let query = session.strategy().prepare_query_for_bugreport(query);
        let report = BugReport::new(
            config.target,
            config.strategy,
            seed.byte_string(),
            query,
            &execution.results[index],
        );
        report.write_into(reports, &format!("report_{rng_seed}"))?;
    }

    tracing::info!(queries, statements, bugs, "fuzzing done");
    Ok(())
}

fn regenerate(profile: &FuzzProfile, config: SessionConfig, bytes: &[u8]) -> Result<()> {
    let mut session = Session::new(config, Box::new(profile.mock.driver()));
    session.connect()?;
    let execution = session.execute_query(&mut Seed::replay(bytes.to_vec()))?;
    for (statement, result) in execution.statements.iter().zip(&execution.results) {
        println!("{statement}\n-- {}\n", result.ty);
    }
    let last = execution.last_result().map_or(QueryResultType::None, |r| r.ty);
    tracing::info!(statements = execution.statements.len(), last = %last, "regenerated query");
    Ok(())
}
