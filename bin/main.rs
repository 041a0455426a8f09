use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use obdda::cnf::dimacs;
use obdda::count::LiteralWeights;
use obdda::order::{OrderStrategy, VariableOrder};
use obdda::search::options::{ImplicationStrategy, SearchOptions};
use obdda::Outcome;

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    None,
}

impl LogLevel {
    fn to_trace(&self) -> Option<tracing::Level> {
        Some(match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::None => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Build the diagram, then count its models.
    Compile,
    /// Count models directly without building a diagram.
    Count,
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to DIMACS file with the CNF
    #[arg(short, long, value_name = "dimacs.cnf")]
    dimacs_path: String,

    #[arg(short, long, value_enum, default_value_t = Mode::Compile)]
    mode: Mode,

    /// Use the literal weights given in the DIMACS file.
    #[arg(short, long)]
    weighted: bool,

    /// How variables are ordered for branching and in the diagram.
    #[arg(long, value_enum, default_value_t = OrderStrategy::MinFill)]
    order: OrderStrategy,

    #[arg(long, value_enum, default_value_t = ImplicationStrategy::Bcp)]
    implication: ImplicationStrategy,

    /// Give up after this many seconds and print UNKNOWN.
    #[arg(short, long)]
    timeout_secs: Option<u64>,

    /// Component cache size in megabytes above which the cache is cleared.
    #[arg(long, default_value_t = 1024)]
    memory_budget_mb: usize,

    /// Where to store the DOT graph of the compiled diagram
    #[arg(long, value_name = "FILE.dot")]
    dot_path: Option<String>,

    /// Print search statistics.
    #[arg(short, long)]
    print_statistics: bool,

    /// Verbosity level. See `tracing::Level` for more information.
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    verbosity: LogLevel,
}

fn main() -> Result<()> {
    let args = Cli::parse();

    if let Some(level) = args.verbosity.to_trace() {
        tracing_subscriber::fmt().with_max_level(level).init();
    }

    let f = File::open(&args.dimacs_path)
        .with_context(|| format!("could not open {}", args.dimacs_path))?;
    let dimacs = dimacs::parse(&mut BufReader::new(f))
        .with_context(|| format!("could not parse DIMACS file {}", args.dimacs_path))?;
    let cnf = dimacs.cnf;

    let options = SearchOptions::builder()
        .cache_memory_budget(args.memory_budget_mb << 20)
        .implication(args.implication)
        .maybe_timeout(args.timeout_secs.map(Duration::from_secs))
        .build();
    let order = VariableOrder::build(args.order, &cnf);

    let weights = if args.weighted {
        Some(
            dimacs
                .weights
                .unwrap_or_else(|| LiteralWeights::unweighted(cnf.num_vars())),
        )
    } else {
        None
    };

    let statistics = match args.mode {
        Mode::Compile => {
            let Outcome::Finished(compilation) = obdda::compile(&cnf, &order, &options)? else {
                println!("UNKNOWN");
                return Ok(());
            };

            match &weights {
                Some(weights) => println!(
                    "{}",
                    compilation
                        .manager
                        .weighted_count(compilation.root, weights)
                ),
                None => println!("{}", compilation.model_count()),
            }

            if let Some(path) = args.dot_path.as_deref() {
                write_to_file(path, |writer| {
                    compilation.manager.draw(writer, compilation.root)
                })?;
            }
            compilation.statistics
        }
        Mode::Count => {
            let counted = match &weights {
                Some(weights) => obdda::count(&cnf, &order, weights, &options)?
                    .map(|counted| (counted.count.to_string(), counted.statistics)),
                None => {
                    let exact = LiteralWeights::exact(cnf.num_vars());
                    obdda::count(&cnf, &order, &exact, &options)?
                        .map(|counted| (counted.count.to_string(), counted.statistics))
                }
            };

            let Outcome::Finished((count, statistics)) = counted else {
                println!("UNKNOWN");
                return Ok(());
            };
            println!("{count}");
            statistics
        }
    };

    if args.print_statistics {
        println!("{statistics}");
    }

    Ok(())
}

fn write_to_file(
    path: &str,
    writer: impl Fn(&mut dyn Write) -> std::io::Result<()>,
) -> Result<()> {
    let f = File::create(path).with_context(|| format!("could not create {path}"))?;
    let mut b = BufWriter::new(f);
    writer(&mut b as &mut dyn Write).with_context(|| format!("could not write {path}"))?;
    b.flush()?;
    Ok(())
}
