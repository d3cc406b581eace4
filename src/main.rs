use clap::{CommandFactory, Parser, ValueEnum};
use clap::error::ErrorKind;
use log::{error, info};
use matching_tree_distances::config::{CompareConfig, MatchingStrategy};
use matching_tree_distances::distances::{
    against_references, all_pairs, build_topologies, distance_matrix, Metric, PairRecord,
};
use matching_tree_distances::error::CompareError;
use matching_tree_distances::io::{read_trees, write_alignments, write_matrix_tsv, write_pairs_tsv};
use matching_tree_distances::topology::Topology;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Compute Matching Split / Matching Cluster and related tree distances from
/// BEAST/NEXUS or Newick tree files and write labeled TSV output where
/// row/column names are tree names.
#[derive(Parser, Debug)]
#[command(name = "matching-tree-distances", version, about = "Matching-based distances between phylogenetic trees")]
struct Args {
    /// Path to a BEAST .trees (NEXUS) file or a file of Newick trees (optionally .gz)
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Output path for the TSV result ("-" for stdout, ".gz" to compress)
    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    /// Metrics to compute; repeat the flag or separate codes with commas
    #[arg(short = 'm', long = "metric", value_enum, value_delimiter = ',', default_values_t = vec![MetricArg::Ms])]
    metric: Vec<MetricArg>,

    /// How matching metrics compute their assignment
    #[arg(long = "strategy", value_enum, default_value_t = StrategyArg::Exact)]
    strategy: StrategyArg,

    /// Keep a bifurcating root for split metrics instead of collapsing it
    #[arg(long = "rooted", default_value_t = false)]
    rooted: bool,

    /// Restrict each pair of trees to their common leaves before comparing
    #[arg(long = "prune", default_value_t = false)]
    prune: bool,

    /// Write node-to-node alignments of the matching metrics to this path
    #[arg(long = "alignments")]
    alignments: Option<PathBuf>,

    /// Burn-in by number of trees (drop first N trees)
    #[arg(short = 't', long = "burnin-trees", default_value_t = 0)]
    burnin_trees: usize,

    /// Burn-in by state (keep trees with STATE_ > value)
    #[arg(short = 's', long = "burnin-states", default_value_t = 0)]
    burnin_states: usize,

    /// Use TRANSLATE block to map taxon IDs to labels when available
    #[arg(long = "use-real-taxa", default_value_t = false)]
    use_real_taxa: bool,

    /// Compare all input trees with each other, or each reference tree with every input tree
    #[arg(long = "mode", value_enum, default_value_t = ModeArg::AllPairs)]
    mode: ModeArg,

    /// Reference trees for --mode reference
    #[arg(long = "reference", required_if_eq("mode", "reference"))]
    reference: Option<PathBuf>,

    /// Quiet mode: only warnings and errors are logged
    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    quiet: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum MetricArg {
    Ms,
    Mc,
    Rf,
    Rc,
    Ns,
    #[value(name = "nsl2")]
    Nsl2,
    Tt,
}

impl From<MetricArg> for Metric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Ms => Metric::MatchingSplit,
            MetricArg::Mc => Metric::MatchingCluster,
            MetricArg::Rf => Metric::RobinsonFoulds,
            MetricArg::Rc => Metric::RobinsonFouldsCluster,
            MetricArg::Ns => Metric::NodalL2,
            MetricArg::Nsl2 => Metric::NodalSplittedL2,
            MetricArg::Tt => Metric::Triplet,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum StrategyArg {
    Exact,
    RfPruned,
    FreeLeafSet,
}

impl From<StrategyArg> for MatchingStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Exact => MatchingStrategy::Exact,
            StrategyArg::RfPruned => MatchingStrategy::RfPruned,
            StrategyArg::FreeLeafSet => MatchingStrategy::FreeLeafSet,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ModeArg {
    AllPairs,
    Reference,
}

fn main() {
    let args = Args::parse();
    init_logging(args.quiet);

    if let Err(e) = run(&args) {
        error!("{e}");
        let code = match e {
            CompareError::NoTrees(_) => 2,
            CompareError::Io(_) => 4,
            _ => 3,
        };
        std::process::exit(code);
    }
}

/// `--quiet` lowers the default filter to warnings; `RUST_LOG` overrides both.
fn init_logging(quiet: bool) {
    let level = if quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run(args: &Args) -> Result<(), CompareError> {
    let t0 = Instant::now();
    let (names, trees) = load(&args.input, args)?;
    info!("Read {} trees from {:?} in {:.3}s", trees.len(), args.input, t0.elapsed().as_secs_f64());

    let config = CompareConfig::builder()
        .strategy(args.strategy.into())
        .rooted(args.rooted)
        .alignments(args.alignments.is_some())
        .prune(args.prune)
        .build();

    let mut metrics: Vec<Metric> = Vec::with_capacity(args.metric.len());
    for &m in &args.metric {
        let metric = Metric::from(m);
        if !metrics.contains(&metric) {
            metrics.push(metric);
        }
    }

    match args.mode {
        ModeArg::AllPairs => run_all_pairs(args, &names, &trees, &metrics, &config),
        ModeArg::Reference => {
            let Some(path) = args.reference.as_ref() else {
                Args::command()
                    .error(ErrorKind::MissingRequiredArgument, "--mode reference needs --reference <path>")
                    .exit()
            };
            let t1 = Instant::now();
            let (ref_names, refs) = load(path, args)?;
            info!("Read {} reference trees in {:.3}s", refs.len(), t1.elapsed().as_secs_f64());
            run_reference(args, &ref_names, &refs, &names, &trees, &metrics, &config)
        }
    }
}

/// Read and convert the trees of one file.
fn load(path: &Path, args: &Args) -> Result<(Vec<String>, Vec<Topology>), CompareError> {
    let named_trees = read_trees(path, args.burnin_trees, args.burnin_states, args.use_real_taxa)?;
    let (names, phylos): (Vec<String>, Vec<_>) = named_trees.into_iter().unzip();
    let trees = build_topologies(&phylos)?;
    Ok((names, trees))
}

fn run_all_pairs(
    args: &Args,
    names: &[String],
    trees: &[Topology],
    metrics: &[Metric],
    config: &CompareConfig,
) -> Result<(), CompareError> {
    let n = trees.len();
    let mut aligned: Vec<(Metric, Vec<PairRecord>)> = Vec::new();

    for &metric in metrics {
        info!("Determining distances using {} for {} combinations", metric.name(), n * n.saturating_sub(1) / 2);
        let t = Instant::now();
        let records = all_pairs(trees, metric, config)?;
        info!("Determining distances using {} {:.3}s", metric.name(), t.elapsed().as_secs_f64());

        let output = metric_output(&args.output, metric, metrics.len() > 1);
        let t = Instant::now();
        write_matrix_tsv(&output, names, &distance_matrix(n, &records))?;
        info!("Writing {:?} {:.3}s", output, t.elapsed().as_secs_f64());

        if config.emits_alignments() && records.iter().any(|r| r.outcome.alignment.is_some()) {
            aligned.push((metric, records));
        }
    }

    write_alignment_file(args, names, names, &aligned)
}

fn run_reference(
    args: &Args,
    ref_names: &[String],
    refs: &[Topology],
    names: &[String],
    trees: &[Topology],
    metrics: &[Metric],
    config: &CompareConfig,
) -> Result<(), CompareError> {
    let mut rows: Vec<(String, String, Vec<f64>)> = Vec::with_capacity(refs.len() * trees.len());
    let mut aligned: Vec<(Metric, Vec<PairRecord>)> = Vec::new();

    for &metric in metrics {
        info!("Comparing {} reference trees with {} trees using {}", refs.len(), trees.len(), metric.name());
        let t = Instant::now();
        let records = against_references(refs, trees, metric, config)?;
        info!("Determining distances using {} {:.3}s", metric.name(), t.elapsed().as_secs_f64());

        if rows.is_empty() {
            rows = records
                .iter()
                .map(|r| (ref_names[r.first].clone(), names[r.second].clone(), Vec::with_capacity(metrics.len())))
                .collect();
        }
        for (row, rec) in rows.iter_mut().zip(&records) {
            row.2.push(rec.outcome.distance);
        }

        if config.emits_alignments() && records.iter().any(|r| r.outcome.alignment.is_some()) {
            aligned.push((metric, records));
        }
    }

    let columns: Vec<&str> = metrics.iter().map(|m| m.code()).collect();
    let t = Instant::now();
    write_pairs_tsv(&args.output, &columns, &rows)?;
    info!("Writing {:?} {:.3}s", args.output, t.elapsed().as_secs_f64());

    write_alignment_file(args, ref_names, names, &aligned)
}

fn write_alignment_file(
    args: &Args,
    first_names: &[String],
    second_names: &[String],
    aligned: &[(Metric, Vec<PairRecord>)],
) -> Result<(), CompareError> {
    let Some(path) = args.alignments.as_ref() else {
        return Ok(());
    };
    let entries: Vec<_> = aligned
        .iter()
        .flat_map(|(metric, records)| {
            records.iter().filter_map(move |r| {
                let report = r.outcome.alignment.as_ref()?;
                Some((first_names[r.first].clone(), second_names[r.second].clone(), metric.code(), report))
            })
        })
        .collect();
    write_alignments(path, &entries)?;
    info!("Wrote {} alignments to {:?}", entries.len(), path);
    Ok(())
}

/// With several metrics every matrix gets its own file: `out.tsv` becomes
/// `out.ms.tsv`, `out.mc.tsv`, ...
fn metric_output(path: &Path, metric: Metric, several: bool) -> PathBuf {
    if !several || path.as_os_str() == "-" {
        return path.to_path_buf();
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, ext) = match name.find('.') {
        Some(i) => name.split_at(i),
        None => (name.as_str(), ""),
    };
    path.with_file_name(format!("{stem}.{}{ext}", metric.code()))
}
