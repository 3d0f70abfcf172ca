use clap::Parser;
use indexmap::IndexMap;
use ndarray::{ArrayD, IxDyn};
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Uniform};
use serde::Serialize;
use sumprod::core::{FactorGraph, MessagePassingConfig, MessagePassingInfo};
use tracing_subscriber::EnvFilter;

/// Builds a random chain of discrete variables, runs sum-product message passing
/// and compares its marginals with exact enumeration
#[derive(Debug, Parser)]
struct Args {
    /// Number of variables in the chain
    #[arg(long, default_value_t = 6)]
    length: usize,

    /// Number of states of each variable
    #[arg(long, default_value_t = 3)]
    dim: usize,

    /// Maximal number of message passing rounds
    #[arg(long, default_value_t = 500)]
    max_iterations: usize,

    /// Exponential moving average coefficient of messages
    #[arg(long, default_value_t = 0.)]
    damping: f64,

    /// Close the chain into a loop, message passing becomes approximate
    #[arg(long)]
    cycle: bool,

    /// Seed of the potentials generator
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Index of an observed variable
    #[arg(long)]
    observe: Option<usize>,

    /// Observed state of the variable given by `--observe`
    #[arg(long, default_value_t = 0)]
    state: usize,
}

#[derive(Debug, Serialize)]
struct Report {
    info: MessagePassingInfo,
    marginals: IndexMap<String, Vec<f64>>,
    exact_marginals: IndexMap<String, Vec<f64>>,
    max_error: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();
    // potentials ---------------------------------------------------------------------------
    let mut rng = StdRng::seed_from_u64(args.seed);
    let distr = Uniform::new(0.05f64, 1f64);
    let mut fg = FactorGraph::new();
    let ids = (0..args.length)
        .map(|i| fg.add_var_node(format!("x{i}"), args.dim))
        .collect::<Result<Vec<_>, _>>()?;
    for id in &ids {
        let potential = ArrayD::from_shape_fn(IxDyn(&[args.dim]), |_| distr.sample(&mut rng));
        fg.add_fac_node(potential, &[*id])?;
    }
    let pairs_number = if args.cycle && args.length > 2 {
        args.length
    } else {
        args.length.saturating_sub(1)
    };
    for i in 0..pairs_number {
        let potential =
            ArrayD::from_shape_fn(IxDyn(&[args.dim, args.dim]), |_| distr.sample(&mut rng));
        fg.add_fac_node(potential, &[ids[i], ids[(i + 1) % args.length]])?;
    }
    if let Some(observed) = args.observe {
        let id = *ids.get(observed).ok_or("observed variable is out of range")?;
        fg.condition(id, args.state)?;
    }
    // inference ----------------------------------------------------------------------------
    let config = MessagePassingConfig {
        max_iterations: args.max_iterations,
        damping: args.damping,
        ..MessagePassingConfig::default()
    };
    let info = fg.run_message_passing(&config);
    let marginals = fg.variable_marginals();
    let brute = fg.brute_force()?;
    let mut exact_marginals = IndexMap::new();
    let mut max_error = 0f64;
    for (name, marginal) in &marginals {
        let exact = brute.marginalize(name)?;
        for (x, y) in marginal.iter().zip(&exact) {
            max_error = max_error.max((x - y).abs());
        }
        exact_marginals.insert(name.clone(), exact.to_vec());
    }
    let report = Report {
        info,
        marginals: marginals.into_iter().map(|(k, v)| (k, v.to_vec())).collect(),
        exact_marginals,
        max_error,
    };
    println!("{}", serde_yaml::to_string(&report)?);
    Ok(())
}
