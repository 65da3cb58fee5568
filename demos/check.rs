//! Checks a PCTL formula against a sample chain.
//!
//! The chain is a small randomized protocol: from `try` a message is delivered
//! with probability 0.9 or lost, and a lost message is retried.
//!
//! ```bash
//! cargo run --example check -- "P>=0.99(!fail U<=3 delivered)"
//! ```

use clap::Parser;

use pctl_rs::chain::Dtmc;
use pctl_rs::eval::Eval;
use pctl_rs::parser::parse;
use pctl_rs::reachability::{ReachabilityOptions, UnboundedMethod};
use pctl_rs::Formula;

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// PCTL formula to check.
    #[arg(value_name = "FORMULA", default_value = "P>=0.99(true U delivered)")]
    formula: String,

    /// Print the chain in DOT format, highlighting the satisfying states.
    #[clap(long)]
    dot: bool,

    /// Use value iteration instead of solving unbounded reachability directly.
    #[clap(long)]
    iterative: bool,

    /// Enable debug logging.
    #[clap(short, long)]
    verbose: bool,
}

fn sample_chain() -> color_eyre::Result<Dtmc> {
    let mut chain = Dtmc::new();
    let start = chain.add_state(Some("start"), &["init"]);
    let attempt = chain.add_state(Some("try"), &[]);
    let lost = chain.add_state(Some("lost"), &["fail"]);
    let delivered = chain.add_state(Some("delivered"), &["delivered", "done"]);
    chain.add_transition(start, attempt, 1.0)?;
    chain.add_transition(attempt, delivered, 0.9)?;
    chain.add_transition(attempt, lost, 0.1)?;
    chain.add_transition(lost, attempt, 1.0)?;
    chain.add_transition(delivered, delivered, 1.0)?;
    chain.validate(pctl_rs::chain::DEFAULT_EPSILON)?;
    Ok(chain)
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Cli::parse();

    simplelog::TermLogger::init(
        if args.verbose {
            simplelog::LevelFilter::Debug
        } else {
            simplelog::LevelFilter::Info
        },
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    println!("args = {:?}", args);

    let chain = sample_chain()?;
    println!("{}", chain);

    let formula = parse(&args.formula)?;
    println!("formula = {}", formula);

    let options = ReachabilityOptions {
        method: if args.iterative {
            UnboundedMethod::Iterative
        } else {
            UnboundedMethod::Direct
        },
        ..ReachabilityOptions::default()
    };

    match formula {
        Formula::State(phi) => {
            let sat = chain.check_with(&phi, &options)?;
            println!("satisfying states: {}", sat);
            if let Some(initial) = chain.initial() {
                println!("holds initially: {}", sat.contains(initial));
            }
            if args.dot {
                println!("{}", chain.to_dot(Some(&sat))?);
            }
        }
        Formula::Path(psi) => {
            let probabilities = psi.eval_with(&chain, &options)?;
            for state in chain.states() {
                println!("Pr[{}] = {:.6}", state, probabilities[state.id().index()]);
            }
        }
    }

    Ok(())
}
