//! Walks through the API on a four-state chain.
//!
//! Run with:
//! ```bash
//! cargo run --example simple_chain
//! ```

use pctl_rs::chain::Dtmc;
use pctl_rs::parser::parse_state;
use pctl_rs::state_set::StateSet;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    // States
    let mut chain = Dtmc::new();
    let s1 = chain.add_state(Some("s1"), &["a"]);
    let s2 = chain.add_state(Some("s2"), &["a"]);
    let s3 = chain.add_state(Some("s3"), &["b"]);
    let s4 = chain.add_state(Some("s4"), &[]);

    // Transitions
    chain.add_transition(s1, s3, 0.1)?;
    chain.add_transition(s1, s2, 0.6)?;
    chain.add_transition(s2, s2, 0.8)?;
    chain.add_transition(s2, s1, 0.2)?;
    chain.add_transition(s3, s3, 1.0)?;
    chain.add_transition(s1, s4, 0.3)?;
    chain.add_transition(s4, s4, 1.0)?;
    chain.validate(pctl_rs::chain::DEFAULT_EPSILON)?;

    println!("{}", chain.to_dot(None)?);

    // PCTL model checking
    let phi = parse_state("P[0.9,1.0](a U b)")?;
    println!("phi = {}", phi);
    let sat = chain.check(&phi)?;
    println!("states satisfying phi: {}", sat);

    // Plain reachability of s3
    let goal: StateSet = [s3].into_iter().collect();
    let probabilities = chain.reachability(&goal, &StateSet::new(), None)?;
    for state in chain.states() {
        println!("Pr[{} reaches s3] = {:.4}", state, probabilities[state.id().index()]);
    }

    // Where the mass is after a few steps
    for steps in [1, 2, 10] {
        let dist = chain.transient_from_initial(steps)?;
        println!("after {:>2} steps: {:?}", steps, dist.as_slice());
    }

    Ok(())
}
