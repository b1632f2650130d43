use std::path::PathBuf;

use crate::util;

use super::DEFAULT_AGENT_PATH;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct InspectArg {
    /// Agent file to inspect
    #[arg(long, short = 'a', default_value = DEFAULT_AGENT_PATH)]
    agent: PathBuf,
    /// Also print every weight matrix
    #[arg(long, short = 'w')]
    weights: bool,
}

pub(crate) fn run(arg: &InspectArg) -> anyhow::Result<()> {
    let agent = util::read_agent_file(&arg.agent)?;
    let network = agent.network();

    println!("Agent: {}", arg.agent.display());
    println!("  Generation: {}", agent.generation());
    println!("  Fitness:    {:.3}", agent.fitness());
    println!("  Points:     {:.0}", agent.points());
    println!("  Distance:   {:.0}", agent.max_progress());
    println!("  Score:      {:.3}", agent.score());
    println!("  Topology:   {:?}", network.shape());
    println!("  Activation: {:?}", network.activation());
    println!("  Weights:    {}", network.weight_count());
    if arg.weights {
        println!();
        print!("{network}");
    }
    Ok(())
}
