// logic-machine: build and exercise a neural logic machine from the shell.
//
// Subcommands:
//   describe  print the resolved configuration and per-layer bookkeeping
//   run       run a forward pass over random predicates and report shapes

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::info;
use logic_machine::{ChannelSpec, GroupList, Machine, MachineConfig};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::json;

#[derive(Parser, Debug)]
#[command(name = "logic-machine", about = "Multi-order relational reasoning engine")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Print the resolved configuration and the channel bookkeeping of every layer
    Describe {
        #[command(flatten)]
        machine: MachineArgs,
    },
    /// Run a forward pass over uniformly random predicates
    Run {
        #[command(flatten)]
        machine: MachineArgs,
        /// Number of objects in each sample
        #[arg(long, default_value_t = 4)]
        objects: usize,
        /// Number of samples in the batch
        #[arg(long, default_value_t = 1)]
        batch: usize,
        /// Seed for the random inputs
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Depth override (clamped unless recursion is on)
        #[arg(long)]
        run_depth: Option<usize>,
    },
}

/// Overrides applied on top of the configuration file (or the defaults).
#[derive(Args, Debug)]
struct MachineArgs {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    depth: Option<usize>,
    #[arg(long)]
    breadth: Option<usize>,
    /// Input channels: one count for every order, or a list like `0,3,2`
    #[arg(long, value_parser = parse_channels)]
    input_channels: Option<ChannelSpec>,
    /// Requested output channels, in the same form as the inputs
    #[arg(long, value_parser = parse_channels)]
    output_channels: Option<ChannelSpec>,
    #[arg(long)]
    hidden_dimension: Option<usize>,
    #[arg(long)]
    exclude_self: bool,
    /// Full residual (each layer prepends its input)
    #[arg(long, conflicts_with = "io_residual")]
    residual: bool,
    /// Output-only residual (the default)
    #[arg(long)]
    io_residual: bool,
    /// Share weights across levels past the third
    #[arg(long)]
    recursion: bool,
}

impl MachineArgs {
    fn resolve(&self) -> anyhow::Result<MachineConfig> {
        let mut config = match &self.config {
            Some(path) => MachineConfig::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => MachineConfig::default(),
        };
        if let Some(depth) = self.depth {
            config.depth = depth;
        }
        if let Some(breadth) = self.breadth {
            config.breadth = breadth;
        }
        if let Some(channels) = &self.input_channels {
            config.input_channels = channels.clone();
        }
        if let Some(channels) = &self.output_channels {
            config.output_channels = channels.clone();
        }
        if let Some(hidden) = self.hidden_dimension {
            config.hidden_dimension = hidden;
        }
        config.exclude_self |= self.exclude_self;
        config.recursion |= self.recursion;
        if self.residual {
            config.residual = true;
            config.io_residual = false;
        } else if self.io_residual {
            config.residual = false;
            config.io_residual = true;
        }
        Ok(config)
    }
}

/// Parses `4` as a count for every order and `0,3,2` as one count per order.
fn parse_channels(text: &str) -> Result<ChannelSpec, String> {
    let counts = text
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<usize>()
                .map_err(|e| format!("invalid channel count '{part}': {e}"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    match counts.as_slice() {
        [single] => Ok(ChannelSpec::Uniform(*single)),
        _ => Ok(ChannelSpec::PerOrder(counts)),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    match Cli::parse().command {
        Cmd::Describe { machine } => cmd_describe(&machine.resolve()?),
        Cmd::Run {
            machine,
            objects,
            batch,
            seed,
            run_depth,
        } => cmd_run(&machine.resolve()?, objects, batch, seed, run_depth),
    }
}

fn build(config: &MachineConfig) -> anyhow::Result<Machine> {
    let machine = config.build().context("Failed to build logic machine")?;
    info!(
        "Built machine with {} layers and {} parameters",
        machine.layer_count(),
        machine.parameter_count()
    );
    Ok(machine)
}

fn cmd_describe(config: &MachineConfig) -> anyhow::Result<()> {
    let machine = build(config)?;
    let layers: Vec<_> = (0..machine.layer_count())
        .filter_map(|index| machine.layer(index))
        .map(|layer| {
            json!({
                "input_channels": layer.input_channels(),
                "output_channels": layer.output_channels(),
                "parameters": layer.parameter_count(),
            })
        })
        .collect();
    let summary = json!({
        "config": config,
        "residual_mode": machine.residual_mode(),
        "input_channels": machine.input_channels(),
        "output_channels": machine.output_channels(),
        "parameters": machine.parameter_count(),
        "layers": layers,
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).context("Failed to render summary")?
    );
    Ok(())
}

fn cmd_run(
    config: &MachineConfig,
    objects: usize,
    batch: usize,
    seed: u64,
    depth: Option<usize>,
) -> anyhow::Result<()> {
    let machine = build(config)?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let inputs = GroupList::random(batch, objects, machine.input_channels(), &mut rng);

    let outputs = machine
        .forward(&inputs, depth)
        .context("Forward pass failed")?;
    for (order, group) in outputs.iter().enumerate() {
        match group.shape() {
            Some(shape) => println!("order {order}: {shape:?}"),
            None => println!("order {order}: absent"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn resolve(args: &[&str]) -> MachineConfig {
        match Cli::try_parse_from(args.iter().copied()).unwrap().command {
            Cmd::Describe { machine } | Cmd::Run { machine, .. } => machine.resolve().unwrap(),
        }
    }

    #[test]
    fn channel_flags_take_a_count_or_a_list() {
        assert_eq!(parse_channels("4"), Ok(ChannelSpec::Uniform(4)));
        assert_eq!(parse_channels("0, 3,2"), Ok(ChannelSpec::PerOrder(vec![0, 3, 2])));
        assert!(parse_channels("1,x").is_err());
        assert!(parse_channels("").is_err());
    }

    #[test]
    fn per_order_lists_reach_the_config() {
        let config = resolve(&[
            "logic-machine",
            "run",
            "--breadth",
            "1",
            "--input-channels",
            "0,3",
            "--output-channels",
            "0,2",
            "--objects",
            "4",
        ]);
        assert_eq!(config.input_channels, ChannelSpec::PerOrder(vec![0, 3]));
        assert_eq!(config.output_channels, ChannelSpec::PerOrder(vec![0, 2]));
        assert!(config.build().is_ok());
    }

    #[test]
    fn residual_flag_switches_mode() {
        let config = resolve(&["logic-machine", "describe", "--residual", "--depth", "2"]);
        assert!(config.residual);
        assert!(!config.io_residual);
        assert_eq!(config.depth, 2);
        let both =
            Cli::try_parse_from(["logic-machine", "describe", "--residual", "--io-residual"]);
        assert!(both.is_err());
    }
}
