//! Command-line interface for cipherloom.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use loom_trs::Traversal;

#[derive(Parser)]
#[command(name = "cipherloom")]
#[command(about = "Term-rewriting optimizer for homomorphic-encryption circuits", long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v for info, -vv for debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Optimize a circuit file and print the result
    Optimize {
        /// Circuit source file
        file: PathBuf,

        /// Built-in ruleset to apply
        #[arg(long, default_value = "simplify")]
        ruleset: String,

        /// Order in which terms are visited
        #[arg(long, value_enum, default_value_t = TraversalArg::BottomUp)]
        traversal: TraversalArg,

        /// Stop after this many rewriting sweeps
        #[arg(long, default_value_t = 64)]
        max_iterations: usize,

        /// Skip common-subexpression elimination
        #[arg(long)]
        no_cse: bool,

        /// Refuse rewrites that would duplicate shared subterms
        #[arg(long)]
        circuit_saving: bool,
    },

    /// Check that every rule of a ruleset decreases under a cost order
    #[command(alias = "check")]
    CheckRuleset {
        /// Built-in ruleset to check
        #[arg(long, default_value = "simplify")]
        ruleset: String,

        #[arg(long, value_enum, default_value_t = OrderArg::Joined)]
        order: OrderArg,

        /// Exit with an error when a rule is rejected or unordered
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TraversalArg {
    BottomUp,
    TopDown,
}

impl From<TraversalArg> for Traversal {
    fn from(arg: TraversalArg) -> Self {
        match arg {
            TraversalArg::BottomUp => Traversal::BottomUp,
            TraversalArg::TopDown => Traversal::TopDown,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OrderArg {
    Depth,
    OpsCost,
    Joined,
}

impl OrderArg {
    /// Name understood by `LexicoProductOrder::by_name`.
    pub fn order_name(self) -> &'static str {
        match self {
            OrderArg::Depth => "depth",
            OrderArg::OpsCost => "ops-cost",
            OrderArg::Joined => "joined",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimize_defaults() {
        let cli = Cli::try_parse_from(["cipherloom", "optimize", "c.loom"]).unwrap();
        let Command::Optimize {
            ruleset,
            traversal,
            max_iterations,
            no_cse,
            circuit_saving,
            ..
        } = cli.command
        else {
            panic!("expected optimize");
        };
        assert_eq!(ruleset, "simplify");
        assert_eq!(traversal, TraversalArg::BottomUp);
        assert_eq!(max_iterations, 64);
        assert!(!no_cse && !circuit_saving);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn check_ruleset_flags() {
        let cli = Cli::try_parse_from([
            "cipherloom",
            "-vv",
            "check-ruleset",
            "--order",
            "ops-cost",
            "--strict",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Command::CheckRuleset {
                order: OrderArg::OpsCost,
                strict: true,
                ..
            }
        ));
    }

    #[test]
    fn unknown_traversal_is_rejected() {
        assert!(Cli::try_parse_from(["cipherloom", "optimize", "c.loom", "--traversal", "sideways"]).is_err());
    }
}
