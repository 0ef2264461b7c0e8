mod inspect;
mod package;

pub use inspect::Inspect;
pub use package::Package;

use clap::{ColorChoice, Parser, Subcommand};

/// Fetch content keys from a CPIX key server and build Widevine, PlayReady and FairPlay signaling.
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// When to output colored text.
    #[arg(long, global = true, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log more details, repeat for trace output.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    Inspect(Inspect),
    Package(Package),
}
