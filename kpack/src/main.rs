mod commands;
mod kms;
mod logger;
mod output;

use clap::{ColorChoice, Parser};
use colored::Colorize;
use commands::{Args, Commands};
use log::LevelFilter;
use logger::Logger;
use std::{
    io::{IsTerminal, stderr},
    process,
};

fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    colored::control::set_override(match args.color {
        ColorChoice::Always => true,
        ColorChoice::Auto => stderr().is_terminal(),
        ColorChoice::Never => false,
    });

    Logger::init(if args.quiet {
        LevelFilter::Error
    } else {
        match args.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    });

    match args.command {
        Commands::Inspect(args) => args.execute()?,
        Commands::Package(args) => args.execute()?,
    }

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {:#}", "error".bold().red(), e);
        process::exit(1);
    }
}
