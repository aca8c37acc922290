use clap::builder::FalseyValueParser;
use clap::{Parser, Subcommand};

mod extract;
mod suffix;

#[derive(Debug, Parser)]
#[command(name = "uncia", version, about = "Extract archives with format auto-detection")]
pub struct App {
    /// Log negotiation steps and every entry
    #[arg(
        short,
        long,
        global = true,
        env = "UNCIA_VERBOSE",
        value_parser = FalseyValueParser::new()
    )]
    pub verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Extract an archive into a directory
    #[command(visible_alias = "x")]
    Extract(extract::Extract),
    /// Show how a file name's suffixes are classified
    #[command(visible_alias = "s")]
    Suffix(suffix::Suffix),
}

impl App {
    pub fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Extract(cmd) => cmd.run(self.verbose),
            Command::Suffix(cmd) => cmd.run(),
        }
    }
}
