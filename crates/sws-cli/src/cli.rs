use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "swstore",
    about = "Switch object store: replay record logs, inspect dumps",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Replay a record log into a fresh store
    Replay(ReplayArgs),
    /// Restore a dump file and summarize its contents
    DumpInfo(DumpInfoArgs),
    /// Replay a record log and print the resulting objects
    Show(ShowArgs),
}

/// Options shared by every command that builds a store.
#[derive(Args)]
pub struct ModelArgs {
    /// JSON model description
    #[arg(long)]
    pub model: PathBuf,
    /// TOML store configuration
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct ReplayArgs {
    #[command(flatten)]
    pub model: ModelArgs,
    /// Record log to replay
    #[arg(long)]
    pub log: PathBuf,
    /// Write a dump of the rebuilt store here
    #[arg(long)]
    pub dump: Option<PathBuf>,
}

#[derive(Args)]
pub struct DumpInfoArgs {
    #[command(flatten)]
    pub model: ModelArgs,
    /// Dump file to inspect
    #[arg(long)]
    pub dump: PathBuf,
}

#[derive(Args)]
pub struct ShowArgs {
    #[command(flatten)]
    pub model: ModelArgs,
    #[arg(long)]
    pub log: PathBuf,
    /// Only print objects of this type
    #[arg(long = "type")]
    pub object_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_replay_with_dump() {
        let cli = Cli::try_parse_from([
            "swstore", "replay", "--model", "m.json", "--log", "r.log", "--dump", "out.bin",
        ])
        .unwrap();
        match cli.command {
            Command::Replay(args) => {
                assert_eq!(args.model.model, PathBuf::from("m.json"));
                assert_eq!(args.dump, Some(PathBuf::from("out.bin")));
            }
            _ => panic!("expected replay"),
        }
    }

    #[test]
    fn parses_show_type_filter_and_json() {
        let cli = Cli::try_parse_from([
            "swstore", "show", "--model", "m.json", "--log", "r.log", "--type", "port",
            "--format", "json",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Command::Show(args) => assert_eq!(args.object_type.as_deref(), Some("port")),
            _ => panic!("expected show"),
        }
    }
}
