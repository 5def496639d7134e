use clap::error::ErrorKind;
use clap::{ArgAction, ArgMatches, CommandFactory, FromArgMatches, Parser};

use luacap::script::ScriptPayload;

#[derive(Parser, Debug)]
#[command(name = "luacap")]
#[command(author, version, about = "Run Lua scripts over packet capture files")]
pub struct Cli {
    /// Load a script from inline Lua source (repeatable)
    #[arg(short = 'e', long = "source", value_name = "CODE", action = ArgAction::Append)]
    pub source: Vec<String>,

    /// Load a script from a Lua file, or a module name when no such file
    /// exists (repeatable)
    #[arg(short = 'f', long = "file", value_name = "PATH", action = ArgAction::Append)]
    pub file: Vec<String>,

    /// BPF filter expression applied to every capture
    #[arg(short = 'F', long = "filter", value_name = "EXPR")]
    pub filter: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Capture files to read ('-' reads from standard input)
    #[arg(value_name = "CAPTURE", required = true)]
    pub captures: Vec<String>,

    /// Arguments passed through to scripts as arg[1..]
    #[arg(last = true, value_name = "ARGS")]
    pub script_args: Vec<String>,
}

impl Cli {
    /// Parse the command line, keeping the interleaved order of `-e` and
    /// `-f` occurrences; scripts run in the order they were requested.
    pub fn parse_with_scripts() -> (Self, Vec<ScriptPayload>) {
        let matches = Self::command().get_matches();
        let cli = match Self::from_arg_matches(&matches) {
            Ok(cli) => cli,
            Err(e) => e.exit(),
        };

        let payloads = ordered_payloads(&matches);
        if payloads.is_empty() {
            Self::command()
                .error(
                    ErrorKind::MissingRequiredArgument,
                    "no scripts specified; use -e/--source or -f/--file",
                )
                .exit();
        }

        (cli, payloads)
    }
}

fn ordered_payloads(matches: &ArgMatches) -> Vec<ScriptPayload> {
    let mut entries: Vec<(usize, ScriptPayload)> = Vec::new();

    if let (Some(indices), Some(values)) = (
        matches.indices_of("source"),
        matches.get_many::<String>("source"),
    ) {
        for (index, code) in indices.zip(values) {
            entries.push((index, ScriptPayload::inline(code.clone())));
        }
    }

    if let (Some(indices), Some(values)) = (
        matches.indices_of("file"),
        matches.get_many::<String>("file"),
    ) {
        for (index, path) in indices.zip(values) {
            entries.push((index, ScriptPayload::file(path.clone())));
        }
    }

    entries.sort_by_key(|(index, _)| *index);
    entries.into_iter().map(|(_, payload)| payload).collect()
}
