use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "typesmith",
    version,
    about = "Turn runtime type samples into Python annotations",
    after_help = r#"Examples:
  typesmith infer type_info.json --output signatures.json
  typesmith revert signatures.json --output type_info.json
  typesmith annotate signatures.json --root . --write
  typesmith annotate type_info.json --inline --max-edits 10
  MAXFIXES=5 typesmith annotate type_info.json --write
"#
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Merge the samples of every function into one signature each.
    Infer {
        /// JSON file with sample records.
        input: PathBuf,
        /// Where to write signature records; stdout when omitted.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Turn signature records back into sample records.
    Revert {
        /// JSON file with signature records.
        input: PathBuf,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Insert signatures into the source files named by the records.
    Annotate {
        /// JSON file with sample records or signature records.
        input: PathBuf,
        /// Directory the recorded paths are relative to.
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Rewrite files in place instead of printing them.
        #[arg(long, short)]
        write: bool,
        /// Use inline annotations instead of `# type:` comments.
        #[arg(long)]
        inline: bool,
        /// Also annotate functions without a record.
        #[arg(long)]
        all: bool,
        /// Stop after annotating this many functions.
        #[arg(long, value_name = "N")]
        max_edits: Option<usize>,
        /// Additional files to annotate (useful with --all).
        #[arg(value_name = "FILE")]
        files: Vec<PathBuf>,
    },
}
