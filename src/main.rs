use anyhow::{Result, bail};
use clap::Parser;
use std::io;
use tracing_subscriber::EnvFilter;
use typesmith::batch::{self, AnnotateOptions};
use typesmith::cli;
use typesmith::config::Config;
use typesmith::model::{AnnotationInput, FunctionRecord, SignatureRecord};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("typesmith=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let args = cli::Args::parse();

    match args.command {
        cli::Command::Infer { input, output } => {
            let records: Vec<FunctionRecord> = batch::load_json(&input)?;
            let outcome = batch::infer_records(&records);
            batch::write_json(output.as_deref(), &outcome.signatures)
        }
        cli::Command::Revert { input, output } => {
            let records: Vec<SignatureRecord> = batch::load_json(&input)?;
            batch::write_json(output.as_deref(), &batch::revert_signatures(&records))
        }
        cli::Command::Annotate {
            input,
            root,
            write,
            inline,
            all,
            max_edits,
            files,
        } => {
            let inputs: Vec<AnnotationInput> = batch::load_json(&input)?;
            let options = AnnotateOptions {
                root,
                write,
                extra_files: files,
                config: Config::get().annotate_config(inline, max_edits, all),
            };
            let stdout = io::stdout();
            let mut out = stdout.lock();
            let summary = batch::annotate_files(&inputs, &options, &mut out)?;
            if summary.files > 0 && summary.files_failed == summary.files {
                bail!("no file could be annotated");
            }
            Ok(())
        }
    }
}
