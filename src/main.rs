extern crate heat_loss;

use clap::Parser;
use heat_loss::core::lookups::StandardLookups;
use heat_loss::output::FileOutput;
use heat_loss::{run_project, ProjectFlags};
use std::fs;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Default, Debug)]
#[clap(author, version, about, long_about = None)]
struct HeatLossArgs {
    input_file: String,
    /// Directory for output files (defaults to "<input file stem>__results")
    #[arg(long, short)]
    output_dir: Option<PathBuf>,
    /// Refuse to calculate if the request has any validation issues
    #[arg(long, default_value_t = false)]
    strict: bool,
    #[arg(long, default_value_t = false)]
    no_provenance: bool,
    #[arg(long, short, default_value_t = false)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = HeatLossArgs::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let input_path = Path::new(&args.input_file);
    let input_stem = input_path
        .file_stem()
        .ok_or_else(|| anyhow::anyhow!("Could not determine input file name"))?
        .to_string_lossy()
        .to_string();

    let output_path = args
        .output_dir
        .unwrap_or_else(|| PathBuf::from(format!("{input_stem}__results")));
    fs::create_dir_all(&output_path)?;

    let file_output = FileOutput::new(output_path.clone(), format!("{input_stem}__{{}}.{{}}"));

    let mut flags = ProjectFlags::empty();
    if args.strict {
        flags.insert(ProjectFlags::STRICT_VALIDATION);
    }
    if args.no_provenance {
        flags.insert(ProjectFlags::SKIP_PROVENANCE_OUTPUT);
    }

    let results = run_project(
        BufReader::new(File::open(input_path)?),
        file_output,
        &StandardLookups,
        &flags,
    )?;

    for room in &results.rooms {
        for warning in &room.warnings {
            warn!(room = room.result.room_id.as_str(), "{warning}");
        }
    }
    info!(
        total_heat_load = results.total_heat_load,
        "Wrote results to {}",
        output_path.display()
    );

    Ok(())
}
