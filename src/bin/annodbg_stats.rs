use clap::Parser;
use log::info;
use std::time::Instant;

use annodbg::annot::matrix::BinaryMatrix;
use annodbg::annot::Annotator;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about=None)]
struct Args {
    // serialized annotation, any *.annodbg variant
    #[clap(short, long)]
    annotation: String,

    // also count stored relations (scans the whole matrix)
    #[clap(short, long, default_value_t = false)]
    relations: bool,

    // append the log to this file in addition to stdout
    #[clap(short, long)]
    log_file: Option<String>,
}

fn main() {
    let args = Args::parse();

    match &args.log_file {
        Some(fp) => annodbg::log::setup_file_logging(fp),
        None => annodbg::log::setup_default_logging(),
    }

    info!("Loading annotation from {}", args.annotation);
    let load_time = Instant::now();
    let anno = match Annotator::load_from_file(&args.annotation) {
        Some(anno) => anno,
        None => {
            log::error!("Cannot load annotation from {}", args.annotation);
            std::process::exit(1);
        }
    };
    let load_time = load_time.elapsed();
    info!(
        "Finished loading in {:.3}s",
        (load_time.as_millis() as f64) * 1e-3
    );

    info!("* format: {}", anno.extension());
    info!("* rows: {}", anno.matrix.num_rows());
    info!("* labels: {}", anno.matrix.num_columns());
    for (i, label) in anno.label_encoder.labels().iter().enumerate().take(10) {
        info!("  [{}] {}", i, label);
    }
    if anno.label_encoder.len() > 10 {
        info!("  ... and {} more", anno.label_encoder.len() - 10);
    }

    if args.relations {
        info!("* relations: {}", anno.matrix.num_relations());
    }
}
