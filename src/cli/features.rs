use std::io::Write;

use crate::cli::commands::FeaturesArgs;
use crate::errors::SiftError;
use crate::features::{featurize, write_csv, FeatureRow};

pub async fn handle_features(args: FeaturesArgs) -> Result<(), SiftError> {
    let payloads = super::ingest::read_snapshot(&args.input)?;
    let rows: Vec<FeatureRow> = payloads.iter().map(featurize).collect();

    let written = if args.output == "-" {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        write_csv(&rows, &mut lock)?
    } else {
        let mut file = std::fs::File::create(&args.output)?;
        let written = write_csv(&rows, &mut file)?;
        file.flush()?;
        written
    };

    if args.output != "-" {
        println!("Wrote {} feature rows to {}", written, args.output);
    }
    Ok(())
}
