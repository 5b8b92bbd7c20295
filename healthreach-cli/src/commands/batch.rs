use anyhow::{Context, Result};
use healthreach::compose::NearestFacilityQuery;
use healthreach::{AccessService, ErrorKind};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const ADDED_COLUMNS: [&str; 4] = [
    "nearest_id",
    "nearest_name",
    "nearest_type",
    "distance_meters",
];

pub async fn run(
    service: &AccessService,
    input: PathBuf,
    output: Option<PathBuf>,
    lat_col: &str,
    lon_col: &str,
    facility_type: Option<&str>,
) -> Result<()> {
    let file = File::open(&input).context("Failed to open input file")?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));

    // Find column indices
    let headers = reader.headers()?.clone();
    let lat_idx = headers
        .iter()
        .position(|h| h == lat_col)
        .with_context(|| format!("Column '{}' not found in CSV", lat_col))?;
    let lon_idx = headers
        .iter()
        .position(|h| h == lon_col)
        .with_context(|| format!("Column '{}' not found in CSV", lon_col))?;

    // Collect records for progress bar
    let records: Vec<_> = reader.records().collect::<Result<_, _>>()?;
    let total = records.len() as u64;

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    let output_path = output.unwrap_or_else(|| default_output(&input));
    let output_file = File::create(&output_path).context("Failed to create output file")?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(output_file));

    let mut new_headers: Vec<&str> = headers.iter().collect();
    new_headers.extend(ADDED_COLUMNS);
    writer.write_record(&new_headers)?;

    let mut unmatched = 0u64;
    for record in records {
        let query =
            NearestFacilityQuery::parse(record.get(lat_idx), record.get(lon_idx), facility_type);

        let result = match query {
            Ok(query) => service.nearest_facility(&query).await,
            Err(e) => Err(e),
        };

        let added = match result {
            Ok(nearest) => [
                nearest.osm_id,
                nearest.name,
                nearest.amenity,
                format!("{:.2}", nearest.distance_meters),
            ],
            // Bad rows and rows without a match stay in the output, blank.
            Err(e) if matches!(e.kind(), ErrorKind::Validation | ErrorKind::NotFound) => {
                unmatched += 1;
                pb.println(format!("Row skipped: {}", e));
                Default::default()
            }
            Err(e) => return Err(e).context("Nearest facility query failed"),
        };

        let mut new_record: Vec<&str> = record.iter().collect();
        new_record.extend(added.iter().map(String::as_str));
        writer.write_record(&new_record)?;

        pb.inc(1);
    }

    pb.finish_with_message("done");
    writer.flush()?;

    if unmatched > 0 {
        println!("{} of {} rows had no result", unmatched, total);
    }
    println!("Output written to: {}", output_path.display());
    Ok(())
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}_nearest.csv", stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_name() {
        assert_eq!(
            default_output(Path::new("/tmp/patients.csv")),
            PathBuf::from("/tmp/patients_nearest.csv")
        );
    }
}
