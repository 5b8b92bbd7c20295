use anyhow::{Context, Result};
use healthreach::compose::{BufferQuery, DistanceBandQuery};
use healthreach::AccessService;

pub async fn buffer(service: &AccessService, id: &str, radius: &str, json: bool) -> Result<()> {
    let query = BufferQuery::parse(Some(id), Some(radius))?;
    let result = service
        .population_in_buffer(&query)
        .await
        .context("Failed to estimate buffer population")?;

    if json {
        return super::print_json(&result);
    }

    println!(
        "{} people within {} m of {}",
        result.estimated_population, result.radius_meters, result.facility_osm_id
    );
    Ok(())
}

pub async fn stats(service: &AccessService, facility_type: Option<&str>, json: bool) -> Result<()> {
    let query = DistanceBandQuery::parse(facility_type);
    let bands = service
        .population_by_distance(&query)
        .await
        .context("Failed to compute distance-band statistics")?;

    if json {
        return super::print_json(&bands);
    }

    let total: i64 = bands.iter().map(|b| b.total_population).sum();
    println!("{:<10} {:>14} {:>8}", "BAND", "POPULATION", "SHARE");
    println!("{}", "-".repeat(34));
    for band in &bands {
        let share = if total > 0 {
            band.total_population as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        println!(
            "{:<10} {:>14} {:>7.1}%",
            band.distance_bin.label(),
            band.total_population,
            share
        );
    }
    println!();
    println!("Total population: {}", total);
    Ok(())
}
