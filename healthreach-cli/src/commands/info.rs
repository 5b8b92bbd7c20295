use anyhow::{Context, Result};
use healthreach::AccessService;

use super::optional;

pub async fn run(service: &AccessService, id: Option<&str>, json: bool) -> Result<()> {
    let Some(id) = id else {
        return density(service, json).await;
    };

    let facility = service
        .get_facility(id)
        .await
        .with_context(|| format!("Failed to load facility {}", id))?;

    if json {
        return super::print_json(&facility);
    }

    println!("Facility: {}", facility.name);
    println!("ID: {}", facility.osm_id);
    println!();
    println!("Type: {}", facility.category);
    println!("Speciality: {}", facility.healthcare_speciality);
    println!("Location: {:.6}, {:.6}", facility.lat, facility.lon);
    println!("Address: {}", optional(&facility.address));
    println!("Opening hours: {}", optional(&facility.opening_hours));
    println!(
        "Operator: {} ({})",
        optional(&facility.operator),
        optional(&facility.operator_type)
    );
    println!("Phone: {}", optional(&facility.phone));
    println!("Website: {}", optional(&facility.website));
    println!("Wheelchair: {}", optional(&facility.wheelchair));
    Ok(())
}

async fn density(service: &AccessService, json: bool) -> Result<()> {
    let counts = service
        .facility_density()
        .await
        .context("Failed to count facilities")?;

    if json {
        return super::print_json(&counts);
    }

    println!("{:<32} {:>8}", "TYPE", "COUNT");
    println!("{}", "-".repeat(41));
    for entry in &counts {
        println!("{:<32} {:>8}", entry.category, entry.count);
    }
    Ok(())
}
