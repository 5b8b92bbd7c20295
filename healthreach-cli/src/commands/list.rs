use anyhow::{Context, Result};
use healthreach::AccessService;

pub async fn run(
    service: &AccessService,
    facility_type: Option<&str>,
    name: Option<&str>,
    json: bool,
) -> Result<()> {
    let list = match (facility_type, name) {
        (Some(facility_type), _) => service.facilities_by_type(facility_type).await,
        (None, Some(name)) => service.search_facilities(name).await,
        (None, None) => service.list_facilities().await,
    }
    .context("Failed to list facilities")?;

    if json {
        return super::print_json(&list);
    }

    println!(
        "{:<16} {:<40} {:<24} {:>22}",
        "ID", "NAME", "TYPE", "LOCATION"
    );
    println!("{}", "-".repeat(105));

    for facility in &list.data {
        println!(
            "{:<16} {:<40} {:<24} {:>10.6},{:>11.6}",
            facility.osm_id, facility.name, facility.category, facility.lat, facility.lon
        );
    }

    println!();
    println!("Total facilities: {}", list.data.len());
    Ok(())
}
