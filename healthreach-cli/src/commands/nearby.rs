use anyhow::{Context, Result};
use healthreach::compose::NearbyFacilitiesQuery;
use healthreach::AccessService;

use crate::OriginArgs;

pub async fn run(
    service: &AccessService,
    origin: &OriginArgs,
    facility_type: Option<&str>,
    json: bool,
) -> Result<()> {
    let query = NearbyFacilitiesQuery::parse(
        origin.lat.as_deref(),
        origin.lon.as_deref(),
        origin.address.as_deref(),
        facility_type,
    )?;
    let nearby = service
        .nearby_facilities(&query)
        .await
        .context("Failed to find nearby facilities")?;

    if json {
        return super::print_json(&nearby);
    }

    println!(
        "Origin: {:.6}, {:.6} (node {})",
        nearby.origin.lat, nearby.origin.lon, nearby.origin_node
    );
    println!();
    println!(
        "{:<16} {:<40} {:<24} {:>12} {:>10}",
        "ID", "NAME", "TYPE", "DISTANCE", "NODE"
    );
    println!("{}", "-".repeat(106));
    for entry in &nearby.facilities {
        println!(
            "{:<16} {:<40} {:<24} {:>10.2} m {:>10}",
            entry.facility.osm_id,
            entry.facility.name,
            entry.facility.category,
            entry.distance_meters,
            entry.node_id
        );
    }
    Ok(())
}
