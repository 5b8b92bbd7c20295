use anyhow::{Context, Result};
use healthreach::compose::NetworkNearestQuery;
use healthreach::AccessService;

use crate::OriginArgs;

pub async fn run(
    service: &AccessService,
    origin: &OriginArgs,
    facility_type: Option<&str>,
    json: bool,
) -> Result<()> {
    let query = NetworkNearestQuery::parse(
        origin.lat.as_deref(),
        origin.lon.as_deref(),
        origin.address.as_deref(),
        facility_type,
    )?;
    let nearest = service
        .nearest_facility_network(&query)
        .await
        .context("Failed to find network-nearest facility")?;

    if json {
        return super::print_json(&nearest);
    }

    println!("{} ({})", nearest.facility.name, nearest.facility.osm_id);
    println!("Type: {}", nearest.facility.category);
    println!(
        "Route cost: {:.3} (node {} to node {})",
        nearest.cost, nearest.source_node, nearest.target_node
    );
    println!("Candidates compared: {}", nearest.candidates);
    Ok(())
}
