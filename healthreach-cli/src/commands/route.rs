use anyhow::{Context, Result};
use healthreach::compose::RouteQuery;
use healthreach::AccessService;

use crate::OriginArgs;

pub async fn run(
    service: &AccessService,
    origin: &OriginArgs,
    id: Option<&str>,
    name: Option<&str>,
    geometry: bool,
    json: bool,
) -> Result<()> {
    let query = RouteQuery::parse(
        origin.lat.as_deref(),
        origin.lon.as_deref(),
        origin.address.as_deref(),
        id,
        name,
        Some(if geometry { "true" } else { "false" }),
    )?;
    let route = service
        .shortest_path(&query)
        .await
        .context("Failed to compute route")?;

    if json {
        return super::print_json(&route);
    }

    println!("To: {} ({})", route.facility.name, route.facility.osm_id);
    if route.name_matches > 1 {
        println!(
            "Note: {} facilities matched the name, using the first",
            route.name_matches
        );
    }
    println!(
        "From node {} to node {}, cost {:.3}",
        route.source_node, route.target_node, route.cost
    );
    let edges: Vec<String> = route.edges.iter().map(|e| e.to_string()).collect();
    println!("Edges ({}): {}", edges.len(), edges.join(" "));
    Ok(())
}
