use anyhow::{Context, Result};
use healthreach::compose::NearestFacilityQuery;
use healthreach::AccessService;

pub async fn run(
    service: &AccessService,
    lat: &str,
    lon: &str,
    facility_type: Option<&str>,
    json: bool,
) -> Result<()> {
    let query = NearestFacilityQuery::parse(Some(lat), Some(lon), facility_type)?;
    let nearest = service
        .nearest_facility(&query)
        .await
        .context("Failed to find nearest facility")?;

    if json {
        return super::print_json(&nearest);
    }

    println!("{} ({})", nearest.name, nearest.osm_id);
    println!("Type: {}", nearest.amenity);
    println!("Speciality: {}", nearest.healthcare_speciality);
    println!("Distance: {:.2} m", nearest.distance_meters);
    Ok(())
}
