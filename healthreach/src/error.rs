//! Error types for the HealthReach core.

use thiserror::Error;

/// How a failure should be surfaced to a caller.
///
/// Every [`AccessError`] falls into exactly one of these classes, which the
/// HTTP layer maps onto status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed input. Nothing was queried.
    Validation,
    /// A well-formed query legitimately matched nothing.
    NotFound,
    /// An external collaborator (map server, geocoder) could not be reached.
    Upstream,
    /// The spatial engine or the service itself failed.
    Internal,
}

/// Errors that can occur while answering accessibility queries.
#[derive(Error, Debug)]
pub enum AccessError {
    /// A request parameter is missing.
    #[error("Parameter '{name}' is required")]
    MissingParameter { name: &'static str },

    /// A request parameter could not be parsed or is out of range.
    #[error("Invalid '{name}' value: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Coordinates outside the WGS84 range.
    #[error("Coordinates out of bounds: lat={lat}, lon={lon} (valid: lat ±90°, lon ±180°)")]
    OutOfBounds { lat: f64, lon: f64 },

    /// The geocoder returned no match for an address.
    #[error("Could not resolve address '{address}' to coordinates")]
    AddressNotResolved { address: String },

    /// A facility with this id already exists.
    #[error("Facility '{id}' already exists")]
    DuplicateFacility { id: String },

    /// No facility matched the query.
    #[error("{message}")]
    NotFound { message: String },

    /// The road network has no vertices to snap to.
    #[error("No route network near point ({lat}, {lon})")]
    NoRouteNetwork { lat: f64, lon: f64 },

    /// The two vertices lie in different connected components.
    #[error("No route from node {source_vertex} to node {target_vertex}")]
    Unreachable {
        source_vertex: i64,
        target_vertex: i64,
    },

    /// The winning road vertex could not be mapped back to one facility.
    #[error("Road node {vertex} maps to {candidates} facilities, expected exactly one")]
    VertexMapping { vertex: i64, candidates: usize },

    /// The geocoder request failed.
    #[error("Geocoding failed: {0}")]
    Geocoder(String),

    /// The map server could not be reached.
    #[error("Map server request failed: {0}")]
    Gateway(String),

    /// A collaborator the operation needs was not configured.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// The reference dataset is inconsistent.
    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    /// IO error when reading dataset files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Dataset or engine payload could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The in-memory engine failed.
    #[error("Store error: {0}")]
    Store(String),

    /// The PostGIS engine failed.
    #[cfg(feature = "postgis")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AccessError {
    /// Build a [`AccessError::NotFound`] from any message.
    pub fn not_found(message: impl Into<String>) -> Self {
        AccessError::NotFound {
            message: message.into(),
        }
    }

    /// Build a [`AccessError::InvalidParameter`].
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        AccessError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// Classify this error for the caller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccessError::MissingParameter { .. }
            | AccessError::InvalidParameter { .. }
            | AccessError::OutOfBounds { .. }
            | AccessError::AddressNotResolved { .. }
            | AccessError::DuplicateFacility { .. } => ErrorKind::Validation,
            AccessError::NotFound { .. }
            | AccessError::NoRouteNetwork { .. }
            | AccessError::Unreachable { .. } => ErrorKind::NotFound,
            AccessError::Gateway(_) => ErrorKind::Upstream,
            _ => ErrorKind::Internal,
        }
    }
}

/// Result type alias using [`AccessError`].
pub type Result<T> = std::result::Result<T, AccessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AccessError::MissingParameter { name: "id" };
        assert_eq!(err.to_string(), "Parameter 'id' is required");

        let err = AccessError::OutOfBounds {
            lat: 91.0,
            lon: 0.0,
        };
        assert!(err.to_string().contains("91"));

        let err = AccessError::Unreachable {
            source_vertex: 3,
            target_vertex: 9,
        };
        assert!(err.to_string().contains("node 3"));
        assert!(err.to_string().contains("node 9"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            AccessError::invalid("radius_meters", "must be positive").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            AccessError::AddressNotResolved {
                address: "nowhere".into()
            }
            .kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            AccessError::not_found("No facilities found").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            AccessError::NoRouteNetwork { lat: 0.0, lon: 0.0 }.kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            AccessError::VertexMapping {
                vertex: 1,
                candidates: 2
            }
            .kind(),
            ErrorKind::Internal
        );
        assert_eq!(
            AccessError::Gateway("connection refused".into()).kind(),
            ErrorKind::Upstream
        );
        assert_eq!(
            AccessError::Store("lock poisoned".into()).kind(),
            ErrorKind::Internal
        );
    }
}
