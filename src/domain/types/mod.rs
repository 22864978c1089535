pub mod dashboard;
pub mod geofence;
pub mod location;
pub mod trip;
