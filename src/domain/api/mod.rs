pub mod audit;
pub mod dashboard;
pub mod geofence;
pub mod healthcheck;
pub mod location;

use actix_web::web::ServiceConfig;

pub fn handler(config: &mut ServiceConfig) {
    config
        .service(location::update_location)
        .service(location::update_location_async)
        .service(location::batch_update)
        .service(location::manual_close)
        .service(dashboard::dashboard_data)
        .service(dashboard::start_trip)
        .service(dashboard::reset)
        .service(audit::events_by_trip)
        .service(audit::events_by_vehicle)
        .service(audit::events_by_time_range)
        .service(geofence::list)
        .service(geofence::get)
        .service(geofence::create)
        .service(geofence::update)
        .service(geofence::delete)
        .service(healthcheck::health_check);
}
