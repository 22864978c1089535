/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use prometheus::{register_int_counter_vec, register_int_gauge, IntCounterVec, IntGauge};

/// Depth of the async ingress queue. Incremented on enqueue, decremented when
/// a worker picks the ping up; a persistently high value means the pool is
/// saturated and callers are running updates inline.
pub static QUEUE_GAUGE: once_cell::sync::Lazy<IntGauge> = once_cell::sync::Lazy::new(|| {
    register_int_gauge!("ingress_queue_depth", "Async ingress queue depth")
        .expect("Failed to register ingress queue depth metrics")
});

pub static GEOFENCE_EVENTS: once_cell::sync::Lazy<IntCounterVec> =
    once_cell::sync::Lazy::new(|| {
        register_int_counter_vec!(
            "geofence_events_total",
            "Audit events emitted by the geofence engine",
            &["event_type"]
        )
        .expect("Failed to register geofence event metrics")
    });

pub fn prometheus_metrics() -> PrometheusMetrics {
    let prometheus = PrometheusMetricsBuilder::new("api")
        .endpoint("/metrics")
        .build()
        .expect("Failed to create Prometheus Metrics");

    prometheus
        .registry
        .register(Box::new(QUEUE_GAUGE.clone()))
        .expect("Failed to register ingress queue depth metrics");

    prometheus
        .registry
        .register(Box::new(GEOFENCE_EVENTS.clone()))
        .expect("Failed to register geofence event metrics");

    prometheus
}
