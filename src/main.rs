/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use std::env::var;
use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use tracing_actix_web::TracingLogger;
use vehicle_tracking_service::{
    common::types::Clock,
    dispatcher::{run_workers, LocationDispatcher},
    domain::api,
    environment::{AppConfig, AppState},
    middleware::{CheckContentLength, DomainRootSpanBuilder, RequestTimeout},
    notifier::LogNotifier,
    seed::seed_demo_fleet,
    storage::memory::MemoryStorage,
    tools::{logger::setup_tracing, prometheus::prometheus_metrics},
};

pub fn read_dhall_config(config_path: &str) -> Result<AppConfig, String> {
    let config = serde_dhall::from_file(config_path).parse::<AppConfig>();
    match config {
        Ok(config) => Ok(config),
        Err(e) => Err(format!("Error reading config: {}", e)),
    }
}

#[actix_web::main]
async fn start_server() -> std::io::Result<()> {
    let dhall_config_path = var("DHALL_CONFIG")
        .unwrap_or_else(|_| "./dhall_config/vehicle_tracking_service.dhall".to_string());
    let app_config = read_dhall_config(&dhall_config_path).unwrap_or_else(|err| {
        println!("Dhall Config Reading Error : {}", err);
        std::process::exit(1);
    });

    let _guard = setup_tracing(app_config.logger_cfg);

    let port = app_config.port;
    let workers = app_config.workers;

    let storage = Arc::new(MemoryStorage::new());
    if app_config.seed_demo_data {
        seed_demo_fleet(storage.as_ref())
            .await
            .expect("Failed to seed demo fleet");
    }

    let (dispatcher, receiver) = LocationDispatcher::channel(app_config.dispatcher_queue_size);
    let app_state = AppState::new(
        &app_config,
        storage,
        Arc::new(LogNotifier),
        dispatcher,
        Clock::System,
    );

    let data = web::Data::new(app_state);

    let worker_data = data.clone();
    let pool = tokio::spawn(async move {
        run_workers(worker_data, receiver, workers).await;
    });

    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(RequestTimeout)
            .wrap(CheckContentLength)
            .wrap(TracingLogger::<DomainRootSpanBuilder>::new())
            .wrap(prometheus_metrics())
            .configure(api::handler)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await?;

    pool.await.expect("Ingress worker pool panicked");

    Ok(())
}

fn main() {
    start_server().expect("Failed to start the server");
}
