/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use std::sync::Arc;

use actix_web::web::Data;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::domain::action::location::process_location_update;
use crate::domain::types::location::LocationUpdateRequest;
use crate::environment::AppState;
use crate::tools::prometheus::QUEUE_GAUGE;

/// Handle onto the bounded async ingress queue.
///
/// Submissions are never dropped: when the queue is full the submitting task
/// gets the ping back and runs the update inline (caller-runs backpressure).
#[derive(Clone)]
pub struct LocationDispatcher {
    sender: Sender<LocationUpdateRequest>,
}

impl LocationDispatcher {
    pub fn channel(queue_size: usize) -> (Self, Receiver<LocationUpdateRequest>) {
        let (sender, receiver) = mpsc::channel(queue_size);
        (Self { sender }, receiver)
    }

    /// Enqueues a ping for the worker pool; hands it back on saturation so
    /// the caller can process it inline.
    pub fn try_submit(
        &self,
        request: LocationUpdateRequest,
    ) -> Result<(), LocationUpdateRequest> {
        match self.sender.try_send(request) {
            Ok(()) => {
                QUEUE_GAUGE.inc();
                Ok(())
            }
            Err(TrySendError::Full(request)) | Err(TrySendError::Closed(request)) => Err(request),
        }
    }
}

/// Drains the ingress queue with a pool of workers. Per-ping failures are
/// logged and do not stop the pool; the pool exits when every dispatcher
/// handle is dropped.
pub async fn run_workers(
    data: Data<AppState>,
    receiver: Receiver<LocationUpdateRequest>,
    workers: usize,
) {
    let receiver = Arc::new(Mutex::new(receiver));

    let mut handles = Vec::with_capacity(workers);
    for worker in 0..workers {
        let data = data.clone();
        let receiver = receiver.clone();
        handles.push(tokio::spawn(async move {
            loop {
                let next = { receiver.lock().await.recv().await };
                match next {
                    Some(request) => {
                        QUEUE_GAUGE.dec();
                        if let Err(err) = process_location_update(data.clone(), request).await {
                            error!(
                                tag = "[Async Ingress]",
                                worker,
                                error = %err.message(),
                                "Location update failed"
                            );
                        }
                    }
                    None => break,
                }
            }
            info!(tag = "[Async Ingress]", worker, "Worker stopped");
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ping(trip_id: i64) -> LocationUpdateRequest {
        LocationUpdateRequest {
            vehicle_id: 1,
            trip_id,
            latitude: 12.9716,
            longitude: 77.5946,
            speed: 10.0,
            timestamp: chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
        }
    }

    #[tokio::test]
    async fn full_queue_hands_the_ping_back() {
        let (dispatcher, _receiver) = LocationDispatcher::channel(1);

        assert!(dispatcher.try_submit(ping(1)).is_ok());
        let returned = dispatcher.try_submit(ping(2)).expect_err("queue should be full");
        assert_eq!(returned.trip_id, 2);
    }

    #[tokio::test]
    async fn queued_pings_survive_until_drained() {
        let (dispatcher, mut receiver) = LocationDispatcher::channel(4);

        dispatcher.try_submit(ping(1)).unwrap();
        dispatcher.try_submit(ping(2)).unwrap();

        assert_eq!(receiver.recv().await.unwrap().trip_id, 1);
        assert_eq!(receiver.recv().await.unwrap().trip_id, 2);
    }
}
