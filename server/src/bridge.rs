use crate::model::{SolutionRecord, StatusModel};
use serde_json::json;
use std::{
    net::SocketAddr,
    sync::{Arc, RwLock},
    thread,
};
use tdoacore::telemetry::MetricsSnapshot;
use tokio::runtime::Builder;
use warp::Filter;

/// Bridge that serves the latest accepted solution and pipeline counters
/// over HTTP for whatever renders the situation picture.
pub struct StatusBridge {
    state: Arc<RwLock<StatusModel>>,
}

impl StatusBridge {
    pub fn new(bind: SocketAddr) -> Self {
        let state = Arc::new(RwLock::new(StatusModel::default()));
        let state_for_filter = state.clone();
        let state_filter = warp::any().map(move || state_for_filter.clone());

        let latest_route = warp::path("latest")
            .and(warp::get())
            .and(state_filter)
            .map(|state: Arc<RwLock<StatusModel>>| warp::reply::json(&*state.read().unwrap()));

        let health_route = warp::path("healthz")
            .and(warp::get())
            .map(|| warp::reply::json(&json!({"status": "ok"})));

        thread::spawn(move || {
            let routes = latest_route.or(health_route);
            let runtime = Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to build runtime");
            runtime.block_on(async move {
                warp::serve(routes).run(bind).await;
            });
        });

        Self { state }
    }

    pub fn publish(&self, record: &SolutionRecord, metrics: MetricsSnapshot) {
        let mut guard = self.state.write().unwrap();
        guard.metrics = metrics;
        guard.latest = Some(record.clone());
        println!(
            "[status] {} solution from {} receiver(s) at {}",
            match record.kind {
                crate::model::SolutionKind::Locus => "locus",
                crate::model::SolutionKind::Position => "position",
            },
            record.receivers.len(),
            record.emission_time
        );
    }

    pub fn publish_status(&self, message: &str) {
        println!("[status] {}", message);
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> StatusModel {
        self.state.read().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SolutionKind;
    use chrono::{TimeZone, Utc};

    #[test]
    fn publish_updates_the_served_state() {
        let bridge = StatusBridge::new("127.0.0.1:0".parse().unwrap());
        let record = SolutionRecord {
            kind: SolutionKind::Position,
            emission_time: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            receivers: vec!["rx-a".into(), "rx-b".into(), "rx-c".into()],
            position: Some(tdoacore::geodesy::LatLon::new(0.004, 0.003)),
            residual_rms_m: Some(0.2),
            semi_major_m: None,
            delta_t_s: None,
            points: Vec::new(),
        };
        bridge.publish(&record, MetricsSnapshot::default());

        let snapshot = bridge.snapshot();
        assert!(snapshot.latest.is_some());
        assert_eq!(snapshot.latest.unwrap().receivers.len(), 3);
    }
}
