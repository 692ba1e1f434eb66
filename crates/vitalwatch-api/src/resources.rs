// Telemetry API resource endpoints
//
// Thin wrappers that resolve a symbolic endpoint and call `request`.
// Reads are cached and may fall back; submissions are plain POSTs.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::{ApiClient, ApiResponse};
use crate::endpoints::Endpoint;
use crate::error::Error;
use crate::fanout::{DEFAULT_BATCH_SIZE, fetch_batched};

/// The reads the dashboard always issues together.
///
/// Each field settles on its own, so partial data survives a failure.
#[derive(Debug)]
pub struct DashboardSnapshot {
    pub employees_stats: Result<ApiResponse, Error>,
    pub iot_stats: Result<ApiResponse, Error>,
    pub locations: Result<ApiResponse, Error>,
}

impl DashboardSnapshot {
    /// Number of reads that failed outright.
    pub fn failures(&self) -> usize {
        [&self.employees_stats, &self.iot_stats, &self.locations]
            .iter()
            .filter(|r| r.is_err())
            .count()
    }
}

impl ApiClient {
    // ── System ───────────────────────────────────────────────────────

    /// `GET /health`
    pub async fn api_status(&self) -> Result<ApiResponse, Error> {
        self.get(self.endpoints().path(Endpoint::Health)).await
    }

    /// `GET /api`
    pub async fn api_info(&self) -> Result<ApiResponse, Error> {
        self.get(self.endpoints().path(Endpoint::Api)).await
    }

    /// `GET /api/stats`
    pub async fn system_stats(&self) -> Result<ApiResponse, Error> {
        self.get(self.endpoints().path(Endpoint::Stats)).await
    }

    // ── Employees ────────────────────────────────────────────────────

    pub async fn employees(&self) -> Result<ApiResponse, Error> {
        self.get(self.endpoints().path(Endpoint::Employees)).await
    }

    pub async fn employees_stats(&self) -> Result<ApiResponse, Error> {
        self.get(self.endpoints().path(Endpoint::EmployeesStats)).await
    }

    /// `GET /api/employees/{id}`
    pub async fn employee(&self, id: &str) -> Result<ApiResponse, Error> {
        let path = self.endpoints().entity_path(Endpoint::Employees, id);
        self.get(&path).await
    }

    // ── IoT ──────────────────────────────────────────────────────────

    pub async fn iot_stats(&self) -> Result<ApiResponse, Error> {
        self.get(self.endpoints().path(Endpoint::IotStats)).await
    }

    /// Current location of every tracked employee.
    pub async fn all_current_locations(&self) -> Result<ApiResponse, Error> {
        self.get(self.endpoints().path(Endpoint::IotLocationsAll)).await
    }

    /// `GET /api/iot/health/{id}`. Records are newest first.
    pub async fn employee_health_data(&self, id: &str) -> Result<ApiResponse, Error> {
        let path = self.endpoints().entity_path(Endpoint::IotHealth, id);
        self.get(&path).await
    }

    pub async fn employee_location(&self, id: &str) -> Result<ApiResponse, Error> {
        let path = self.endpoints().entity_path(Endpoint::IotLocation, id);
        self.get(&path).await
    }

    pub async fn performance_test(&self, id: &str) -> Result<ApiResponse, Error> {
        let path = self.endpoints().entity_path(Endpoint::IotPerformanceTest, id);
        self.get(&path).await
    }

    /// `POST /api/iot/test` -- server-side self-test.
    pub async fn test_iot_system(&self) -> Result<ApiResponse, Error> {
        self.post(self.endpoints().path(Endpoint::IotTest), None).await
    }

    // ── Submissions ──────────────────────────────────────────────────

    /// `POST /api/iot/health`
    pub async fn send_health_data(&self, reading: &Value) -> Result<ApiResponse, Error> {
        self.post(self.endpoints().path(Endpoint::IotHealth), Some(reading))
            .await
    }

    /// `POST /api/iot/location`
    pub async fn send_location_data(&self, location: &Value) -> Result<ApiResponse, Error> {
        self.post(self.endpoints().path(Endpoint::IotLocation), Some(location))
            .await
    }

    // ── Aggregates ───────────────────────────────────────────────────

    /// Fetch employee stats, IoT stats and all locations concurrently.
    pub async fn dashboard_snapshot(&self) -> DashboardSnapshot {
        let (employees_stats, iot_stats, locations) = tokio::join!(
            self.employees_stats(),
            self.iot_stats(),
            self.all_current_locations(),
        );
        let snapshot = DashboardSnapshot {
            employees_stats,
            iot_stats,
            locations,
        };
        debug!(failures = snapshot.failures(), "dashboard snapshot settled");
        snapshot
    }

    /// Latest health record per employee, fetched [`DEFAULT_BATCH_SIZE`]
    /// at a time.
    pub async fn get_all_employees_health_data<S: AsRef<str>>(
        &self,
        employee_ids: &[S],
    ) -> BTreeMap<String, Value> {
        self.employees_health_batched(employee_ids, DEFAULT_BATCH_SIZE)
            .await
    }

    /// Latest health record per employee with an explicit concurrency cap.
    ///
    /// Only employees whose response is `{success: true, data: [..]}` with
    /// at least one record appear in the map. Failures are logged and
    /// skipped.
    pub async fn employees_health_batched<S: AsRef<str>>(
        &self,
        employee_ids: &[S],
        batch_size: usize,
    ) -> BTreeMap<String, Value> {
        let ids = employee_ids.iter().map(|id| id.as_ref().to_owned());
        let results = fetch_batched(ids, batch_size, |id| async move {
            self.employee_health_data(&id).await
        })
        .await;

        let mut latest = BTreeMap::new();
        for (id, result) in results {
            match result {
                Ok(resp) => match latest_record(&resp.data) {
                    Some(record) => {
                        let key = record
                            .get("employee_id")
                            .and_then(Value::as_str)
                            .map_or_else(|| id.clone(), str::to_owned);
                        latest.insert(key, record.clone());
                    }
                    None => debug!(employee_id = %id, "no health records"),
                },
                Err(err) => warn!(employee_id = %id, error = %err, "health fetch failed"),
            }
        }

        info!(
            requested = employee_ids.len(),
            found = latest.len(),
            "employee health data collected"
        );
        latest
    }
}

/// The newest record of a `{success: true, data: [newest, ...]}` envelope.
fn latest_record(envelope: &Value) -> Option<&Value> {
    if envelope.get("success").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    envelope.get("data")?.as_array()?.first()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn latest_record_takes_first_entry() {
        let env = json!({
            "success": true,
            "data": [
                {"employee_id": "EMP001", "heart_rate": 75},
                {"employee_id": "EMP001", "heart_rate": 70}
            ]
        });
        assert_eq!(latest_record(&env).unwrap()["heart_rate"], 75);
    }

    #[test]
    fn latest_record_requires_success_and_data() {
        assert!(latest_record(&json!({"success": false, "data": [{"x": 1}]})).is_none());
        assert!(latest_record(&json!({"success": true, "data": []})).is_none());
        assert!(latest_record(&json!({"success": true})).is_none());
    }

    #[test]
    fn snapshot_counts_failures() {
        let snapshot = DashboardSnapshot {
            employees_stats: Ok(ApiResponse::new(json!({}), crate::Origin::Live)),
            iot_stats: Err(Error::Timeout { timeout_ms: 1 }),
            locations: Ok(ApiResponse::new(json!([]), crate::Origin::Cache)),
        };
        assert_eq!(snapshot.failures(), 1);
    }
}
