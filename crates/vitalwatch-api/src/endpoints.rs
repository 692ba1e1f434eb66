// Endpoint descriptors
//
// Symbolic operation names and the immutable table that resolves them to
// URL paths. The client's core `request` takes resolved paths; this module
// is the thin routing layer the resource wrappers sit on.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::error::Error;

/// Characters escaped in a single path segment (RFC 3986 `pchar` minus
/// the delimiters that would change which resource is addressed).
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Every operation the telemetry API exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum Endpoint {
    /// Health probe.
    Health,
    /// Generic API information.
    Api,
    /// Aggregate system statistics.
    Stats,
    /// Employee listing; `/{id}` for one employee.
    Employees,
    /// Employee statistics.
    EmployeesStats,
    /// IoT aggregate statistics.
    IotStats,
    /// All current employee locations.
    IotLocationsAll,
    /// Per-employee health readings (GET `/{id}`, POST to submit).
    IotHealth,
    /// Per-employee location (GET `/{id}`, POST to submit).
    IotLocation,
    /// Per-employee performance probe.
    IotPerformanceTest,
    /// IoT system self-test.
    IotTest,
}

impl Endpoint {
    /// The path this endpoint maps to on the upstream API.
    pub fn default_path(self) -> &'static str {
        match self {
            Self::Health => "/health",
            Self::Api => "/api",
            Self::Stats => "/api/stats",
            Self::Employees => "/api/employees",
            Self::EmployeesStats => "/api/employees-stats",
            Self::IotStats => "/api/iot/stats",
            Self::IotLocationsAll => "/api/iot/locations-all",
            Self::IotHealth => "/api/iot/health",
            Self::IotLocation => "/api/iot/location",
            Self::IotPerformanceTest => "/api/iot/performance-test",
            Self::IotTest => "/api/iot/test",
        }
    }

    /// Parse a kebab-case endpoint name.
    pub fn parse(name: &str) -> Result<Self, Error> {
        Self::from_str(name).map_err(|_| Error::UnknownEndpoint(name.to_owned()))
    }
}

/// Immutable lookup table from [`Endpoint`] to path.
#[derive(Debug, Clone)]
pub struct EndpointTable {
    paths: HashMap<Endpoint, String>,
}

impl Default for EndpointTable {
    fn default() -> Self {
        Self {
            paths: Endpoint::iter()
                .map(|e| (e, e.default_path().to_owned()))
                .collect(),
        }
    }
}

impl EndpointTable {
    /// Build a table from the defaults with name-keyed overrides applied.
    ///
    /// Every override key must name a known endpoint.
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Result<Self, Error> {
        let mut table = Self::default();
        for (name, path) in overrides {
            let endpoint = Endpoint::parse(name)?;
            table.paths.insert(endpoint, normalize_path(path));
        }
        Ok(table)
    }

    /// Resolve an endpoint to its path.
    pub fn path(&self, endpoint: Endpoint) -> &str {
        self.paths
            .get(&endpoint)
            .map_or_else(|| endpoint.default_path(), String::as_str)
    }

    /// Resolve a per-entity path: `{path}/{id}`, with `id` escaped as a
    /// single path segment.
    pub fn entity_path(&self, endpoint: Endpoint, id: &str) -> String {
        let id = utf8_percent_encode(id, SEGMENT);
        format!("{}/{id}", self.path(endpoint).trim_end_matches('/'))
    }

    /// All `(endpoint, path)` pairs in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = (Endpoint, &str)> {
        Endpoint::iter().map(|e| (e, self.path(e)))
    }
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{path}")
    }
}
