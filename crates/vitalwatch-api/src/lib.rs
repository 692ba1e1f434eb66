// vitalwatch-api: resilient access to the vitalwatch telemetry server
//
// Two halves: `ApiClient` (cached HTTP reads with timeout and fallback)
// and `RealtimeChannel` (auto-reconnecting WebSocket pub/sub).

mod cache;
pub mod client;
pub mod endpoints;
pub mod error;
pub mod fallback;
pub mod fanout;
pub mod frame;
pub mod realtime;
mod resources;
pub mod transport;

pub use client::{
    ApiClient, ApiResponse, ClientConfig, ConnectionStatus, DEFAULT_CACHE_WINDOW, DEFAULT_TIMEOUT,
    Origin, UsageStats,
};
pub use endpoints::{Endpoint, EndpointTable};
pub use error::Error;
pub use fallback::{FallbackSource, FallbackTable};
pub use fanout::{DEFAULT_BATCH_SIZE, Settled, fetch_batched};
pub use frame::Frame;
pub use realtime::{ConnectionState, Handler, RealtimeChannel, RealtimeConfig, websocket_url};
pub use resources::DashboardSnapshot;
pub use transport::{TlsMode, TransportConfig};
