//! Metric names recorded by the hub and worker.
//!
//! Recording goes through the `metrics` facade; installing an exporter is the
//! server's job.

/// Connections accepted total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Currently joined connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Connection lifetime seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Broadcast calls total (counter, labels: kind).
pub const WS_BROADCASTS_TOTAL: &str = "ws_broadcasts_total";
/// Members evicted after a failed send (counter).
pub const WS_BROADCAST_EVICTIONS_TOTAL: &str = "ws_broadcast_evictions_total";
