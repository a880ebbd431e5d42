//! Prometheus metrics recorder and `/metrics` rendering.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Upgrade requests rejected before reaching the hub (counter, labels: reason).
pub const WS_HANDSHAKE_REJECTIONS_TOTAL: &str = "ws_handshake_rejections_total";

/// Install the Prometheus metrics recorder (global).
///
/// Call once at startup, before anything is recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// A handle backed by a recorder that is not installed globally.
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

/// Render Prometheus text format.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_render_does_not_panic() {
        let output = render(&detached_handle());
        assert!(output.is_empty() || output.contains('#') || output.contains('\n'));
    }

    #[test]
    fn rejection_metric_is_snake_case() {
        assert!(
            WS_HANDSHAKE_REJECTIONS_TOTAL
                .chars()
                .all(|c| c.is_ascii_lowercase() || c == '_')
        );
    }
}
