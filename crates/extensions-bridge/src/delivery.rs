//! Delivery policies on top of [`TabHost`].
//!
//! Fire-and-forget notifications swallow every failure. Request/response
//! calls get one re-injection and retry when the tab has no runtime.

use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::errors::BridgeError;
use crate::host::TabHost;
use crate::messages::{BridgeResponse, PageRequest, TabId};

/// Send without caring about the outcome. Returns whether it was delivered.
pub async fn notify_best_effort(host: &dyn TabHost, tab: TabId, request: PageRequest) -> bool {
    let action = request.action();
    match host.send(tab, request).await {
        Ok(_) => true,
        Err(err) => {
            debug!(%tab, action, error = %err, "Best-effort message dropped");
            false
        }
    }
}

/// Make sure a runtime answers `ping` in `tab`, injecting one if needed.
pub async fn ensure_injected(host: &dyn TabHost, tab: TabId) -> Result<(), BridgeError> {
    match host.send(tab, PageRequest::Ping).await {
        Ok(response) if response.is_pong() => return Ok(()),
        Ok(_) => debug!(%tab, "Ping answered without pong"),
        Err(BridgeError::UnknownTab(tab)) => return Err(BridgeError::UnknownTab(tab)),
        Err(err) => debug!(%tab, error = %err, "Ping failed"),
    }
    match host.inject(tab).await {
        Ok(()) => {
            info!(%tab, "Page runtime injected");
            Ok(())
        }
        Err(err) => {
            warn!(%tab, error = %err, "Failed to inject page runtime");
            Err(err)
        }
    }
}

/// Send `request`; when the tab is unreachable inject once and retry.
pub async fn request_with_reinject(
    host: &dyn TabHost,
    config: &BridgeConfig,
    tab: TabId,
    request: PageRequest,
) -> Result<BridgeResponse, BridgeError> {
    match host.send(tab, request.clone()).await {
        Err(err) if err.is_unreachable() => {
            debug!(%tab, action = request.action(), "Retrying after injection");
            host.inject(tab).await?;
            if !config.settle_after_inject.is_zero() {
                tokio::time::sleep(config.settle_after_inject).await;
            }
            host.send(tab, request).await
        }
        other => other,
    }
}
