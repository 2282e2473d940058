use serde_json::{Map, Value};

use subminer_core::error::Result;

use super::SettingsStore;

const SHOULD_SHOW_KEY: &str = "shouldShowUpdateAlert";
const LAST_ALERT_VERSION_KEY: &str = "lastUpdateAlertVersion";

/// Queue an alert for `current_version` unless one was already shown for it.
pub async fn enqueue_update_alert(store: &dyn SettingsStore, current_version: &str) -> Result<()> {
    let last = store.get_single(LAST_ALERT_VERSION_KEY).await?;
    if last.as_ref().and_then(Value::as_str) == Some(current_version) {
        return Ok(());
    }

    tracing::debug!(version = current_version, "update alert queued");
    store
        .set(Map::from_iter([(SHOULD_SHOW_KEY.to_string(), Value::Bool(true))]))
        .await
}

/// Read and clear the queued alert. When it was queued, `current_version`
/// becomes the last alerted version.
pub async fn should_show_update_alert(store: &dyn SettingsStore, current_version: &str) -> Result<bool> {
    let should_show = store
        .get_single(SHOULD_SHOW_KEY)
        .await?
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    if should_show {
        store.remove(SHOULD_SHOW_KEY).await?;
        store
            .set(Map::from_iter([(
                LAST_ALERT_VERSION_KEY.to_string(),
                Value::String(current_version.to_string()),
            )]))
            .await?;
    }
    Ok(should_show)
}
