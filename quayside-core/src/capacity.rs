use std::sync::Arc;

use tracing::info;

use quayside_domain::{CapacityConfig, Requester, TerminalStore};

use crate::error::CoreError;

/// Admin handle on the process-wide capacity defaults. Updates apply only
/// to slots created afterwards; existing slots keep the figures they were
/// born with.
pub struct CapacityAdmin {
    store: Arc<dyn TerminalStore>,
}

impl CapacityAdmin {
    pub fn new(store: Arc<dyn TerminalStore>) -> Self {
        Self { store }
    }

    pub async fn current(&self) -> Result<CapacityConfig, CoreError> {
        Ok(self.store.capacity_config().await?)
    }

    pub async fn update(
        &self,
        requester: &Requester,
        config: CapacityConfig,
    ) -> Result<CapacityConfig, CoreError> {
        if !requester.is_admin() {
            return Err(CoreError::Unauthorized);
        }
        if config.capacity < 1 {
            return Err(CoreError::Validation("capacity must be at least 1".into()));
        }
        if config.late_capacity < 0 {
            return Err(CoreError::Validation(
                "late_capacity must not be negative".into(),
            ));
        }

        self.store.set_capacity_config(config).await?;
        info!(
            capacity = config.capacity,
            late_capacity = config.late_capacity,
            "capacity defaults updated"
        );
        Ok(config)
    }
}
