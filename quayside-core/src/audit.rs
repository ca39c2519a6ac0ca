use quayside_domain::{repository::AuditStore, EventCode};

/// Best-effort audit append. A failed log write is an observability gap,
/// not a business failure: it must never roll back or fail the mutation it
/// describes, so the error is downgraded to a warning here.
pub(crate) async fn record(store: &dyn AuditStore, code: EventCode, message: String) {
    if let Err(err) = store.append_audit(code, &message).await {
        tracing::warn!(%code, %err, "audit append failed, continuing");
    }
}
