//! Audit sink for Controller-driven OPC UA writes (spec §4.6): every
//! attempted write produces an `AuditRecord` regardless of outcome.
//!
//! No persistence layer is part of this bridge (spec Non-goals), so the
//! default sink logs structured events the way the teacher logs every
//! other domain event (`tracing::info!`/`warn!` with field-per-value),
//! rather than writing to a database as the teacher's own
//! `timescale_writer.rs` does for readings.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::metrics::AUDIT_OUTCOMES;
use crate::model::{AuditOutcome, AuditRecord};

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: AuditRecord);
}

pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: AuditRecord) {
        let outcome_label = match &record.outcome {
            AuditOutcome::Accepted => "accepted",
            AuditOutcome::Rejected(_) => "rejected",
            AuditOutcome::Deferred => "deferred",
        };
        AUDIT_OUTCOMES.with_label_values(&[outcome_label]).inc();

        match &record.outcome {
            AuditOutcome::Accepted => info!(
                audit_id = %record.id,
                node = %record.node_ref,
                element = %record.element_ref,
                user = record.user_id.as_deref().unwrap_or("unknown"),
                prior = record.prior_value.as_deref().unwrap_or(""),
                new = record.new_value.as_deref().unwrap_or(""),
                "OPC UA write accepted"
            ),
            AuditOutcome::Rejected(reason) => warn!(
                audit_id = %record.id,
                node = %record.node_ref,
                element = %record.element_ref,
                user = record.user_id.as_deref().unwrap_or("unknown"),
                reason = %reason,
                "OPC UA write rejected"
            ),
            AuditOutcome::Deferred => info!(
                audit_id = %record.id,
                node = %record.node_ref,
                element = %record.element_ref,
                "OPC UA write deferred: session unavailable"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Direction, ElementRef, NodeRef};

    #[tokio::test]
    async fn records_accepted_outcome_without_panicking() {
        let sink = TracingAuditSink;
        let record = AuditRecord::new(
            Direction::AasToOpc,
            NodeRef::new("plc1", "ns=2;s=Setpoint"),
            ElementRef::new("urn:sm", "Setpoint"),
            Some("10".into()),
            Some("12".into()),
            Some("operator1".into()),
            AuditOutcome::Accepted,
        );
        sink.record(record).await;
    }
}
