//! # Status Tracker
//!
//! Accumulates the status produced by one pass. Starts from the status the
//! pass read, so fields a pass does not touch (version, last applied hash,
//! health) survive a failed pass.

use crate::adapter::{HealthIssue, HealthSeverity, Ownership};
use crate::controller::reconciler::status::conditions::{
    self, reasons, status_string, upsert_condition,
};
use crate::crd::{Condition, HealthIssueStatus, HealthStatus, ManagedResource, ServiceStatus};
use chrono::{DateTime, Utc};
use kube::Resource;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StatusTracker {
    status: ServiceStatus,
    generation: Option<i64>,
    now: DateTime<Utc>,
}

impl StatusTracker {
    pub fn new<K: ManagedResource>(resource: &K) -> Self {
        let mut status = resource.service_status().cloned().unwrap_or_default();
        status.registration = None;
        Self {
            status,
            generation: resource.meta().generation,
            now: Utc::now(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn status(&self) -> &ServiceStatus {
        &self.status
    }

    pub fn set_condition(
        &mut self,
        condition_type: &str,
        value: bool,
        reason: &str,
        message: impl Into<String>,
    ) {
        upsert_condition(
            &mut self.status.conditions,
            Condition {
                r#type: condition_type.to_string(),
                status: status_string(value).to_string(),
                observed_generation: self.generation,
                last_transition_time: Some(self.now.to_rfc3339()),
                reason: Some(reason.to_string()),
                message: Some(message.into()),
            },
        );
    }

    pub fn ready(&mut self, value: bool, reason: &str, message: impl Into<String>) {
        self.set_condition(conditions::READY, value, reason, message);
    }

    pub fn synced(&mut self, value: bool, reason: &str, message: impl Into<String>) {
        self.set_condition(conditions::SYNCED, value, reason, message);
    }

    pub fn connected(&mut self, version: String) {
        let message = format!("Connected to version {version}");
        self.status.connected = true;
        self.status.service_version = Some(version);
        self.set_condition(conditions::CONNECTED, true, reasons::CONNECTED, message);
    }

    pub fn disconnected(&mut self, message: impl Into<String>) {
        self.status.connected = false;
        self.set_condition(
            conditions::CONNECTED,
            false,
            reasons::CONNECTION_FAILED,
            message,
        );
    }

    /// Record a fully successful pass
    pub fn converged(&mut self, content_hash: &str) {
        self.status.last_reconcile_time = Some(self.now.to_rfc3339());
        self.status.last_applied_hash = Some(content_hash.to_string());
    }

    pub fn health(&mut self, issues: &[HealthIssue]) {
        let count = |severity: HealthSeverity| {
            issues.iter().filter(|i| i.severity == severity).count() as u32
        };
        self.status.health = Some(HealthStatus {
            issue_count: issues.len() as u32,
            errors: count(HealthSeverity::Error),
            warnings: count(HealthSeverity::Warning),
            notices: count(HealthSeverity::Notice),
            issues: issues
                .iter()
                .map(|issue| HealthIssueStatus {
                    source: issue.source.clone(),
                    severity: issue.severity.as_str().to_string(),
                    message: issue.message.clone(),
                    wiki_url: issue.wiki_url.clone(),
                })
                .collect(),
            last_checked: Some(self.now.to_rfc3339()),
        });
    }

    /// Items the resource owned when the pass started
    pub fn ownership(&self) -> Ownership {
        Ownership::from_records(&self.status.managed_items)
    }

    pub fn managed(&mut self, ownership: &Ownership) {
        self.status.managed_items = ownership.to_records();
    }

    pub fn schedule_next(&mut self, after: Duration) {
        let next = chrono::Duration::from_std(after)
            .ok()
            .and_then(|delta| self.now.checked_add_signed(delta));
        self.status.next_reconcile_time = next.map(|t| t.to_rfc3339());
    }

    pub fn handled_request(&mut self, annotation: Option<&str>) {
        if let Some(value) = annotation {
            self.status.last_handled_reconcile_at = Some(value.to_string());
        }
    }

    pub fn finish(mut self) -> ServiceStatus {
        self.status.observed_generation = self.generation;
        self.status
    }
}
