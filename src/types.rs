// file: src/types.rs
// description: entity records, event payloads and merge patches for the dashboard core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status shared by scans and attacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Stopped,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Entity records held by the store
// ---------------------------------------------------------------------------

/// A scan tracked by the dashboard. Identity is the id; the store only ever
/// merges updates addressed to an existing id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scan {
    pub id: String,
    pub target: Option<String>,
    pub scan_type: Option<String>,
    pub status: RunStatus,
    pub progress: u8,
    pub vulnerabilities_found: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Scan {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            target: None,
            scan_type: None,
            status: RunStatus::Pending,
            progress: 0,
            vulnerabilities_found: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

/// An attack simulation tracked by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attack {
    pub id: String,
    pub target: Option<String>,
    pub attack_type: Option<String>,
    pub status: RunStatus,
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Attack {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            target: None,
            attack_type: None,
            status: RunStatus::Pending,
            progress: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

impl Notification {
    /// Synthesize a notification for a vulnerability that arrived over the
    /// live channel.
    pub fn for_vulnerability(vuln: &VulnerabilityDiscovered) -> Self {
        let kind = match vuln.severity {
            Severity::Critical | Severity::High => NotificationKind::Error,
            Severity::Medium => NotificationKind::Warning,
            Severity::Low | Severity::Info => NotificationKind::Info,
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            title: format!("{} vulnerability discovered", vuln.severity),
            message: vuln.title.clone(),
            timestamp: vuln.discovered_at.unwrap_or_else(Utc::now),
            read: false,
        }
    }
}

/// Denormalized counters projected from the scan/attack/vulnerability
/// collections. Not an entity of its own; merged via [`StatsPatch`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_scans: u64,
    pub active_scans: u64,
    pub total_attacks: u64,
    pub active_attacks: u64,
    pub total_vulnerabilities: u64,
    pub critical_count: u64,
    pub high_count: u64,
    pub medium_count: u64,
    pub low_count: u64,
}

// ---------------------------------------------------------------------------
// Merge patches
//
// Every patch is a shallow merge: fields present override, absent fields are
// retained from the existing record. The store applies these; nothing else
// mutates a record in place.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanPatch {
    pub target: Option<String>,
    pub scan_type: Option<String>,
    pub status: Option<RunStatus>,
    pub progress: Option<u8>,
    pub vulnerabilities_found: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ScanPatch {
    pub fn apply(&self, existing: &Scan) -> Scan {
        Scan {
            id: existing.id.clone(),
            target: self.target.clone().or_else(|| existing.target.clone()),
            scan_type: self.scan_type.clone().or_else(|| existing.scan_type.clone()),
            status: self.status.unwrap_or(existing.status),
            progress: self.progress.map(|p| p.min(100)).unwrap_or(existing.progress),
            vulnerabilities_found: self
                .vulnerabilities_found
                .unwrap_or(existing.vulnerabilities_found),
            created_at: existing.created_at,
            started_at: self.started_at.or(existing.started_at),
            completed_at: self.completed_at.or(existing.completed_at),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttackPatch {
    pub target: Option<String>,
    pub attack_type: Option<String>,
    pub status: Option<RunStatus>,
    pub progress: Option<u8>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl AttackPatch {
    pub fn apply(&self, existing: &Attack) -> Attack {
        Attack {
            id: existing.id.clone(),
            target: self.target.clone().or_else(|| existing.target.clone()),
            attack_type: self
                .attack_type
                .clone()
                .or_else(|| existing.attack_type.clone()),
            status: self.status.unwrap_or(existing.status),
            progress: self.progress.map(|p| p.min(100)).unwrap_or(existing.progress),
            created_at: existing.created_at,
            started_at: self.started_at.or(existing.started_at),
            completed_at: self.completed_at.or(existing.completed_at),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsPatch {
    pub total_scans: Option<u64>,
    pub active_scans: Option<u64>,
    pub total_attacks: Option<u64>,
    pub active_attacks: Option<u64>,
    pub total_vulnerabilities: Option<u64>,
    pub critical_count: Option<u64>,
    pub high_count: Option<u64>,
    pub medium_count: Option<u64>,
    pub low_count: Option<u64>,
}

impl StatsPatch {
    pub fn apply(&self, existing: &DashboardStats) -> DashboardStats {
        DashboardStats {
            total_scans: self.total_scans.unwrap_or(existing.total_scans),
            active_scans: self.active_scans.unwrap_or(existing.active_scans),
            total_attacks: self.total_attacks.unwrap_or(existing.total_attacks),
            active_attacks: self.active_attacks.unwrap_or(existing.active_attacks),
            total_vulnerabilities: self
                .total_vulnerabilities
                .unwrap_or(existing.total_vulnerabilities),
            critical_count: self.critical_count.unwrap_or(existing.critical_count),
            high_count: self.high_count.unwrap_or(existing.high_count),
            medium_count: self.medium_count.unwrap_or(existing.medium_count),
            low_count: self.low_count.unwrap_or(existing.low_count),
        }
    }
}

// ---------------------------------------------------------------------------
// Event payloads carried inside the wire envelope's `data` field
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEstablished {
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionClosed {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanStarted {
    pub scan_id: String,
    pub target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanProgress {
    pub scan_id: String,
    pub progress: u8,
    pub status: Option<RunStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanCompleted {
    pub scan_id: String,
    pub vulnerabilities_found: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanFailed {
    pub scan_id: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackStarted {
    pub attack_id: String,
    pub target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackProgress {
    pub attack_id: String,
    pub progress: u8,
    pub status: Option<RunStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackCompleted {
    pub attack_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackFailed {
    pub attack_id: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityDiscovered {
    pub id: String,
    pub scan_id: Option<String>,
    pub severity: Severity,
    pub title: String,
    pub description: Option<String>,
    pub discovered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageReceived {
    pub from: Option<String>,
    pub message: String,
}
