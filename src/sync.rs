// file: src/sync.rs
// description: dispatcher handlers that merge live events into the dashboard store

use crate::{
    dispatcher::{EventDispatcher, Subscription},
    events::Envelope,
    store::DashboardStore,
    types::{
        AttackCompleted, AttackFailed, AttackPatch, AttackProgress, AttackStarted, Notification,
        RunStatus, ScanCompleted, ScanFailed, ScanPatch, ScanProgress, ScanStarted, Severity,
        StatsPatch, VulnerabilityDiscovered,
    },
};
use std::sync::Arc;
use tracing::debug;

/// Keeps the store subscribed to the live event stream. Dropping it does not
/// detach the handlers; call [`StoreSync::detach`] for that.
pub struct StoreSync {
    subscriptions: Vec<Subscription>,
}

impl StoreSync {
    pub fn detach(&self) {
        for sub in &self.subscriptions {
            sub.unsubscribe();
        }
    }
}

/// Register the store-mutating handlers on `dispatcher`.
///
/// Every handler goes through the store's merge operations, so an event for
/// an unknown id is a no-op and redundant deliveries are harmless.
pub fn attach(dispatcher: &Arc<EventDispatcher>, store: &Arc<DashboardStore>) -> StoreSync {
    let mut subscriptions = Vec::new();

    // scan lifecycle
    {
        let store = store.clone();
        subscriptions.push(dispatcher.on(move |ev: &ScanStarted, env: &Envelope| {
            store.update_scan(
                &ev.scan_id,
                &ScanPatch {
                    status: Some(RunStatus::Running),
                    target: ev.target.clone(),
                    started_at: Some(env.timestamp),
                    ..ScanPatch::default()
                },
            );
        }));
    }
    {
        let store = store.clone();
        subscriptions.push(dispatcher.on(move |ev: &ScanProgress, _: &Envelope| {
            store.update_scan(
                &ev.scan_id,
                &ScanPatch {
                    progress: Some(ev.progress),
                    status: ev.status,
                    ..ScanPatch::default()
                },
            );
        }));
    }
    {
        let store = store.clone();
        subscriptions.push(dispatcher.on(move |ev: &ScanCompleted, env: &Envelope| {
            let applied = store.update_scan(
                &ev.scan_id,
                &ScanPatch {
                    status: Some(RunStatus::Completed),
                    progress: Some(100),
                    vulnerabilities_found: ev.vulnerabilities_found,
                    completed_at: Some(env.timestamp),
                    ..ScanPatch::default()
                },
            );
            if applied {
                store.retire_scan(&ev.scan_id);
            }
        }));
    }
    {
        let store = store.clone();
        subscriptions.push(dispatcher.on(move |ev: &ScanFailed, env: &Envelope| {
            let applied = store.update_scan(
                &ev.scan_id,
                &ScanPatch {
                    status: Some(RunStatus::Failed),
                    completed_at: Some(env.timestamp),
                    ..ScanPatch::default()
                },
            );
            if applied {
                store.retire_scan(&ev.scan_id);
            }
        }));
    }

    // attack lifecycle
    {
        let store = store.clone();
        subscriptions.push(dispatcher.on(move |ev: &AttackStarted, env: &Envelope| {
            store.update_attack(
                &ev.attack_id,
                &AttackPatch {
                    status: Some(RunStatus::Running),
                    target: ev.target.clone(),
                    started_at: Some(env.timestamp),
                    ..AttackPatch::default()
                },
            );
        }));
    }
    {
        let store = store.clone();
        subscriptions.push(dispatcher.on(move |ev: &AttackProgress, _: &Envelope| {
            store.update_attack(
                &ev.attack_id,
                &AttackPatch {
                    progress: Some(ev.progress),
                    status: ev.status,
                    ..AttackPatch::default()
                },
            );
        }));
    }
    {
        let store = store.clone();
        subscriptions.push(dispatcher.on(move |ev: &AttackCompleted, env: &Envelope| {
            let applied = store.update_attack(
                &ev.attack_id,
                &AttackPatch {
                    status: Some(RunStatus::Completed),
                    progress: Some(100),
                    completed_at: Some(env.timestamp),
                    ..AttackPatch::default()
                },
            );
            if applied {
                store.retire_attack(&ev.attack_id);
            }
        }));
    }
    {
        let store = store.clone();
        subscriptions.push(dispatcher.on(move |ev: &AttackFailed, env: &Envelope| {
            let applied = store.update_attack(
                &ev.attack_id,
                &AttackPatch {
                    status: Some(RunStatus::Failed),
                    completed_at: Some(env.timestamp),
                    ..AttackPatch::default()
                },
            );
            if applied {
                store.retire_attack(&ev.attack_id);
            }
        }));
    }

    // vulnerabilities surface as a notification plus a stats merge
    {
        let store = store.clone();
        subscriptions.push(dispatcher.on(move |ev: &VulnerabilityDiscovered, _: &Envelope| {
            store.add_notification(Notification::for_vulnerability(ev));
            if let Some(stats) = store.stats() {
                let mut patch = StatsPatch {
                    total_vulnerabilities: Some(stats.total_vulnerabilities + 1),
                    ..StatsPatch::default()
                };
                match ev.severity {
                    Severity::Critical => patch.critical_count = Some(stats.critical_count + 1),
                    Severity::High => patch.high_count = Some(stats.high_count + 1),
                    Severity::Medium => patch.medium_count = Some(stats.medium_count + 1),
                    Severity::Low => patch.low_count = Some(stats.low_count + 1),
                    Severity::Info => {}
                }
                store.update_stats(&patch);
            } else {
                debug!(vulnerability = %ev.id, "stats uninitialized; skipping merge");
            }
        }));
    }

    // server-pushed notifications go straight into the capped collection
    {
        let store = store.clone();
        subscriptions.push(dispatcher.on(move |ev: &Notification, _: &Envelope| {
            store.add_notification(ev.clone());
        }));
    }

    StoreSync { subscriptions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventData;
    use crate::types::Scan;
    use chrono::Utc;

    fn progress_frame(scan_id: &str, progress: u8, status: Option<RunStatus>) -> Envelope {
        Envelope::local(EventData::ScanProgress(ScanProgress {
            scan_id: scan_id.to_string(),
            progress,
            status,
        }))
    }

    #[test]
    fn scan_lifecycle_merges_into_store() {
        let dispatcher = EventDispatcher::new();
        let store = Arc::new(DashboardStore::new());
        let _sync = attach(&dispatcher, &store);

        store.add_scan(Scan::new("s1"));

        dispatcher.emit(&progress_frame("s1", 50, Some(RunStatus::Running)));
        assert_eq!(store.active_scans()[0].progress, 50);
        assert_eq!(store.active_scans()[0].status, RunStatus::Running);

        dispatcher.emit(&Envelope::local(EventData::ScanCompleted(ScanCompleted {
            scan_id: "s1".to_string(),
            vulnerabilities_found: Some(2),
        })));

        // finished scans move to recent with the terminal merge applied
        assert!(store.active_scans().is_empty());
        let recent = store.recent_scans();
        assert_eq!(recent[0].id, "s1");
        assert_eq!(recent[0].progress, 100);
        assert_eq!(recent[0].status, RunStatus::Completed);
        assert_eq!(recent[0].vulnerabilities_found, 2);
        assert!(recent[0].completed_at.is_some());

        // an update for an unknown id creates nothing and alters nothing
        dispatcher.emit(&progress_frame("s9", 10, None));
        assert!(store.active_scans().is_empty());
        assert_eq!(store.recent_scans().len(), 1);
        assert_eq!(store.recent_scans()[0].progress, 100);
    }

    #[test]
    fn completed_event_for_unknown_scan_changes_nothing() {
        let dispatcher = EventDispatcher::new();
        let store = Arc::new(DashboardStore::new());
        let _sync = attach(&dispatcher, &store);

        dispatcher.emit(&Envelope::local(EventData::ScanCompleted(ScanCompleted {
            scan_id: "ghost".to_string(),
            vulnerabilities_found: None,
        })));
        assert!(store.active_scans().is_empty());
        assert!(store.recent_scans().is_empty());
    }

    #[test]
    fn vulnerability_produces_notification_and_stats_merge() {
        let dispatcher = EventDispatcher::new();
        let store = Arc::new(DashboardStore::new());
        let _sync = attach(&dispatcher, &store);

        let vuln = VulnerabilityDiscovered {
            id: "v1".to_string(),
            scan_id: Some("s1".to_string()),
            severity: Severity::Critical,
            title: "Unauthenticated RCE".to_string(),
            description: None,
            discovered_at: Some(Utc::now()),
        };

        // stats not initialized yet: notification only
        dispatcher.emit(&Envelope::local(EventData::VulnerabilityDiscovered(
            vuln.clone(),
        )));
        assert_eq!(store.notifications().len(), 1);
        assert!(store.stats().is_none());

        store.set_stats(crate::types::DashboardStats::default());
        dispatcher.emit(&Envelope::local(EventData::VulnerabilityDiscovered(vuln)));

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_vulnerabilities, 1);
        assert_eq!(stats.critical_count, 1);
        assert_eq!(store.notifications().len(), 2);
    }

    #[test]
    fn detach_stops_store_mutation() {
        let dispatcher = EventDispatcher::new();
        let store = Arc::new(DashboardStore::new());
        let sync = attach(&dispatcher, &store);

        store.add_scan(Scan::new("s1"));
        sync.detach();

        dispatcher.emit(&progress_frame("s1", 50, None));
        assert_eq!(store.active_scans()[0].progress, 0);
    }
}
