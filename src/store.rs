// file: src/store.rs
// description: in-memory source of truth for scans, attacks, notifications and stats

use crate::{
    monitoring::NOTIFICATIONS_EVICTED,
    types::{
        Attack, AttackPatch, DashboardStats, Notification, Scan, ScanPatch, StatsPatch,
    },
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Notifications beyond this many are evicted, oldest-by-insertion first.
pub const NOTIFICATION_CAP: usize = 50;
/// Finished scans/attacks kept in the recent collections.
pub const RECENT_CAP: usize = 50;

/// Record addressable by a stable id.
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for Scan {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for Attack {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for Notification {
    fn key(&self) -> &str {
        &self.id
    }
}

#[derive(Default)]
struct StoreInner {
    active_scans: Vec<Arc<Scan>>,
    recent_scans: Vec<Arc<Scan>>,
    active_attacks: Vec<Arc<Attack>>,
    recent_attacks: Vec<Arc<Attack>>,
    notifications: Vec<Arc<Notification>>,
    stats: Option<Arc<DashboardStats>>,
}

/// Canonical in-memory state for the dashboard, mutated only through the
/// operations below so merge, eviction and no-op invariants are enforced in
/// one place.
///
/// Collections hold `Arc`s and a mutation replaces only the addressed
/// record, so every untouched record keeps pointer identity across calls.
/// An `update_*` for an id absent from its collection changes nothing; it is
/// never an error and never an implicit insert.
pub struct DashboardStore {
    inner: Mutex<StoreInner>,
}

impl Default for DashboardStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
        }
    }

    // -- scans --------------------------------------------------------------

    /// Prepend a new scan to the active collection. Duplicate ids are the
    /// caller's error; no dedup happens here.
    pub fn add_scan(&self, scan: Scan) {
        self.lock().active_scans.insert(0, Arc::new(scan));
    }

    /// Shallow-merge `patch` into the scan with `id`, searching active then
    /// recent. Returns whether a record was found.
    pub fn update_scan(&self, id: &str, patch: &ScanPatch) -> bool {
        let mut inner = self.lock();
        replace_by_id(&mut inner.active_scans, id, |scan| patch.apply(scan))
            || replace_by_id(&mut inner.recent_scans, id, |scan| patch.apply(scan))
    }

    pub fn remove_scan(&self, id: &str) -> bool {
        let mut inner = self.lock();
        remove_by_id(&mut inner.active_scans, id) || remove_by_id(&mut inner.recent_scans, id)
    }

    /// Move a finished scan from active to the front of recent.
    pub fn retire_scan(&self, id: &str) -> bool {
        let mut inner = self.lock();
        let Some(pos) = inner.active_scans.iter().position(|s| s.key() == id) else {
            return false;
        };
        let scan = inner.active_scans.remove(pos);
        inner.recent_scans.insert(0, scan);
        inner.recent_scans.truncate(RECENT_CAP);
        true
    }

    pub fn active_scans(&self) -> Vec<Arc<Scan>> {
        self.lock().active_scans.clone()
    }

    pub fn recent_scans(&self) -> Vec<Arc<Scan>> {
        self.lock().recent_scans.clone()
    }

    // -- attacks ------------------------------------------------------------

    pub fn add_attack(&self, attack: Attack) {
        self.lock().active_attacks.insert(0, Arc::new(attack));
    }

    pub fn update_attack(&self, id: &str, patch: &AttackPatch) -> bool {
        let mut inner = self.lock();
        replace_by_id(&mut inner.active_attacks, id, |attack| patch.apply(attack))
            || replace_by_id(&mut inner.recent_attacks, id, |attack| patch.apply(attack))
    }

    pub fn remove_attack(&self, id: &str) -> bool {
        let mut inner = self.lock();
        remove_by_id(&mut inner.active_attacks, id) || remove_by_id(&mut inner.recent_attacks, id)
    }

    pub fn retire_attack(&self, id: &str) -> bool {
        let mut inner = self.lock();
        let Some(pos) = inner.active_attacks.iter().position(|a| a.key() == id) else {
            return false;
        };
        let attack = inner.active_attacks.remove(pos);
        inner.recent_attacks.insert(0, attack);
        inner.recent_attacks.truncate(RECENT_CAP);
        true
    }

    pub fn active_attacks(&self) -> Vec<Arc<Attack>> {
        self.lock().active_attacks.clone()
    }

    pub fn recent_attacks(&self) -> Vec<Arc<Attack>> {
        self.lock().recent_attacks.clone()
    }

    // -- notifications ------------------------------------------------------

    /// Prepend a notification; the collection is capped at
    /// [`NOTIFICATION_CAP`], evicting the oldest entries by insertion order.
    pub fn add_notification(&self, notification: Notification) {
        let mut inner = self.lock();
        inner.notifications.insert(0, Arc::new(notification));
        let overflow = inner.notifications.len().saturating_sub(NOTIFICATION_CAP);
        if overflow > 0 {
            inner.notifications.truncate(NOTIFICATION_CAP);
            NOTIFICATIONS_EVICTED.increment(overflow as u64);
        }
    }

    pub fn mark_notification_read(&self, id: &str) -> bool {
        let mut inner = self.lock();
        replace_by_id(&mut inner.notifications, id, |n| {
            let mut updated = n.clone();
            updated.read = true;
            updated
        })
    }

    pub fn remove_notification(&self, id: &str) -> bool {
        remove_by_id(&mut self.lock().notifications, id)
    }

    pub fn notifications(&self) -> Vec<Arc<Notification>> {
        self.lock().notifications.clone()
    }

    pub fn unread_notifications(&self) -> usize {
        self.lock()
            .notifications
            .iter()
            .filter(|n| !n.read)
            .count()
    }

    // -- stats --------------------------------------------------------------

    pub fn set_stats(&self, stats: DashboardStats) {
        self.lock().stats = Some(Arc::new(stats));
    }

    /// Shallow-merge into the current snapshot; a no-op until `set_stats`
    /// has initialized one. Returns whether a merge happened.
    pub fn update_stats(&self, patch: &StatsPatch) -> bool {
        let mut inner = self.lock();
        match inner.stats.as_ref() {
            Some(existing) => {
                inner.stats = Some(Arc::new(patch.apply(existing)));
                true
            }
            None => false,
        }
    }

    pub fn stats(&self) -> Option<Arc<DashboardStats>> {
        self.lock().stats.clone()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn replace_by_id<T: Keyed>(
    list: &mut Vec<Arc<T>>,
    id: &str,
    rebuild: impl FnOnce(&T) -> T,
) -> bool {
    match list.iter().position(|record| record.key() == id) {
        Some(pos) => {
            list[pos] = Arc::new(rebuild(&list[pos]));
            true
        }
        None => false,
    }
}

fn remove_by_id<T: Keyed>(list: &mut Vec<Arc<T>>, id: &str) -> bool {
    let before = list.len();
    list.retain(|record| record.key() != id);
    list.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NotificationKind, RunStatus};
    use chrono::Utc;

    fn notification(id: &str) -> Notification {
        Notification {
            id: id.to_string(),
            kind: NotificationKind::Info,
            title: format!("title {id}"),
            message: "msg".to_string(),
            timestamp: Utc::now(),
            read: false,
        }
    }

    #[test]
    fn update_merges_shallowly_and_preserves_other_records() {
        let store = DashboardStore::new();
        store.add_scan(Scan {
            target: Some("10.0.0.1".to_string()),
            ..Scan::new("s2")
        });
        store.add_scan(Scan::new("s1"));

        let untouched_before = store.active_scans()[1].clone();

        let applied = store.update_scan(
            "s1",
            &ScanPatch {
                progress: Some(42),
                status: Some(RunStatus::Running),
                ..ScanPatch::default()
            },
        );
        assert!(applied);

        let scans = store.active_scans();
        assert_eq!(scans[0].progress, 42);
        assert_eq!(scans[0].status, RunStatus::Running);
        // fields absent from the patch are retained
        assert_eq!(scans[0].vulnerabilities_found, 0);
        // the other record keeps pointer identity
        assert!(Arc::ptr_eq(&scans[1], &untouched_before));
        assert_eq!(scans[1].target.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn update_unknown_id_is_a_noop() {
        let store = DashboardStore::new();
        store.add_scan(Scan::new("s1"));
        let before = store.active_scans();

        let applied = store.update_scan(
            "s9",
            &ScanPatch {
                progress: Some(99),
                ..ScanPatch::default()
            },
        );
        assert!(!applied);

        let after = store.active_scans();
        assert_eq!(before.len(), after.len());
        assert!(Arc::ptr_eq(&before[0], &after[0]));
    }

    #[test]
    fn remove_absent_id_is_a_noop() {
        let store = DashboardStore::new();
        store.add_attack(Attack::new("a1"));
        assert!(!store.remove_attack("a9"));
        assert!(store.remove_attack("a1"));
        assert!(store.active_attacks().is_empty());
    }

    #[test]
    fn notifications_capped_at_fifty_newest_first() {
        let store = DashboardStore::new();
        for i in 0..60 {
            store.add_notification(notification(&format!("n{i}")));
        }

        let notifications = store.notifications();
        assert_eq!(notifications.len(), NOTIFICATION_CAP);
        assert_eq!(notifications[0].id, "n59");
        assert_eq!(notifications.last().unwrap().id, "n10");
        // the earliest ten were evicted
        assert!(!notifications.iter().any(|n| n.id == "n9"));
    }

    #[test]
    fn mark_read_uses_merge_semantics() {
        let store = DashboardStore::new();
        store.add_notification(notification("n1"));
        store.add_notification(notification("n2"));
        assert_eq!(store.unread_notifications(), 2);

        assert!(store.mark_notification_read("n1"));
        assert!(!store.mark_notification_read("n9"));
        assert_eq!(store.unread_notifications(), 1);

        let n1 = store
            .notifications()
            .into_iter()
            .find(|n| n.id == "n1")
            .unwrap();
        assert!(n1.read);
        assert_eq!(n1.title, "title n1");
    }

    #[test]
    fn stats_merge_is_noop_until_initialized() {
        let store = DashboardStore::new();
        let patch = StatsPatch {
            total_vulnerabilities: Some(3),
            ..StatsPatch::default()
        };
        assert!(!store.update_stats(&patch));
        assert!(store.stats().is_none());

        store.set_stats(DashboardStats {
            total_scans: 7,
            ..DashboardStats::default()
        });
        assert!(store.update_stats(&patch));

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_vulnerabilities, 3);
        assert_eq!(stats.total_scans, 7);
    }

    #[test]
    fn retire_moves_scan_to_recent_front() {
        let store = DashboardStore::new();
        store.add_scan(Scan::new("s1"));
        store.add_scan(Scan::new("s2"));

        assert!(store.retire_scan("s1"));
        assert!(!store.retire_scan("s1"));

        assert_eq!(store.active_scans().len(), 1);
        assert_eq!(store.recent_scans()[0].id, "s1");
    }

    #[test]
    fn update_reaches_retired_records() {
        let store = DashboardStore::new();
        store.add_scan(Scan::new("s1"));
        store.retire_scan("s1");

        assert!(store.update_scan(
            "s1",
            &ScanPatch {
                status: Some(RunStatus::Completed),
                progress: Some(100),
                ..ScanPatch::default()
            },
        ));
        assert_eq!(store.recent_scans()[0].status, RunStatus::Completed);
    }
}
