//! Per-user sliding-window duplicate tracker (spec §4.7, component C7).

use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use lru::LruCache;
use sha2::{Digest, Sha256};

use crate::model::{CheckRequest, CheckResponse};

const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(600);

fn hash_message(msg: &str) -> String {
    let digest = Sha256::digest(msg.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    hash: String,
    time: SystemTime,
}

#[derive(Debug, Clone)]
struct Tracker {
    count: u64,
    message_ids: VecDeque<i64>,
    first_seen: SystemTime,
    last_seen: SystemTime,
}

#[derive(Debug, Clone, Default)]
struct UserState {
    entries: VecDeque<Entry>,
    trackers: HashMap<String, Tracker>,
}

impl UserState {
    fn trim_to(&mut self, max_entries: usize) {
        while self.entries.len() > max_entries {
            let Some(oldest) = self.entries.pop_front() else { break };
            let mut remove_tracker = false;
            if let Some(tracker) = self.trackers.get_mut(&oldest.hash) {
                tracker.count = tracker.count.saturating_sub(1);
                if tracker.count == 0 {
                    remove_tracker = true;
                } else if let Some(&earliest) = self
                    .entries
                    .iter()
                    .filter(|e| e.hash == oldest.hash)
                    .map(|e| &e.time)
                    .min()
                {
                    tracker.first_seen = earliest;
                }
            }
            if remove_tracker {
                self.trackers.remove(&oldest.hash);
            }
        }
    }

    fn expire_before(&mut self, cutoff: SystemTime) {
        while let Some(front) = self.entries.front() {
            if front.time >= cutoff {
                break;
            }
            let oldest = self.entries.pop_front().unwrap();
            let mut remove_tracker = false;
            if let Some(tracker) = self.trackers.get_mut(&oldest.hash) {
                tracker.count = tracker.count.saturating_sub(1);
                if tracker.count == 0 {
                    remove_tracker = true;
                } else if let Some(&earliest) = self
                    .entries
                    .iter()
                    .filter(|e| e.hash == oldest.hash)
                    .map(|e| &e.time)
                    .min()
                {
                    tracker.first_seen = earliest;
                }
            }
            if remove_tracker {
                self.trackers.remove(&oldest.hash);
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.trackers.is_empty()
    }
}

struct Inner {
    cache: LruCache<u64, UserState>,
    last_global_cleanup: SystemTime,
}

/// Tracks repeated messages per user within a sliding window, bounded by a
/// process-wide LRU-with-TTL cache over tracked users.
///
/// A single mutex guards the whole cache so a user's read-modify-write
/// (fetch tracker, mutate counts, possibly trim) is one atomic critical
/// section; concurrent `check` calls for the same user never race.
pub struct DuplicateDetector {
    inner: Mutex<Inner>,
    window: Duration,
    max_entries_per_user: usize,
    cleanup_interval: Duration,
}

/// Outcome of a single duplicate check, before it's wrapped in a
/// [`CheckResponse`].
pub struct DuplicateOutcome {
    pub spam: bool,
    pub details: String,
    pub extra_delete_ids: Vec<i64>,
}

impl DuplicateDetector {
    pub fn new(window: Duration, max_entries_per_user: usize, max_users: usize) -> Self {
        let capacity = NonZeroUsize::new(max_users.max(1)).unwrap();
        DuplicateDetector {
            inner: Mutex::new(Inner {
                cache: LruCache::new(capacity),
                last_global_cleanup: SystemTime::UNIX_EPOCH,
            }),
            window,
            max_entries_per_user,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }

    fn global_cleanup(&self, inner: &mut Inner, now: SystemTime) {
        let due = now
            .duration_since(inner.last_global_cleanup)
            .map(|elapsed| elapsed > self.cleanup_interval)
            .unwrap_or(true);
        if !due {
            return;
        }

        let cutoff = now.checked_sub(self.window).unwrap_or(SystemTime::UNIX_EPOCH);
        let stale: Vec<u64> = inner
            .cache
            .iter_mut()
            .filter_map(|(user_id, state)| {
                state.expire_before(cutoff);
                state.is_empty().then_some(*user_id)
            })
            .collect();
        for user_id in stale {
            inner.cache.pop(&user_id);
        }
        inner.last_global_cleanup = now;
    }

    /// Runs the duplicate check for one user's message. `threshold <= 0`
    /// disables the check entirely (the caller is expected to have already
    /// handled an empty/non-numeric user id as "invalid user id").
    pub fn check(&self, user_id: u64, msg: &str, message_id: i64, threshold: u64, now: SystemTime) -> DuplicateOutcome {
        let mut inner = self.inner.lock().expect("duplicate detector mutex poisoned");
        self.global_cleanup(&mut inner, now);

        let cutoff = now.checked_sub(self.window).unwrap_or(SystemTime::UNIX_EPOCH);
        if inner.cache.get_mut(&user_id).is_none() {
            inner.cache.put(user_id, UserState::default());
        }
        let state = inner.cache.get_mut(&user_id).expect("just inserted");
        state.expire_before(cutoff);

        let hash = hash_message(msg);
        let message_id_cap = threshold.min(100) as usize;

        let already_seen_edit = message_id > 0
            && state
                .trackers
                .get(&hash)
                .map(|tracker| tracker.message_ids.contains(&message_id))
                .unwrap_or(false);
        // Only a genuine (non-edit) message with a known id actually lands in
        // `message_ids`; only then does the current message own one of the
        // stored ids that `extraDeleteIds` must exclude.
        let current_contributed_id = !already_seen_edit && message_id > 0;

        if already_seen_edit {
            if let Some(tracker) = state.trackers.get_mut(&hash) {
                tracker.last_seen = now;
            }
        } else {
            state.entries.push_back(Entry { hash: hash.clone(), time: now });
            let tracker = state.trackers.entry(hash.clone()).or_insert_with(|| Tracker {
                count: 0,
                message_ids: VecDeque::new(),
                first_seen: now,
                last_seen: now,
            });
            tracker.count += 1;
            if message_id > 0 {
                tracker.message_ids.push_back(message_id);
                while tracker.message_ids.len() > message_id_cap {
                    tracker.message_ids.pop_front();
                }
            }
            tracker.last_seen = now;

            state.trim_to(self.max_entries_per_user);
        }

        let tracker = match state.trackers.get_mut(&hash) {
            Some(tracker) => tracker,
            None => {
                return DuplicateOutcome {
                    spam: false,
                    details: "message repeated 0 times in 0s".to_owned(),
                    extra_delete_ids: Vec::new(),
                }
            }
        };

        let duration = tracker
            .last_seen
            .duration_since(tracker.first_seen)
            .unwrap_or(Duration::ZERO);
        let details = format!("message repeated {} times in {}", tracker.count, format_duration(duration));

        if threshold > 0 && tracker.count >= threshold {
            let mut extra_delete_ids: Vec<i64> = tracker.message_ids.iter().copied().collect();
            if current_contributed_id {
                extra_delete_ids.pop();
            }
            tracker.message_ids.clear();
            DuplicateOutcome { spam: true, details, extra_delete_ids }
        } else {
            DuplicateOutcome { spam: false, details, extra_delete_ids: Vec::new() }
        }
    }

    /// Runs [`DuplicateDetector::check`] against a [`CheckRequest`], handling
    /// the disabled/invalid-user-id cases spec §4.7 calls out.
    pub fn check_request(&self, request: &CheckRequest, threshold: i64, now: SystemTime) -> CheckResponse {
        if threshold <= 0 {
            return CheckResponse::ham("duplicate", "check disabled");
        }
        if request.user_id.is_empty() {
            return CheckResponse::ham("duplicate", "invalid user id");
        }
        let Ok(user_id) = request.user_id.parse::<u64>() else {
            return CheckResponse::ham("duplicate", "invalid user id");
        };

        let outcome = self.check(user_id, &request.msg, request.meta.message_id, threshold as u64, now);
        CheckResponse {
            name: "duplicate",
            spam: outcome.spam,
            details: outcome.details,
            extra_delete_ids: outcome.extra_delete_ids,
            error: None,
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::{Duration, SystemTime};

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn first_message_is_never_a_duplicate() {
        let detector = DuplicateDetector::new(Duration::from_secs(3600), 200, 10_000);
        let now = SystemTime::now();
        let outcome = detector.check(1, "hello", 1, 3, now);
        assert_eq!(outcome.spam, false);
        assert_eq!(outcome.details, "message repeated 1 times in 0s");
    }

    #[test]
    fn third_identical_message_triggers_with_prior_ids_to_delete() {
        let detector = DuplicateDetector::new(Duration::from_secs(3600), 200, 10_000);
        let now = SystemTime::now();
        detector.check(123, "spam", 100, 3, now);
        detector.check(123, "spam", 101, 3, now);
        let third = detector.check(123, "spam", 102, 3, now);

        assert_eq!(third.spam, true);
        assert_eq!(third.details, "message repeated 3 times in 0s");
        assert_eq!(third.extra_delete_ids, vec![100, 101]);
    }

    #[test]
    fn triggering_message_with_unknown_id_does_not_drop_a_real_prior_id() {
        let detector = DuplicateDetector::new(Duration::from_secs(3600), 200, 10_000);
        let now = SystemTime::now();
        detector.check(123, "spam", 100, 3, now);
        detector.check(123, "spam", 101, 3, now);
        // The triggering message itself has no known platform id (0 = unknown
        // per spec §3), so it never entered `message_ids` and nothing of its
        // own should be popped off the stored list.
        let third = detector.check(123, "spam", 0, 3, now);

        assert_eq!(third.spam, true);
        assert_eq!(third.extra_delete_ids, vec![100, 101]);
    }

    #[test]
    fn repeated_message_id_is_an_edit_and_does_not_increment_count() {
        let detector = DuplicateDetector::new(Duration::from_secs(3600), 200, 10_000);
        let now = SystemTime::now();
        detector.check(1, "hello", 5, 3, now);
        let edit = detector.check(1, "hello", 5, 3, now);
        assert_eq!(edit.details, "message repeated 1 times in 0s");
    }

    #[test]
    fn messages_outside_the_window_are_not_duplicates() {
        let detector = DuplicateDetector::new(Duration::from_secs(60), 200, 10_000);
        let t0 = SystemTime::now();
        detector.check(1, "hello", 1, 3, t0);
        let later = t0 + Duration::from_secs(120);
        let outcome = detector.check(1, "hello", 2, 3, later);
        assert_eq!(outcome.details, "message repeated 1 times in 0s");
    }

    #[test]
    fn zero_threshold_disables_the_check() {
        let detector = DuplicateDetector::new(Duration::from_secs(3600), 200, 10_000);
        let response = detector.check_request(&crate::model::test::request("spam"), 0, SystemTime::now());
        assert_eq!(response.details, "check disabled");
    }

    #[test]
    fn empty_user_id_is_invalid() {
        let detector = DuplicateDetector::new(Duration::from_secs(3600), 200, 10_000);
        let mut request = crate::model::test::request("spam");
        request.user_id = String::new();
        let response = detector.check_request(&request, 3, SystemTime::now());
        assert_eq!(response.details, "invalid user id");
    }

    #[test]
    fn concurrent_checks_for_the_same_user_count_exactly_once_each() {
        let detector = Arc::new(DuplicateDetector::new(Duration::from_secs(3600), 10_000, 10_000));
        let now = SystemTime::now();
        let mut handles = Vec::new();
        for task in 0..10 {
            let detector = Arc::clone(&detector);
            handles.push(std::thread::spawn(move || {
                for i in 0..10 {
                    let message_id = (task * 10 + i + 1) as i64;
                    detector.check(42, "same text", message_id, 1000, now);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let outcome = detector.check(42, "same text", 1001, 1000, now);
        assert_eq!(outcome.details, "message repeated 101 times in 0s");
    }
}
