use std::collections::BTreeMap;

/// Virtual-time timers keyed by `K`. At most one deadline per key;
/// scheduling an existing key resets it.
#[derive(Debug, Clone)]
pub struct TimerQueue<K: Ord + Clone> {
    deadlines: BTreeMap<K, u64>,
}

impl<K: Ord + Clone> Default for TimerQueue<K> {
    fn default() -> Self {
        Self {
            deadlines: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone> TimerQueue<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, key: K, due_ms: u64) {
        self.deadlines.insert(key, due_ms);
    }

    pub fn cancel(&mut self, key: &K) -> bool {
        self.deadlines.remove(key).is_some()
    }

    pub fn is_scheduled(&self, key: &K) -> bool {
        self.deadlines.contains_key(key)
    }

    pub fn due_at(&self, key: &K) -> Option<u64> {
        self.deadlines.get(key).copied()
    }

    pub fn next_due(&self) -> Option<u64> {
        self.deadlines.values().min().copied()
    }

    /// Remove and return every key whose deadline is `<= now_ms`, earliest
    /// first (ties broken by key order).
    pub fn take_due(&mut self, now_ms: u64) -> Vec<K> {
        let mut due: Vec<(u64, K)> = self
            .deadlines
            .iter()
            .filter(|(_, at)| **at <= now_ms)
            .map(|(k, at)| (*at, k.clone()))
            .collect();
        due.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        for (_, key) in &due {
            self.deadlines.remove(key);
        }
        due.into_iter().map(|(_, k)| k).collect()
    }

    /// Remove every timer regardless of deadline.
    pub fn drain(&mut self) -> Vec<K> {
        std::mem::take(&mut self.deadlines).into_keys().collect()
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reschedule_replaces_deadline() {
        let mut timers = TimerQueue::new();
        timers.schedule(1u32, 100);
        timers.schedule(1u32, 250);
        assert!(timers.take_due(200).is_empty());
        assert_eq!(timers.take_due(250), vec![1]);
        assert!(timers.is_empty());
    }

    #[test]
    fn due_keys_come_out_earliest_first() {
        let mut timers = TimerQueue::new();
        timers.schedule("b", 30);
        timers.schedule("a", 50);
        timers.schedule("c", 10);
        timers.schedule("d", 99);
        assert_eq!(timers.take_due(60), vec!["c", "b", "a"]);
        assert_eq!(timers.next_due(), Some(99));
    }
}
