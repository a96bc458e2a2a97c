// ── Round-robin rotation ──
//
// A flat ordered list with a single cursor. Each `next()` hands out one
// item and advances; removals adjust the cursor so the rotation neither
// skips nor repeats an item because of index shifts.

use std::sync::Arc;

use tracing::{debug, error};

/// Ordered rotation over shared items.
///
/// Identity is pointer identity: adding the same `Arc` twice creates two
/// slots that both fire, and `remove` drops the first slot that points at
/// the given allocation.
pub struct RoundRobin<T: ?Sized> {
    items: Vec<Arc<T>>,
    /// Always in `[0, items.len())` when `items` is non-empty, else 0.
    current: usize,
}

impl<T: ?Sized> Default for RoundRobin<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            current: 0,
        }
    }
}

impl<T: ?Sized> RoundRobin<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item at the end of the rotation.
    pub fn add(&mut self, item: Arc<T>) {
        self.items.push(item);
        debug!(len = self.items.len(), "added item to rotation");
    }

    /// Remove the first slot holding `item`.
    ///
    /// Returns `false` (and logs) if the item is not registered.
    pub fn remove(&mut self, item: &Arc<T>) -> bool {
        let Some(pos) = self.items.iter().position(|i| Arc::ptr_eq(i, item)) else {
            error!("attempted to remove an item that is not in the rotation");
            return false;
        };

        self.items.remove(pos);
        if pos < self.current {
            self.current -= 1;
        }
        if self.current >= self.items.len() {
            self.current = 0;
        }
        debug!(len = self.items.len(), "removed item from rotation");
        true
    }

    /// The item under the cursor, advancing the cursor by one.
    ///
    /// `None` when the rotation is empty.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<Arc<T>> {
        let item = Arc::clone(self.items.get(self.current)?);
        self.current = (self.current + 1) % self.items.len();
        Some(item)
    }

    /// Snapshot of the current items in rotation order.
    pub fn to_vec(&self) -> Vec<Arc<T>> {
        self.items.clone()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn cursor(&self) -> usize {
        self.current
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(rr: &mut RoundRobin<str>, n: usize) -> Vec<String> {
        (0..n).map(|_| rr.next().unwrap().to_string()).collect()
    }

    fn rotation(items: &[&Arc<str>]) -> RoundRobin<str> {
        let mut rr = RoundRobin::new();
        for item in items {
            rr.add(Arc::clone(item));
        }
        rr
    }

    #[test]
    fn empty_rotation_yields_none() {
        let mut rr: RoundRobin<str> = RoundRobin::new();
        assert!(rr.next().is_none());
        assert!(rr.next().is_none());
        assert!(rr.is_empty());
    }

    #[test]
    fn full_cycle_visits_each_item_once() {
        let (a, b, c): (Arc<str>, Arc<str>, Arc<str>) = ("a".into(), "b".into(), "c".into());
        let mut rr = rotation(&[&a, &b, &c]);

        assert_eq!(names(&mut rr, 3), ["a", "b", "c"]);
        assert_eq!(names(&mut rr, 3), ["a", "b", "c"]);
    }

    #[test]
    fn duplicate_registration_fires_twice() {
        let a: Arc<str> = "a".into();
        let mut rr = rotation(&[&a, &a]);
        assert_eq!(rr.len(), 2);
        assert_eq!(names(&mut rr, 2), ["a", "a"]);

        assert!(rr.remove(&a));
        assert_eq!(rr.len(), 1);
    }

    #[test]
    fn identity_not_value_decides_removal() {
        let a1: Arc<str> = "a".into();
        let a2: Arc<str> = "a".into();
        let mut rr = rotation(&[&a1]);

        assert!(!rr.remove(&a2));
        assert_eq!(rr.len(), 1);
        assert!(rr.remove(&a1));
        assert!(rr.is_empty());
    }

    #[test]
    fn removing_visited_item_keeps_next_in_place() {
        let (a, b, c): (Arc<str>, Arc<str>, Arc<str>) = ("a".into(), "b".into(), "c".into());
        let mut rr = rotation(&[&a, &b, &c]);

        assert_eq!(names(&mut rr, 1), ["a"]);
        assert!(rr.remove(&a));
        // b is still next, c is visited once before b comes round again
        assert_eq!(names(&mut rr, 3), ["b", "c", "b"]);
    }

    #[test]
    fn removing_upcoming_item_does_not_move_cursor() {
        let (a, b, c): (Arc<str>, Arc<str>, Arc<str>) = ("a".into(), "b".into(), "c".into());
        let mut rr = rotation(&[&a, &b, &c]);

        assert_eq!(names(&mut rr, 1), ["a"]);
        assert!(rr.remove(&c));
        assert_eq!(names(&mut rr, 3), ["b", "a", "b"]);
    }

    #[test]
    fn removing_last_item_under_cursor_wraps() {
        let (a, b, c): (Arc<str>, Arc<str>, Arc<str>) = ("a".into(), "b".into(), "c".into());
        let mut rr = rotation(&[&a, &b, &c]);

        assert_eq!(names(&mut rr, 2), ["a", "b"]);
        assert_eq!(rr.cursor(), 2);
        assert!(rr.remove(&c));
        assert_eq!(rr.cursor(), 0);
        assert_eq!(names(&mut rr, 2), ["a", "b"]);
    }

    #[test]
    fn f1_f2_f3_scenario() {
        let (f1, f2, f3): (Arc<str>, Arc<str>, Arc<str>) =
            ("f1".into(), "f2".into(), "f3".into());
        let mut rr = rotation(&[&f1, &f2, &f3]);

        assert_eq!(names(&mut rr, 3), ["f1", "f2", "f3"]);
        assert_eq!(rr.cursor(), 0);

        // f2 sits after the cursor, so the cursor stays at f1
        assert!(rr.remove(&f2));
        assert_eq!(names(&mut rr, 1), ["f1"]);
        assert_eq!(names(&mut rr, 3), ["f3", "f1", "f3"]);
    }

    #[test]
    fn removing_unknown_item_is_a_no_op() {
        let a: Arc<str> = "a".into();
        let stranger: Arc<str> = "z".into();
        let mut rr = rotation(&[&a]);

        assert!(!rr.remove(&stranger));
        assert_eq!(names(&mut rr, 2), ["a", "a"]);
    }

    #[test]
    fn snapshot_is_detached() {
        let (a, b): (Arc<str>, Arc<str>) = ("a".into(), "b".into());
        let mut rr = rotation(&[&a, &b]);

        let snap = rr.to_vec();
        assert!(rr.remove(&a));
        assert_eq!(snap.len(), 2);
        assert_eq!(rr.to_vec().len(), 1);
    }

    #[test]
    fn mixed_operations_only_return_registered_items() {
        let pool: Vec<Arc<str>> = (0..6).map(|i| Arc::from(format!("d{i}"))).collect();
        let mut rr: RoundRobin<str> = RoundRobin::new();
        let mut registered: Vec<Arc<str>> = Vec::new();

        // Fixed linear congruential sequence for a reproducible op mix.
        let mut seed: u32 = 7;
        for _ in 0..500 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let pick = &pool[usize::try_from(seed >> 8).unwrap() % pool.len()];
            match (seed >> 4) % 3 {
                0 => {
                    rr.add(Arc::clone(pick));
                    registered.push(Arc::clone(pick));
                }
                1 => {
                    let was_present = registered.iter().position(|r| Arc::ptr_eq(r, pick));
                    assert_eq!(rr.remove(pick), was_present.is_some());
                    if let Some(pos) = was_present {
                        registered.remove(pos);
                    }
                }
                _ => match rr.next() {
                    Some(item) => assert!(registered.iter().any(|r| Arc::ptr_eq(r, &item))),
                    None => assert!(registered.is_empty()),
                },
            }
            assert!(rr.is_empty() || rr.cursor() < rr.len());
        }
    }

    #[test]
    fn cycle_after_mutation_is_fair() {
        let pool: Vec<Arc<str>> = ["a", "b", "c", "d"].into_iter().map(Arc::from).collect();
        let mut rr: RoundRobin<str> = RoundRobin::new();
        for item in &pool {
            rr.add(Arc::clone(item));
        }
        rr.next();
        rr.next();
        assert!(rr.remove(&pool[0]));
        rr.add(Arc::from("e"));

        let n = rr.len();
        let mut seen = names(&mut rr, n);
        seen.sort();
        assert_eq!(seen, ["b", "c", "d", "e"]);
    }
}
