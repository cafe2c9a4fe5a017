//! Vector clock used to order events causally across the coordinator, servers and players

use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Mapping from node identifier to event counter
///
/// Absent keys count as zero. Keys are kept sorted so the display form and the wire
/// encoding are stable.
#[derive(Debug, Clone, Default)]
pub struct VectorClock(BTreeMap<String, u64>);

impl VectorClock {
    /// Create an empty clock
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter of `node`, zero when absent
    pub fn get(&self, node: &str) -> u64 {
        self.0.get(node).copied().unwrap_or(0)
    }

    /// Increment the counter of `node` and return its new value
    pub fn tick(&mut self, node: &str) -> u64 {
        let counter = self.0.entry(node.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Pointwise maximum of `self` and `remote`
    pub fn merge(&self, remote: &VectorClock) -> VectorClock {
        let mut merged = self.clone();
        merged.absorb(remote);
        merged
    }

    /// In-place merge: raise every counter to at least its value in `remote`
    pub fn absorb(&mut self, remote: &VectorClock) {
        for (node, &value) in &remote.0 {
            let local = self.0.entry(node.clone()).or_insert(0);
            if value > *local {
                *local = value;
            }
        }
    }

    /// Iterate over `(node, counter)` pairs in node order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(node, value)| (node.as_str(), *value))
    }

    /// Number of nodes with an explicit entry
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no node has an explicit entry
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for VectorClock {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        VectorClock(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl PartialEq for VectorClock {
    fn eq(&self, other: &Self) -> bool {
        self.0
            .keys()
            .chain(other.0.keys())
            .all(|node| self.get(node) == other.get(node))
    }
}

impl Eq for VectorClock {}

/// Causal order: `a < b` when `a` happened before `b`; `None` for concurrent clocks
impl PartialOrd for VectorClock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let mut less = false;
        let mut greater = false;
        for node in self.0.keys().chain(other.0.keys()) {
            match self.get(node).cmp(&other.get(node)) {
                Ordering::Less => less = true,
                Ordering::Greater => greater = true,
                Ordering::Equal => {}
            }
        }
        match (less, greater) {
            (false, false) => Some(Ordering::Equal),
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            (true, true) => None,
        }
    }
}

impl std::fmt::Display for VectorClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (node, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}", node, value)?;
        }
        write!(f, "}}")
    }
}
