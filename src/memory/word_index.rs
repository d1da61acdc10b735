//! Prefix tree keyed by words over `[A-Za-z_]`.
//!
//! Every node carries a downstream count (payloads stored at or below it),
//! which lets `remove` prune dead branches bottom-up without a second walk.

/// `a`–`z`, `A`–`Z` and `_`.
const FANOUT: usize = 53;

fn slot(byte: u8) -> Option<usize> {
    match byte {
        b'a'..=b'z' => Some((byte - b'a') as usize),
        b'A'..=b'Z' => Some(26 + (byte - b'A') as usize),
        b'_' => Some(52),
        _ => None,
    }
}

fn key(word: &str) -> Option<Vec<usize>> {
    if word.is_empty() {
        return None;
    }
    word.bytes().map(slot).collect()
}

struct Node<T> {
    children: [Option<Box<Node<T>>>; FANOUT],
    payload: Option<T>,
    downstream: usize,
}

impl<T> Node<T> {
    fn new() -> Self {
        Self {
            children: std::array::from_fn(|_| None),
            payload: None,
            downstream: 0,
        }
    }

    fn walk(&self, key: &[usize]) -> Option<&Node<T>> {
        key.iter()
            .try_fold(self, |node, &i| node.children[i].as_deref())
    }

    fn count_nodes(&self) -> usize {
        1 + self
            .children
            .iter()
            .flatten()
            .map(|child| child.count_nodes())
            .sum::<usize>()
    }

    fn remove(&mut self, key: &[usize]) -> Option<T> {
        let taken = match key.split_first() {
            None => self.payload.take(),
            Some((&first, rest)) => {
                let child = self.children[first].as_deref_mut()?;
                let taken = child.remove(rest);
                if taken.is_some() && child.downstream == 0 {
                    self.children[first] = None;
                }
                taken
            }
        };
        if taken.is_some() {
            self.downstream -= 1;
        }
        taken
    }
}

/// Word → payload index with first-writer-wins inserts.
pub struct WordIndex<T> {
    root: Node<T>,
}

impl<T> Default for WordIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WordIndex<T> {
    pub fn new() -> Self {
        Self { root: Node::new() }
    }

    /// Store `payload` under `word`.
    ///
    /// Returns `false`, leaving the index unchanged, if `word` is already
    /// present or contains a character outside `[A-Za-z_]`.
    pub fn insert(&mut self, word: &str, payload: T) -> bool {
        let Some(key) = key(word) else {
            return false;
        };
        if self.root.walk(&key).is_some_and(|n| n.payload.is_some()) {
            return false;
        }

        let mut node = &mut self.root;
        node.downstream += 1;
        for &i in &key {
            node = &mut **node.children[i].get_or_insert_with(|| Box::new(Node::new()));
            node.downstream += 1;
        }
        node.payload = Some(payload);
        true
    }

    pub fn search(&self, word: &str) -> Option<&T> {
        let key = key(word)?;
        self.root.walk(&key)?.payload.as_ref()
    }

    pub fn search_mut(&mut self, word: &str) -> Option<&mut T> {
        let key = key(word)?;
        let mut node = &mut self.root;
        for &i in &key {
            node = node.children[i].as_deref_mut()?;
        }
        node.payload.as_mut()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.search(word).is_some()
    }

    /// Take the payload for `word` and prune nodes left without payloads.
    pub fn remove(&mut self, word: &str) -> Option<T> {
        let key = key(word)?;
        self.root.remove(&key)
    }

    /// Number of stored words.
    pub fn len(&self) -> usize {
        self.root.downstream
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of allocated nodes, root included.
    pub fn node_count(&self) -> usize {
        self.root.count_nodes()
    }

    /// Number of stored words starting with `prefix` (0 if the branch is absent).
    pub fn downstream(&self, prefix: &str) -> usize {
        if prefix.is_empty() {
            return self.len();
        }
        key(prefix)
            .and_then(|k| self.root.walk(&k).map(|n| n.downstream))
            .unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.root = Node::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_search() {
        let mut index = WordIndex::new();
        assert!(index.insert("cat", 1));
        assert!(index.insert("car", 2));
        assert!(index.insert("ca", 3));
        assert_eq!(index.search("cat"), Some(&1));
        assert_eq!(index.search("car"), Some(&2));
        assert_eq!(index.search("ca"), Some(&3));
        assert_eq!(index.search("c"), None);
        assert_eq!(index.search("cart"), None);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_first_writer_wins() {
        let mut index = WordIndex::new();
        assert!(index.insert("dog", "first"));
        assert!(!index.insert("dog", "second"));
        assert_eq!(index.search("dog"), Some(&"first"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_rejects_foreign_characters() {
        let mut index = WordIndex::new();
        assert!(!index.insert("", 1));
        assert!(!index.insert("a-b", 1));
        assert!(!index.insert("../x", 1));
        assert!(index.insert("new_york", 1));
        assert_eq!(index.search("new-york"), None);
        assert_eq!(index.search("NEW_YORK"), None);
        assert_eq!(index.node_count(), 9);
    }

    #[test]
    fn test_case_is_significant() {
        let mut index = WordIndex::new();
        assert!(index.insert("neverSeen", 1));
        assert!(index.insert("neverseen", 2));
        assert!(index.insert("Zebra_Z", 3));
        assert_eq!(index.search("neverSeen"), Some(&1));
        assert_eq!(index.search("neverseen"), Some(&2));
        assert_eq!(index.search("zebra_z"), None);
        assert_eq!(index.downstream("never"), 2);

        assert_eq!(index.remove("neverSeen"), Some(1));
        assert_eq!(index.search("neverseen"), Some(&2));
        assert_eq!(index.downstream("neverS"), 0);
    }

    #[test]
    fn test_remove_prunes_branch() {
        let mut index = WordIndex::new();
        index.insert("cat", ());
        index.insert("car", ());
        assert_eq!(index.node_count(), 5);
        assert_eq!(index.downstream("ca"), 2);

        assert_eq!(index.remove("cat"), Some(()));
        assert!(index.search("cat").is_none());
        assert!(index.search("car").is_some());
        assert_eq!(index.downstream("cat"), 0);
        assert_eq!(index.downstream("ca"), 1);
        assert_eq!(index.node_count(), 4);

        assert_eq!(index.remove("car"), Some(()));
        assert_eq!(index.node_count(), 1);
        assert!(index.is_empty());
    }

    #[test]
    fn test_remove_keeps_prefix_payload() {
        let mut index = WordIndex::new();
        index.insert("ca", 1);
        index.insert("cat", 2);
        assert_eq!(index.remove("cat"), Some(2));
        assert_eq!(index.search("ca"), Some(&1));
        assert_eq!(index.node_count(), 3);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut index = WordIndex::new();
        index.insert("cat", 1);
        assert_eq!(index.remove("ca"), None);
        assert_eq!(index.remove("cow"), None);
        assert_eq!(index.len(), 1);
        assert_eq!(index.node_count(), 4);
    }

    #[test]
    fn test_search_mut_and_clear() {
        let mut index = WordIndex::new();
        index.insert("owl", 1);
        *index.search_mut("owl").unwrap() += 10;
        assert_eq!(index.search("owl"), Some(&11));
        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.node_count(), 1);
    }
}
