// --- File: src/core/trie.rs
use crate::core::types::{normalize_word, Frequency, FREQ_WORD_MAX};
use crate::errors::{NlpError, Result};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

/// Index of a node inside the trie arena.
pub type NodeId = usize;

pub const ROOT: NodeId = 0;

/// One symbol position in the vocabulary tree.
///
/// A node is terminal (spells a complete word) exactly when it carries a
/// frequency; pass-through nodes carry `None`.
#[derive(Debug, Clone)]
pub struct TrieNode {
    pub symbol: char,
    children: HashMap<char, NodeId>,
    frequency: Option<Frequency>,
    /// Highest frequency of any terminal at or below this node, `None` when
    /// the subtree holds no words (e.g. after removals).
    max_freq_in_subtree: Option<Frequency>,
}

impl TrieNode {
    fn new(symbol: char) -> Self {
        Self { symbol, children: HashMap::new(), frequency: None, max_freq_in_subtree: None }
    }

    pub fn frequency(&self) -> Option<Frequency> {
        self.frequency
    }

    pub fn is_terminal(&self) -> bool {
        self.frequency.is_some()
    }

    pub fn child(&self, symbol: char) -> Option<NodeId> {
        self.children.get(&symbol).copied()
    }

    pub fn children(&self) -> impl Iterator<Item = (char, NodeId)> + '_ {
        self.children.iter().map(|(&symbol, &id)| (symbol, id))
    }

    pub fn max_freq_in_subtree(&self) -> Option<Frequency> {
        self.max_freq_in_subtree
    }
}

/// Arena-backed word trie. Nodes are addressed by index and a child always has
/// a higher index than its parent.
///
/// A built trie is treated as an immutable snapshot; the lexicon store
/// replaces the whole value instead of mutating a live one.
#[derive(Debug, Clone)]
pub struct Trie {
    nodes: Vec<TrieNode>,
    word_count: usize,
}

impl Default for Trie {
    fn default() -> Self {
        Self::empty()
    }
}

impl Trie {
    pub fn empty() -> Self {
        Self { nodes: vec![TrieNode::new('\0')], word_count: 0 }
    }

    /// Builds a trie from `(word, frequency)` pairs in any order.
    ///
    /// Words are normalized to their lowercase form; duplicates keep the
    /// highest frequency. Frequencies above the scale saturate.
    pub fn build<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: AsRef<str>,
    {
        let mut trie = Trie::empty();
        for (word, frequency) in entries {
            let word = normalize_word(word.as_ref());
            if word.is_empty() {
                return Err(NlpError::load("dictionary contains an empty word"));
            }
            let frequency = frequency.min(u32::from(FREQ_WORD_MAX)) as Frequency;
            trie.insert(&word, frequency);
        }
        if trie.word_count == 0 {
            return Err(NlpError::load("dictionary has no entries"));
        }
        trie.recompute_subtree_maxima();
        Ok(trie)
    }

    /// O(k) insertion where k is the word length. Subtree maxima are
    /// recomputed in one pass once the bulk load is done.
    fn insert(&mut self, word: &str, frequency: Frequency) {
        let mut node_idx = ROOT;
        for symbol in word.chars() {
            node_idx = match self.nodes[node_idx].children.get(&symbol) {
                Some(&id) => id,
                None => {
                    let new_node_id = self.nodes.len();
                    self.nodes.push(TrieNode::new(symbol));
                    self.nodes[node_idx].children.insert(symbol, new_node_id);
                    new_node_id
                }
            };
        }
        let node = &mut self.nodes[node_idx];
        match node.frequency {
            Some(existing) => node.frequency = Some(existing.max(frequency)),
            None => {
                node.frequency = Some(frequency);
                self.word_count += 1;
            }
        }
    }

    fn recompute_subtree_maxima(&mut self) {
        // Children are always allocated after their parent, so a reverse
        // sweep visits every child before its parent.
        for idx in (0..self.nodes.len()).rev() {
            self.refresh_subtree_max(idx);
        }
    }

    fn refresh_subtree_max(&mut self, idx: NodeId) {
        let node = &self.nodes[idx];
        let max = node
            .children
            .values()
            .filter_map(|&child| self.nodes[child].max_freq_in_subtree)
            .chain(node.frequency)
            .max();
        self.nodes[idx].max_freq_in_subtree = max;
    }

    pub fn len(&self) -> usize {
        self.word_count
    }

    pub fn is_empty(&self) -> bool {
        self.word_count == 0
    }

    pub fn root(&self) -> &TrieNode {
        &self.nodes[ROOT]
    }

    pub fn node(&self, id: NodeId) -> Result<&TrieNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| NlpError::internal(format!("dangling trie node index {id}")))
    }

    fn node_for(&self, key: &str) -> Option<NodeId> {
        let mut node_idx = ROOT;
        for symbol in key.chars() {
            node_idx = self.nodes[node_idx].child(symbol)?;
        }
        Some(node_idx)
    }

    /// Exact lookup of an already-normalized word. Returns the terminal node
    /// or `None` when the word is not in the dictionary.
    pub fn find(&self, word: &str) -> Option<&TrieNode> {
        if word.is_empty() {
            return None;
        }
        self.node_for(word).map(|idx| &self.nodes[idx]).filter(|node| node.is_terminal())
    }

    pub fn frequency_of(&self, word: &str) -> Option<Frequency> {
        self.find(word).and_then(TrieNode::frequency)
    }

    /// All words under `prefix`, highest frequency first, ties in
    /// lexicographic order, truncated at `limit`.
    ///
    /// Branches whose best word cannot beat the current worst kept entry are
    /// skipped, so the cost is bounded by `limit` rather than by the size of
    /// the subtree.
    pub fn enumerate(&self, prefix: &str, limit: usize) -> Vec<(String, Frequency)> {
        self.enumerate_where(prefix, limit, |_| true)
    }

    /// Like [`Trie::enumerate`], but only words accepted by `keep` take one of
    /// the `limit` slots. Rejected words are walked past, so they never crowd
    /// out lower-frequency words that are kept.
    pub fn enumerate_where<F>(&self, prefix: &str, limit: usize, keep: F) -> Vec<(String, Frequency)>
    where
        F: Fn(&str) -> bool,
    {
        if limit == 0 {
            return Vec::new();
        }
        let Some(node_idx) = self.node_for(prefix) else {
            return Vec::new();
        };

        let mut heap = BinaryHeap::new();
        let mut word = prefix.to_string();
        self.dfs_search(node_idx, limit, &keep, &mut word, &mut heap);

        // The heap orders worst-first, so ascending order is best-first.
        heap.into_sorted_vec().into_iter().map(|r| (r.word, r.frequency)).collect()
    }

    // Subtree maxima cover rejected words too, so they stay an upper bound
    // and pruning on them remains exact.
    fn dfs_search<F>(&self, node_idx: NodeId, k: usize, keep: &F, word: &mut String, heap: &mut BinaryHeap<Ranked>)
    where
        F: Fn(&str) -> bool,
    {
        let node = &self.nodes[node_idx];
        if let Some(frequency) = node.frequency {
            let beats_worst = match heap.peek() {
                Some(worst) if heap.len() == k => frequency >= worst.frequency,
                _ => true,
            };
            if beats_worst && keep(word.as_str()) {
                heap.push(Ranked { frequency, word: word.clone() });
                if heap.len() > k {
                    heap.pop();
                }
            }
        }

        for (&symbol, &child_idx) in &node.children {
            let Some(child_max) = self.nodes[child_idx].max_freq_in_subtree else {
                continue;
            };
            if heap.len() == k && heap.peek().is_some_and(|worst| child_max < worst.frequency) {
                continue;
            }
            word.push(symbol);
            self.dfs_search(child_idx, k, keep, word, heap);
            word.pop();
        }
    }

    /// Clears the terminal mark of `word`. Prefix nodes stay in place so other
    /// words sharing them are unaffected.
    pub fn remove(&mut self, word: &str) -> bool {
        let mut path = vec![ROOT];
        let mut node_idx = ROOT;
        for symbol in word.chars() {
            match self.nodes[node_idx].child(symbol) {
                Some(next) => {
                    node_idx = next;
                    path.push(next);
                }
                None => return false,
            }
        }
        if word.is_empty() || self.nodes[node_idx].frequency.take().is_none() {
            return false;
        }
        self.word_count -= 1;
        for &idx in path.iter().rev() {
            self.refresh_subtree_max(idx);
        }
        true
    }

    /// Visits every word in the trie in no particular order.
    pub fn for_each_word<F: FnMut(&str, Frequency)>(&self, mut f: F) {
        let mut word = String::new();
        self.walk_words(ROOT, &mut word, &mut f);
    }

    fn walk_words<F: FnMut(&str, Frequency)>(&self, idx: NodeId, word: &mut String, f: &mut F) {
        let node = &self.nodes[idx];
        if let Some(frequency) = node.frequency {
            f(word, frequency);
        }
        for (&symbol, &child) in &node.children {
            word.push(symbol);
            self.walk_words(child, word, f);
            word.pop();
        }
    }
}

/// Heap entry ordered so that the *worst* candidate compares greatest.
#[derive(Debug, PartialEq, Eq)]
struct Ranked {
    frequency: Frequency,
    word: String,
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        other.frequency.cmp(&self.frequency).then_with(|| self.word.cmp(&other.word))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
