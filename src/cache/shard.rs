//! Shard Module
//!
//! A shard is an independent table of buckets. Each bucket owns a singly
//! linked collision chain and sits behind its own lock.

use std::iter;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::cache::node::Node;

// == Bucket ==
/// One slot of a shard's table, owning the head of its chain.
#[derive(Debug, Default)]
pub(crate) struct Bucket {
    head: Option<Box<Node>>,
}

impl Bucket {
    /// Iterates the chain from head to tail.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Node> {
        iter::successors(self.head.as_deref(), |node| node.next.as_deref())
    }

    // == Find ==
    /// Returns the first node for `key` that has not expired at `now`.
    pub(crate) fn find(&self, key: &str, now: DateTime<Utc>) -> Option<&Node> {
        self.iter()
            .find(|node| node.is_valid_at(now) && node.key == key)
    }

    // == Upsert ==
    /// Updates the first node holding `key` in place, or pushes a new node
    /// at the head of the chain. Returns true when a node was inserted.
    pub(crate) fn upsert(
        &mut self,
        key: &str,
        value: &[u8],
        expires_at: Option<DateTime<Utc>>,
    ) -> bool {
        let mut cursor = self.head.as_deref_mut();
        while let Some(node) = cursor {
            if node.key == key {
                node.overwrite(value, expires_at);
                return false;
            }
            cursor = node.next.as_deref_mut();
        }

        let mut node = Node::new(key, value, expires_at);
        node.next = self.head.take();
        self.head = Some(node);
        true
    }

    // == Purge Expired ==
    /// Unlinks every node expired at `now`, keeping the survivors in order.
    /// Returns the number of nodes removed.
    pub(crate) fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        let mut rest = self.head.take();
        let mut tail = &mut self.head;

        while let Some(mut node) = rest {
            rest = node.next.take();
            if node.is_expired_at(now) {
                removed += 1;
                continue;
            }
            tail = &mut tail.insert(node).next;
        }
        removed
    }

    // == Drain ==
    /// Detaches the chain, yielding its nodes head first.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = Box<Node>> {
        let mut rest = self.head.take();
        iter::from_fn(move || {
            let mut node = rest.take()?;
            rest = node.next.take();
            Some(node)
        })
    }

    /// Builds a chain holding `nodes` in the given order.
    fn from_ordered(nodes: Vec<Box<Node>>) -> Self {
        let head = nodes.into_iter().rev().fold(None, |next, mut node| {
            node.next = next;
            Some(node)
        });
        Self { head }
    }
}

impl Drop for Bucket {
    // Unlink iteratively so dropping a long chain cannot exhaust the stack.
    fn drop(&mut self) {
        self.drain().for_each(drop);
    }
}

// == Shard ==
/// An independently locked table of buckets.
#[derive(Debug)]
pub(crate) struct Shard {
    buckets: Box<[RwLock<Bucket>]>,
    /// Approximate count of nodes stored across all chains
    live: AtomicUsize,
}

impl Shard {
    // == Constructor ==
    pub(crate) fn new(bucket_count: usize) -> Self {
        Self {
            buckets: (0..bucket_count)
                .map(|_| RwLock::new(Bucket::default()))
                .collect(),
            live: AtomicUsize::new(0),
        }
    }

    pub(crate) fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub(crate) fn bucket(&self, index: usize) -> &RwLock<Bucket> {
        &self.buckets[index]
    }

    pub(crate) fn buckets(&self) -> impl Iterator<Item = &RwLock<Bucket>> {
        self.buckets.iter()
    }

    pub(crate) fn live_count(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }

    pub(crate) fn record_insert(&self) {
        self.live.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_removed(&self, count: usize) {
        if count == 0 {
            return;
        }
        // Saturate rather than wrap if the counter ever drifts below zero.
        let _ = self
            .live
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |live| {
                Some(live.saturating_sub(count))
            });
    }

    // == Rebuild ==
    /// Moves every node valid at `now` into a new shard of `bucket_count`
    /// buckets, dropping expired ones.
    ///
    /// `slot` places a key among the new buckets and `refresh` gives each
    /// moved node its new expiry. Target slots are all computed before any
    /// node moves, so a panicking `slot` leaves `self` untouched.
    pub(crate) fn rebuild(
        &mut self,
        bucket_count: usize,
        now: DateTime<Utc>,
        mut slot: impl FnMut(&str) -> usize,
        refresh: impl Fn(&Node) -> Option<DateTime<Utc>>,
    ) -> Shard {
        let targets: Vec<usize> = self
            .buckets
            .iter_mut()
            .flat_map(|bucket| bucket.get_mut().iter())
            .filter(|node| node.is_valid_at(now))
            .map(|node| slot(&node.key))
            .collect();

        let mut chains: Vec<Vec<Box<Node>>> = iter::repeat_with(Vec::new)
            .take(bucket_count)
            .collect();
        let mut targets = targets.into_iter();

        for bucket in self.buckets.iter_mut() {
            for mut node in bucket.get_mut().drain() {
                if node.is_expired_at(now) {
                    continue;
                }
                let Some(target) = targets.next() else {
                    break;
                };
                node.expires_at = refresh(&node);
                chains[target].push(node);
            }
        }

        let moved = chains.iter().map(Vec::len).sum();
        self.live.store(0, Ordering::Relaxed);

        Shard {
            buckets: chains
                .into_iter()
                .map(|chain| RwLock::new(Bucket::from_ordered(chain)))
                .collect(),
            live: AtomicUsize::new(moved),
        }
    }

    // == Clear ==
    /// Frees every chain; returns the number of nodes released.
    pub(crate) fn clear(&mut self) -> usize {
        let freed = self
            .buckets
            .iter_mut()
            .map(|bucket| bucket.get_mut().drain().count())
            .sum();
        self.live.store(0, Ordering::Relaxed);
        freed
    }
}
