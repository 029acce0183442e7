//! Follower Graph (§4.3): who-follows-whom, mutated only by the Dispatcher
//! in sequence-id order. Unfollow removes exactly one edge — never the
//! whole followers set for a target (see §9.1).

use std::collections::{BTreeSet, HashMap};

#[derive(Default)]
pub struct FollowerGraph {
    followers: HashMap<u64, BTreeSet<u64>>,
}

impl FollowerGraph {
    pub fn new() -> Self {
        FollowerGraph::default()
    }

    /// Idempotent: adds `follower` to the set for `target`.
    pub fn add_follow(&mut self, follower: u64, target: u64) {
        self.followers.entry(target).or_default().insert(follower);
    }

    /// Idempotent: removes the single edge `follower -> target`. A no-op if
    /// the edge is absent. Never removes other followers of `target`.
    pub fn remove_follow(&mut self, follower: u64, target: u64) {
        if let Some(set) = self.followers.get_mut(&target) {
            set.remove(&follower);
        }
    }

    /// Current followers of `target`, in ascending id order (deterministic
    /// for recipient enumeration, per §4.5).
    pub fn followers_of(&self, target: u64) -> impl Iterator<Item = u64> + '_ {
        self.followers
            .get(&target)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }
}
