//! The Cohort forest: parent/child edges between Cohorts and the
//! ClusterQueues attached to them, with cycle detection (`spec.md` §2, §4.2,
//! §9).

use std::collections::{BTreeMap, BTreeSet};

use kueue_api::resource::{ClusterQueueName, CohortName};

#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    cohort_parent: BTreeMap<CohortName, CohortName>,
    cohort_children: BTreeMap<CohortName, BTreeSet<CohortName>>,
    cohort_queues: BTreeMap<CohortName, BTreeSet<ClusterQueueName>>,
    queue_cohort: BTreeMap<ClusterQueueName, CohortName>,
    known_cohorts: BTreeSet<CohortName>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("attaching cohort {child:?} to parent {parent:?} would create a cycle")]
pub struct CycleDetected {
    pub child: CohortName,
    pub parent: CohortName,
}

impl Hierarchy {
    pub fn ensure_cohort_known(&mut self, cohort: &CohortName) {
        self.known_cohorts.insert(cohort.clone());
        self.cohort_children.entry(cohort.clone()).or_default();
        self.cohort_queues.entry(cohort.clone()).or_default();
    }

    pub fn remove_cohort(&mut self, cohort: &CohortName) {
        self.known_cohorts.remove(cohort);
        self.cohort_children.remove(cohort);
        self.cohort_queues.remove(cohort);
        if let Some(parent) = self.cohort_parent.remove(cohort) {
            if let Some(children) = self.cohort_children.get_mut(&parent) {
                children.remove(cohort);
            }
        }
    }

    /// Sets (or clears, with `parent = None`) a cohort's parent. Rejects the
    /// change with [`CycleDetected`] if `parent` is `cohort` itself or a
    /// descendant of `cohort` — walking from the candidate parent upward
    /// must never reach `cohort` (`spec.md` §9).
    pub fn set_cohort_parent(
        &mut self,
        cohort: &CohortName,
        parent: Option<CohortName>,
    ) -> Result<(), CycleDetected> {
        self.ensure_cohort_known(cohort);

        if let Some(parent) = &parent {
            self.ensure_cohort_known(parent);
            let mut walker = Some(parent.clone());
            while let Some(current) = walker {
                if &current == cohort {
                    return Err(CycleDetected {
                        child: cohort.clone(),
                        parent: parent.clone(),
                    });
                }
                walker = self.cohort_parent.get(&current).cloned();
            }
        }

        if let Some(old_parent) = self.cohort_parent.remove(cohort) {
            if let Some(children) = self.cohort_children.get_mut(&old_parent) {
                children.remove(cohort);
            }
        }
        if let Some(parent) = parent {
            self.cohort_children.entry(parent.clone()).or_default().insert(cohort.clone());
            self.cohort_parent.insert(cohort.clone(), parent);
        }
        Ok(())
    }

    pub fn attach_queue(&mut self, queue: &ClusterQueueName, cohort: &CohortName) {
        self.detach_queue(queue);
        self.ensure_cohort_known(cohort);
        self.cohort_queues.entry(cohort.clone()).or_default().insert(queue.clone());
        self.queue_cohort.insert(queue.clone(), cohort.clone());
    }

    pub fn detach_queue(&mut self, queue: &ClusterQueueName) {
        if let Some(cohort) = self.queue_cohort.remove(queue) {
            if let Some(queues) = self.cohort_queues.get_mut(&cohort) {
                queues.remove(queue);
            }
        }
    }

    pub fn queue_cohort(&self, queue: &ClusterQueueName) -> Option<&CohortName> {
        self.queue_cohort.get(queue)
    }

    pub fn child_queues(&self, cohort: &CohortName) -> impl Iterator<Item = &ClusterQueueName> {
        self.cohort_queues.get(cohort).into_iter().flatten()
    }

    pub fn child_cohorts(&self, cohort: &CohortName) -> impl Iterator<Item = &CohortName> {
        self.cohort_children.get(cohort).into_iter().flatten()
    }

    pub fn parent_cohort(&self, cohort: &CohortName) -> Option<&CohortName> {
        self.cohort_parent.get(cohort)
    }

    /// Root-ward chain of ancestor cohorts, nearest first, not including
    /// `cohort` itself.
    pub fn ancestors(&self, cohort: &CohortName) -> Vec<CohortName> {
        let mut out = Vec::new();
        let mut current = self.cohort_parent.get(cohort).cloned();
        while let Some(name) = current {
            current = self.cohort_parent.get(&name).cloned();
            out.push(name);
        }
        out
    }

    pub fn all_cohorts(&self) -> impl Iterator<Item = &CohortName> {
        self.known_cohorts.iter()
    }

    /// Topmost ancestor of `cohort` (itself, if it has no parent). Every
    /// ClusterQueue reachable from this root shares one borrowing pool —
    /// `spec.md` §4.2 describes borrowing as cohort-wide, and a cohort tree
    /// forms a single sharing domain regardless of how deep a queue sits.
    pub fn root_cohort(&self, cohort: &CohortName) -> CohortName {
        self.ancestors(cohort).into_iter().last().unwrap_or_else(|| cohort.clone())
    }

    /// Every Cohort in `root`'s subtree, `root` included.
    pub fn subtree_cohorts(&self, root: &CohortName) -> Vec<CohortName> {
        let mut out = vec![root.clone()];
        let mut frontier = vec![root.clone()];
        while let Some(node) = frontier.pop() {
            for child in self.child_cohorts(&node) {
                out.push(child.clone());
                frontier.push(child.clone());
            }
        }
        out
    }

    /// Every ClusterQueue attached anywhere in `root`'s subtree.
    pub fn subtree_queues(&self, root: &CohortName) -> Vec<ClusterQueueName> {
        self.subtree_cohorts(root)
            .iter()
            .flat_map(|cohort| self.child_queues(cohort).cloned())
            .collect()
    }

    /// Cohorts that are members of a parent-pointer cycle, or descendants
    /// (by the child-cohort relation) of one. `spec.md` §4.2: "the affected
    /// subtree is marked stale"; §9: cycle detection happens by walking
    /// parent pointers, so any cohort whose chain of ancestors loops back on
    /// itself is a cycle member, and everything beneath a cycle member in
    /// the tree is affected too.
    pub fn stale_cohorts(&self) -> BTreeSet<CohortName> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            InProgress,
            Done,
        }
        let mut marks: BTreeMap<CohortName, Mark> = BTreeMap::new();
        let mut cycle_members: BTreeSet<CohortName> = BTreeSet::new();

        for start in &self.known_cohorts {
            if marks.contains_key(start) {
                continue;
            }
            let mut path = Vec::new();
            let mut current = start.clone();
            loop {
                match marks.get(&current) {
                    Some(Mark::Done) => break,
                    Some(Mark::InProgress) => {
                        if let Some(pos) = path.iter().position(|n| n == &current) {
                            cycle_members.extend(path[pos..].iter().cloned());
                        }
                        break;
                    }
                    None => {
                        marks.insert(current.clone(), Mark::InProgress);
                        path.push(current.clone());
                        match self.cohort_parent.get(&current) {
                            Some(parent) => current = parent.clone(),
                            None => break,
                        }
                    }
                }
            }
            for node in &path {
                marks.insert(node.clone(), Mark::Done);
            }
        }

        // Flood down: every descendant of a cycle member is affected too.
        let mut stale = cycle_members.clone();
        let mut frontier: Vec<CohortName> = cycle_members.into_iter().collect();
        while let Some(node) = frontier.pop() {
            for child in self.child_cohorts(&node) {
                if stale.insert(child.clone()) {
                    frontier.push(child.clone());
                }
            }
        }
        stale
    }
}
