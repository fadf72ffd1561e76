// src/dag/graph.rs

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::errors::ValidationError;
use crate::types::{JobConfig, JobId};

/// Validated, immutable job graph.
///
/// Jobs are addressed by their index in the submitted list, so iterating in
/// index order is iterating in submission order. Both directions of every
/// edge are kept: `deps` for readiness and `dependents` (reverse adjacency)
/// for cascading skips.
#[derive(Debug, Clone)]
pub struct DagGraph {
    ids: Vec<JobId>,
    index: HashMap<JobId, usize>,
    deps: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
    topo_order: Vec<usize>,
}

impl DagGraph {
    /// Validate `jobs` and build the graph.
    ///
    /// Rejects empty lists, duplicate ids, dependencies on ids that are not in
    /// the list, and cycles (including self-dependencies). Nothing is partially
    /// accepted.
    pub fn build(jobs: &[JobConfig]) -> Result<Self, ValidationError> {
        if jobs.is_empty() {
            return Err(ValidationError::NoJobs);
        }

        let mut index = HashMap::with_capacity(jobs.len());
        for (i, job) in jobs.iter().enumerate() {
            if index.insert(job.id.clone(), i).is_some() {
                return Err(ValidationError::DuplicateId(job.id.clone()));
            }
        }

        let mut deps: Vec<Vec<usize>> = vec![Vec::new(); jobs.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); jobs.len()];

        for (i, job) in jobs.iter().enumerate() {
            let mut seen = HashSet::new();
            for dep in &job.depends_on {
                let Some(&d) = index.get(dep) else {
                    return Err(ValidationError::UnknownDependency {
                        job: job.id.clone(),
                        dependency: dep.clone(),
                    });
                };
                // Listing the same dependency twice is one edge.
                if seen.insert(d) {
                    deps[i].push(d);
                    dependents[d].push(i);
                }
            }
        }

        let ids: Vec<JobId> = jobs.iter().map(|j| j.id.clone()).collect();
        let topo_order = kahn_order(&deps, &dependents);

        if topo_order.len() < ids.len() {
            let jobs = cycle_members(&ids, &deps, &topo_order);
            return Err(ValidationError::CycleDetected { jobs });
        }

        debug!(jobs = ids.len(), "job graph validated");

        Ok(Self {
            ids,
            index,
            deps,
            dependents,
            topo_order,
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Job ids in submission order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(|s| s.as_str())
    }

    pub fn id(&self, idx: usize) -> &str {
        &self.ids[idx]
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Immediate dependencies of the job at `idx`.
    pub fn dependencies_of(&self, idx: usize) -> &[usize] {
        self.deps.get(idx).map(|d| d.as_slice()).unwrap_or(&[])
    }

    /// Immediate dependents of the job at `idx` (jobs listing it in `depends_on`).
    pub fn dependents_of(&self, idx: usize) -> &[usize] {
        self.dependents.get(idx).map(|d| d.as_slice()).unwrap_or(&[])
    }

    /// Ids of every job reachable downstream of `id`, in discovery order.
    pub fn descendants_of(&self, id: &str) -> Vec<&str> {
        let Some(root) = self.index_of(id) else {
            return Vec::new();
        };

        let mut seen = vec![false; self.len()];
        let mut queue: VecDeque<usize> = self.dependents_of(root).iter().copied().collect();
        let mut out = Vec::new();

        while let Some(i) = queue.pop_front() {
            if std::mem::replace(&mut seen[i], true) {
                continue;
            }
            out.push(self.id(i));
            queue.extend(self.dependents_of(i).iter().copied());
        }

        out
    }

    /// A topological order of the job ids. Roots come first, in submission order.
    pub fn topological_order(&self) -> impl Iterator<Item = &str> {
        self.topo_order.iter().map(|&i| self.id(i))
    }
}

/// Kahn's algorithm over index-based adjacency. Returns fewer indices than
/// there are jobs when the graph has a cycle.
fn kahn_order(deps: &[Vec<usize>], dependents: &[Vec<usize>]) -> Vec<usize> {
    let mut in_degree: Vec<usize> = deps.iter().map(|d| d.len()).collect();
    let mut queue: VecDeque<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &deg)| deg == 0)
        .map(|(i, _)| i)
        .collect();

    let mut order = Vec::with_capacity(deps.len());
    while let Some(i) = queue.pop_front() {
        order.push(i);
        for &dependent in &dependents[i] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                queue.push_back(dependent);
            }
        }
    }

    order
}

/// Names the jobs that actually sit on a cycle.
///
/// Jobs left out of the Kahn order are either on a cycle or downstream of
/// one; only strongly connected components with more than one node (or a
/// self-edge) are reported.
fn cycle_members(ids: &[JobId], deps: &[Vec<usize>], sorted: &[usize]) -> Vec<JobId> {
    let mut unsorted = vec![true; ids.len()];
    for &i in sorted {
        unsorted[i] = false;
    }

    let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
    for (i, job_deps) in deps.iter().enumerate() {
        if !unsorted[i] {
            continue;
        }
        graph.add_node(i);
        for &d in job_deps {
            if unsorted[d] {
                graph.add_edge(d, i, ());
            }
        }
    }

    let mut members: Vec<usize> = tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .flatten()
        .collect();
    members.sort_unstable();

    members.into_iter().map(|i| ids[i].clone()).collect()
}
