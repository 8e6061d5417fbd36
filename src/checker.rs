//! The offline consistency checker.
//!
//! Builds the *phase event graph* of the declared configuration (five
//! nodes per resource, one per lifecycle phase) and verifies it has a
//! valid topological order. An order exists exactly when some sequence of
//! `get` calls can drive every declared resource to Created, so a cycle
//! here is a real "cyclical dependency" error waiting to happen at
//! instantiation time.
//!
//! Edges, per resource `r`:
//! - the intra-resource chain: each phase requires the previous one;
//! - `Provided(r)` requires `Provided(d)` for each provider dependency;
//! - `Injected(r)` requires `Provided(d)` for each injector dependency,
//!   which is why a cycle through an injector is *not* an error;
//! - `Created(r)` requires `Injected(d)` for each initializer dependency;
//! - `Disposed(r)` requires `Created(d)` for each disposer dependency,
//!   and `Disposed(d)` requires `Disposed(r)`: if `r`'s disposer consumes
//!   `d`, then `d` must outlive `r`'s disposal.

use std::collections::HashMap;
use std::fmt::{self, Write as _};

use crate::asset::Phase;
use crate::container::Container;
use crate::resource::ResourceId;

const PHASE_COUNT: usize = 5;

// Record an edge from a dependency's phase event to a dependent event, or
// report the dependency as undeclared.
#[allow(clippy::too_many_arguments)]
fn require(
  base: &HashMap<ResourceId, usize>,
  edges: &mut Vec<(usize, usize)>,
  sink: &mut dyn fmt::Write,
  ok: &mut bool,
  owner: &ResourceId,
  dep_rid: &ResourceId,
  dep_phase: Phase,
  dependent: usize,
) {
  match base.get(dep_rid) {
    Some(&dep_base) => edges.push((dep_base + dep_phase as usize, dependent)),
    None => {
      let _ = writeln!(sink, "undeclared dependency: {} required by {}", dep_rid, owner);
      *ok = false;
    }
  }
}

/// Run the check against `container`'s declared managers, writing a
/// report to `sink`. Returns `true` when the configuration is consistent.
pub(crate) fn check(container: &Container, sink: &mut dyn fmt::Write) -> bool {
  let managers = container.managers_snapshot();
  let mut ok = true;

  let mut base: HashMap<ResourceId, usize> = HashMap::new();
  let mut labels: Vec<(ResourceId, Phase)> = Vec::with_capacity(managers.len() * PHASE_COUNT);
  for (rid, _) in &managers {
    base.insert(rid.clone(), labels.len());
    for phase in [
      Phase::Allocated,
      Phase::Provided,
      Phase::Injected,
      Phase::Created,
      Phase::Disposed,
    ] {
      labels.push((rid.clone(), phase));
    }
  }
  let node_count = labels.len();

  // Edges run from prerequisite to dependent.
  let mut edges: Vec<(usize, usize)> = Vec::new();

  for (rid, manager) in &managers {
    let b = base[rid];
    for offset in 1..PHASE_COUNT {
      edges.push((b + offset - 1, b + offset));
    }

    if !manager.has_provider() {
      let _ = writeln!(sink, "no provider is set for {}", rid);
      ok = false;
    }

    for dep in manager.provider_injections() {
      require(
        &base,
        &mut edges,
        sink,
        &mut ok,
        rid,
        &dep.rid,
        dep.phase,
        b + Phase::Provided as usize,
      );
    }
    for index in 0..manager.injector_count() {
      for dep in manager.injector_injections(index) {
        require(
          &base,
          &mut edges,
          sink,
          &mut ok,
          rid,
          &dep.rid,
          dep.phase,
          b + Phase::Injected as usize,
        );
      }
    }
    for dep in manager.initializer_injections() {
      require(
        &base,
        &mut edges,
        sink,
        &mut ok,
        rid,
        &dep.rid,
        dep.phase,
        b + Phase::Created as usize,
      );
    }
    for dep in manager.disposer_injections() {
      require(
        &base,
        &mut edges,
        sink,
        &mut ok,
        rid,
        &dep.rid,
        dep.phase,
        b + Phase::Disposed as usize,
      );
      // Happens-before: whatever r's disposer consumes is disposed after r.
      if let Some(&dep_base) = base.get(&dep.rid) {
        edges.push((b + Phase::Disposed as usize, dep_base + Phase::Disposed as usize));
      }
    }
  }

  // A topological order exists exactly when every strongly connected
  // component is a single node without a self edge. Kosaraju's two
  // passes find the components; edges inside one are the back edges
  // worth reporting.
  let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); node_count];
  let mut reversed: Vec<Vec<usize>> = vec![Vec::new(); node_count];
  for &(from, to) in &edges {
    adjacency[from].push(to);
    reversed[to].push(from);
  }

  let mut visited = vec![false; node_count];
  let mut order: Vec<usize> = Vec::with_capacity(node_count);
  for start in 0..node_count {
    if visited[start] {
      continue;
    }
    visited[start] = true;
    let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
    while let Some(frame) = stack.last_mut() {
      let node = frame.0;
      if frame.1 < adjacency[node].len() {
        let next = adjacency[node][frame.1];
        frame.1 += 1;
        if !visited[next] {
          visited[next] = true;
          stack.push((next, 0));
        }
      } else {
        order.push(node);
        stack.pop();
      }
    }
  }

  let mut component = vec![usize::MAX; node_count];
  let mut component_sizes: Vec<usize> = Vec::new();
  for &start in order.iter().rev() {
    if component[start] != usize::MAX {
      continue;
    }
    let id = component_sizes.len();
    component[start] = id;
    let mut size = 0usize;
    let mut pending = vec![start];
    while let Some(node) = pending.pop() {
      size += 1;
      for &prev in &reversed[node] {
        if component[prev] == usize::MAX {
          component[prev] = id;
          pending.push(prev);
        }
      }
    }
    component_sizes.push(size);
  }

  for &(from, to) in &edges {
    let cyclic = component[from] == component[to] && (component_sizes[component[from]] > 1 || from == to);
    if cyclic {
      ok = false;
      let (from_rid, from_phase) = &labels[from];
      let (to_rid, to_phase) = &labels[to];
      let _ = writeln!(
        sink,
        "cyclical dependency: {}[{}] requires {}[{}]",
        to_rid, to_phase, from_rid, from_phase
      );
    }
  }

  ok
}
