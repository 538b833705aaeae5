//! Dinic max-flow over an undirected, capacitated graph on dense slots.
//!
//! An undirected edge of capacity `c` is a pair of arcs `u→v`, `v→u`,
//! each the other's reverse and each with capacity `c`. Pushing `f` along
//! `u→v` leaves `c - f` forward and `c + f` backward, which is exactly the
//! residual of an undirected edge.

use std::collections::VecDeque;

/// Capacity of an edge in the flow network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Capacity {
    Finite(f64),
    /// Synthetic ties that must never be cut.
    Unbounded,
}

impl Capacity {
    /// Negative and NaN weights carry no flow.
    fn value(self) -> f64 {
        match self {
            Capacity::Finite(c) if c > 0.0 => c,
            Capacity::Finite(_) => 0.0,
            Capacity::Unbounded => f64::INFINITY,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Arc {
    to: usize,
    rev: usize, // index of the reverse arc in adj[to]
    cap: f64,
    flow: f64,
}

/// Round-off left on an arc after pushing its full residual, relative to
/// the arc's own capacity.
const SATURATION_EPS: f64 = 1e-12;

impl Arc {
    fn residual(&self) -> f64 {
        self.cap - self.flow
    }

    /// Whether the arc can still carry flow. The threshold scales with this
    /// arc alone, so tiny and huge capacities in one network don't mask
    /// each other.
    fn is_open(&self) -> bool {
        let residual = self.residual();
        residual > 0.0 && (self.cap.is_infinite() || residual > self.cap * SATURATION_EPS)
    }
}

/// Residual network for one max-flow computation.
#[derive(Debug, Clone)]
pub struct FlowNetwork {
    adj: Vec<Vec<Arc>>,
}

impl FlowNetwork {
    pub fn new(node_count: usize) -> Self {
        Self { adj: vec![Vec::new(); node_count] }
    }

    pub fn node_count(&self) -> usize {
        self.adj.len()
    }

    /// Add an undirected edge. Self-loops carry no flow and are ignored.
    pub fn add_edge(&mut self, u: usize, v: usize, capacity: Capacity) {
        if u == v {
            return;
        }
        let cap = capacity.value();

        let (a_len, b_len) = (self.adj[u].len(), self.adj[v].len());
        self.adj[u].push(Arc { to: v, rev: b_len, cap, flow: 0.0 });
        self.adj[v].push(Arc { to: u, rev: a_len, cap, flow: 0.0 });
    }

    /// Saturate the network from `source` to `sink` and return the flow value.
    ///
    /// Infinite only if `source` and `sink` are joined by unbounded arcs alone.
    pub fn max_flow(&mut self, source: usize, sink: usize) -> f64 {
        if source == sink {
            return f64::INFINITY;
        }

        let n = self.adj.len();
        let mut max_flow = 0.0;
        let mut level = vec![usize::MAX; n];

        loop {
            // BFS to build the level graph
            self.levels_from(source, &mut level);
            if level[sink] == usize::MAX {
                break;
            }

            // DFS to push a blocking flow
            let mut ptr = vec![0; n];
            let mut path = Vec::new();
            while let Some(pushed) = self.augment(source, sink, &level, &mut ptr, &mut path) {
                if pushed.is_infinite() {
                    return f64::INFINITY;
                }
                if pushed <= 0.0 {
                    break;
                }
                max_flow += pushed;
            }
        }

        max_flow
    }

    /// Slots reachable from `source` through unsaturated arcs. After
    /// [`max_flow`](Self::max_flow) this is the source side of a minimum cut.
    pub fn source_side(&self, source: usize) -> Vec<bool> {
        let mut seen = vec![false; self.adj.len()];
        seen[source] = true;
        let mut queue = VecDeque::from([source]);
        while let Some(u) = queue.pop_front() {
            for arc in &self.adj[u] {
                if !seen[arc.to] && arc.is_open() {
                    seen[arc.to] = true;
                    queue.push_back(arc.to);
                }
            }
        }
        seen
    }

    fn levels_from(&self, source: usize, level: &mut [usize]) {
        level.fill(usize::MAX);
        level[source] = 0;
        let mut queue = VecDeque::from([source]);
        while let Some(u) = queue.pop_front() {
            for arc in &self.adj[u] {
                if arc.is_open() && level[arc.to] == usize::MAX {
                    level[arc.to] = level[u] + 1;
                    queue.push_back(arc.to);
                }
            }
        }
    }

    /// Find one source-to-sink path in the level graph and push its
    /// bottleneck. Iterative, so path length is bounded by memory rather
    /// than the thread stack. `path` holds `(node, arc index)` pairs.
    fn augment(
        &mut self,
        source: usize,
        sink: usize,
        level: &[usize],
        ptr: &mut [usize],
        path: &mut Vec<(usize, usize)>,
    ) -> Option<f64> {
        path.clear();
        let mut u = source;
        loop {
            if u == sink {
                let bottleneck = path
                    .iter()
                    .map(|&(v, i)| self.adj[v][i].residual())
                    .fold(f64::INFINITY, f64::min);
                for &(v, i) in path.iter() {
                    let arc = self.adj[v][i];
                    self.adj[v][i].flow += bottleneck;
                    self.adj[arc.to][arc.rev].flow -= bottleneck;
                }
                return Some(bottleneck);
            }

            let mut advanced = false;
            while ptr[u] < self.adj[u].len() {
                let arc = self.adj[u][ptr[u]];
                if level[arc.to] == level[u] + 1 && arc.is_open() {
                    path.push((u, ptr[u]));
                    u = arc.to;
                    advanced = true;
                    break;
                }
                ptr[u] += 1;
            }

            if !advanced {
                // dead end: retreat and never try this arc again in this phase
                let (prev, _) = path.pop()?;
                ptr[prev] += 1;
                u = prev;
            }
        }
    }
}
