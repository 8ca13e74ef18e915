//! Structure-of-arrays mirror of the hot agent fields.
//!
//! The belief backends never touch the canonical `Vec<Agent>`; they
//! consume an [`AgentView`] over these parallel arrays plus a CSR
//! encoding of the social graph. The store is the only place that knows
//! this layout, so a different backend (e.g. a GPU kernel) only needs the
//! view descriptor.
//!
//! Dirty flags record which groups of arrays actually changed during the
//! last sync so a backend can skip re-uploading unchanged buffers.

use crate::agent::Agent;
use crate::core::types::BELIEF_DIMS;

/// Which array groups changed in the last `sync_from_agents`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtyFlags {
    pub beliefs: bool,
    pub properties: bool,
    pub graph: bool,
}

impl DirtyFlags {
    pub fn any(&self) -> bool {
        self.beliefs || self.properties || self.graph
    }
}

/// SoA storage for the belief hot path.
#[derive(Debug, Default)]
pub struct AgentStore {
    // Beliefs, one array per dimension
    b: [Vec<f64>; BELIEF_DIMS],

    // Properties consumed by the influence kernels
    susceptibility: Vec<f64>,
    comm: Vec<f64>,
    fluency: Vec<f64>,
    openness: Vec<f64>,
    conformity: Vec<f64>,
    primary_lang: Vec<u8>,
    region: Vec<u32>,
    alive: Vec<u8>,

    // Social graph in CSR form
    neighbor_offsets: Vec<u32>,
    neighbor_counts: Vec<u32>,
    neighbor_indices: Vec<u32>,

    dirty: DirtyFlags,
}

/// Borrowed descriptor over the store's arrays; the unit of exchange
/// with belief backends.
pub struct AgentView<'a> {
    pub count: usize,
    pub b: [&'a [f64]; BELIEF_DIMS],
    pub susceptibility: &'a [f64],
    pub comm: &'a [f64],
    pub fluency: &'a [f64],
    pub openness: &'a [f64],
    pub conformity: &'a [f64],
    pub primary_lang: &'a [u8],
    pub region: &'a [u32],
    pub alive: &'a [u8],
    pub neighbor_offsets: &'a [u32],
    pub neighbor_counts: &'a [u32],
    pub neighbor_indices: &'a [u32],
}

impl<'a> AgentView<'a> {
    /// Neighbor slice for agent `i`.
    #[inline]
    pub fn neighbors(&self, i: usize) -> &'a [u32] {
        let start = self.neighbor_offsets[i] as usize;
        let len = self.neighbor_counts[i] as usize;
        &self.neighbor_indices[start..start + len]
    }

    #[inline]
    pub fn is_alive(&self, i: usize) -> bool {
        self.alive[i] != 0
    }

    #[inline]
    pub fn beliefs_of(&self, i: usize) -> [f64; BELIEF_DIMS] {
        [self.b[0][i], self.b[1][i], self.b[2][i], self.b[3][i]]
    }
}

impl AgentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.alive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alive.is_empty()
    }

    pub fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = DirtyFlags::default();
    }

    pub fn edge_count(&self) -> usize {
        self.neighbor_indices.len()
    }

    fn resize(&mut self, n: usize) {
        for dim in &mut self.b {
            dim.resize(n, 0.0);
        }
        self.susceptibility.resize(n, 1.0);
        self.comm.resize(n, 1.0);
        self.fluency.resize(n, 1.0);
        self.openness.resize(n, 0.5);
        self.conformity.resize(n, 0.5);
        self.primary_lang.resize(n, 0);
        self.region.resize(n, 0);
        self.alive.resize(n, 0);
        self.neighbor_offsets.resize(n, 0);
        self.neighbor_counts.resize(n, 0);
    }

    /// Copy from the canonical agents, raising dirty flags only where
    /// values actually changed. The graph is re-flattened whenever any
    /// adjacency list differs from the CSR image.
    pub fn sync_from_agents(&mut self, agents: &[Agent]) {
        let n = agents.len();
        let grew = n != self.len();
        self.resize(n);
        if grew {
            self.dirty = DirtyFlags {
                beliefs: true,
                properties: true,
                graph: true,
            };
        }

        for (i, a) in agents.iter().enumerate() {
            for d in 0..BELIEF_DIMS {
                if self.b[d][i] != a.b[d] {
                    self.b[d][i] = a.b[d];
                    self.dirty.beliefs = true;
                }
            }

            let alive = u8::from(a.alive);
            if self.susceptibility[i] != a.m_susceptibility
                || self.comm[i] != a.m_comm
                || self.fluency[i] != a.fluency
                || self.openness[i] != a.openness
                || self.conformity[i] != a.conformity
                || self.primary_lang[i] != a.primary_lang
                || self.region[i] != a.region
                || self.alive[i] != alive
            {
                self.susceptibility[i] = a.m_susceptibility;
                self.comm[i] = a.m_comm;
                self.fluency[i] = a.fluency;
                self.openness[i] = a.openness;
                self.conformity[i] = a.conformity;
                self.primary_lang[i] = a.primary_lang;
                self.region[i] = a.region;
                self.alive[i] = alive;
                self.dirty.properties = true;
            }
        }

        if grew || self.graph_changed(agents) {
            self.rebuild_graph(agents);
            self.dirty.graph = true;
        }
    }

    fn graph_changed(&self, agents: &[Agent]) -> bool {
        let mut offset = 0usize;
        for (i, a) in agents.iter().enumerate() {
            if self.neighbor_counts[i] as usize != a.neighbors.len() {
                return true;
            }
            if self.neighbor_offsets[i] as usize != offset {
                return true;
            }
            let slice = &self.neighbor_indices[offset..offset + a.neighbors.len()];
            if slice != a.neighbors.as_slice() {
                return true;
            }
            offset += a.neighbors.len();
        }
        offset != self.neighbor_indices.len()
    }

    fn rebuild_graph(&mut self, agents: &[Agent]) {
        self.neighbor_indices.clear();
        for (i, a) in agents.iter().enumerate() {
            self.neighbor_offsets[i] = self.neighbor_indices.len() as u32;
            self.neighbor_counts[i] = a.neighbors.len() as u32;
            self.neighbor_indices.extend_from_slice(&a.neighbors);
        }
    }

    /// Write beliefs back into the canonical agents, refreshing internal
    /// state and cached norms.
    pub fn sync_beliefs_to_agents(&self, agents: &mut [Agent]) {
        for (i, a) in agents.iter_mut().enumerate() {
            for d in 0..BELIEF_DIMS {
                a.b[d] = self.b[d][i];
            }
            a.refresh_norm();
        }
    }

    /// Overwrite a single agent's belief row (used by backends that
    /// compute in place through the store).
    pub fn write_beliefs(&mut self, i: usize, b: [f64; BELIEF_DIMS]) {
        for d in 0..BELIEF_DIMS {
            self.b[d][i] = b[d];
        }
        self.dirty.beliefs = true;
    }

    pub fn view(&self) -> AgentView<'_> {
        AgentView {
            count: self.len(),
            b: [&self.b[0], &self.b[1], &self.b[2], &self.b[3]],
            susceptibility: &self.susceptibility,
            comm: &self.comm,
            fluency: &self.fluency,
            openness: &self.openness,
            conformity: &self.conformity,
            primary_lang: &self.primary_lang,
            region: &self.region,
            alive: &self.alive,
            neighbor_offsets: &self.neighbor_offsets,
            neighbor_counts: &self.neighbor_counts,
            neighbor_indices: &self.neighbor_indices,
        }
    }
}
