//! Supervisor chains and chain sets.
//!
//! A chain is one escalation lane: position 0 is asked first and an
//! `Escalate` hands the call to the next position. A chain set is every lane
//! configured for one tool; each lane must reach Approve or Modify for the
//! call to run.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use sentinel_contracts::ids::{ChainId, SupervisorId};

use crate::traits::Supervisor;

/// Shared handle to a supervisor implementation.
pub type SupervisorRef = Arc<dyn Supervisor>;

/// One supervisor placed in a chain, with its backend id once registered.
#[derive(Clone)]
pub struct ChainMember {
    pub supervisor: SupervisorRef,
    pub supervisor_id: Option<SupervisorId>,
}

impl ChainMember {
    pub fn name(&self) -> &str {
        self.supervisor.name()
    }
}

impl fmt::Debug for ChainMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainMember")
            .field("name", &self.name())
            .field("supervisor_id", &self.supervisor_id)
            .finish()
    }
}

/// An ordered escalation lane.
#[derive(Debug, Clone, Default)]
pub struct Chain {
    pub members: Vec<ChainMember>,
    pub chain_id: Option<ChainId>,
}

impl Chain {
    pub fn new(supervisors: Vec<SupervisorRef>) -> Self {
        Self {
            members: supervisors
                .into_iter()
                .map(|supervisor| ChainMember {
                    supervisor,
                    supervisor_id: None,
                })
                .collect(),
            chain_id: None,
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.members.iter().map(ChainMember::name).collect()
    }
}

/// Every chain guarding one tool, in evaluation order.
#[derive(Debug, Clone, Default)]
pub struct ChainSet {
    chains: Vec<Chain>,
}

impl ChainSet {
    /// Build a chain set, suppressing duplicate supervisors.
    ///
    /// A supervisor (by name) keeps only its first position across the whole
    /// set; chains left empty afterwards are dropped.
    pub fn new(chains: Vec<Chain>) -> Self {
        let mut seen: HashSet<String> = HashSet::new();
        let chains = chains
            .into_iter()
            .filter_map(|mut chain| {
                chain
                    .members
                    .retain(|member| seen.insert(member.name().to_string()));
                (!chain.is_empty()).then_some(chain)
            })
            .collect();
        Self { chains }
    }

    pub fn from_supervisors(chains: Vec<Vec<SupervisorRef>>) -> Self {
        Self::new(chains.into_iter().map(Chain::new).collect())
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    /// True when nothing supervises the tool: the call runs unsupervised.
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }
}
