//! # Session Bridge
//!
//! Joins two fax legs: every IFP unit one endpoint decodes is pushed,
//! unmodified, into the other endpoint's encoder. The two sessions
//! share no state — each keeps its own sequence space and error
//! correction scheme, so a redundancy leg can face an FEC leg.

use tracing::trace;
use udptl_transport::RecoveredUnit;

use crate::endpoint::Endpoint;

/// Two endpoints forwarding into each other.
pub struct Bridge {
    left: Endpoint,
    right: Endpoint,
}

impl Bridge {
    pub fn new(left: Endpoint, right: Endpoint) -> Self {
        Bridge { left, right }
    }

    /// Forward everything currently readable, both directions. Returns
    /// the number of units moved. Call whenever either socket signals
    /// readability.
    pub fn pump(&mut self) -> anyhow::Result<usize> {
        let mut moved = 0;
        moved += Self::forward(&mut self.left, &mut self.right)?;
        moved += Self::forward(&mut self.right, &mut self.left)?;
        Ok(moved)
    }

    fn forward(from: &mut Endpoint, into: &mut Endpoint) -> anyhow::Result<usize> {
        let units: Vec<RecoveredUnit> = from.poll()?;
        let moved = units.len();
        for unit in units {
            trace!(seq = unit.seq, len = unit.payload.len(), "bridging unit");
            into.send(&unit.payload)?;
        }
        Ok(moved)
    }

    pub fn left(&self) -> &Endpoint {
        &self.left
    }

    pub fn right(&self) -> &Endpoint {
        &self.right
    }

    pub fn left_mut(&mut self) -> &mut Endpoint {
        &mut self.left
    }

    pub fn right_mut(&mut self) -> &mut Endpoint {
        &mut self.right
    }

    /// Tear the bridge down, returning the endpoints.
    pub fn into_parts(self) -> (Endpoint, Endpoint) {
        (self.left, self.right)
    }
}
