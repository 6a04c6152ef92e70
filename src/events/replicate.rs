//! First-node replication of scheduled events.
//!
//! When the parameter target is the per-node `ldata` matrix, the engine packs
//! many particles into one trajectory by cloning node 1 of the model `n`
//! times. The scheduled events targeting node 1 must be cloned alongside,
//! with the node offsets `0, 1, …, n-1` applied to the `node` field. The
//! `dest` field is never offset: external-transfer events are rejected under
//! this mode, so `dest` is always an ignored 0 here.
use crate::events::errors::{EventError, EventResult};
use crate::events::table::{Event, EventKind, EventTable};

impl EventTable {
    /// Clone the node-1 event subset `n` times with node offsets `0..n`.
    ///
    /// Events targeting other nodes are dropped: the replicated model consists
    /// of `n` copies of node 1 only. The result is re-sorted through the
    /// standard `(time, kind, select)` order; since the sort key ignores
    /// `node`, clones of one event stay adjacent in offset order.
    ///
    /// # Errors
    /// - [`EventError::ReplicateCountZero`] if `n == 0`.
    /// - [`EventError::ReplicateExternalTransfer`] if any retained event is an
    ///   `extTrans` event (its `dest` could not survive replication).
    pub fn replicate_first_node(&self, n: usize) -> EventResult<EventTable> {
        if n == 0 {
            return Err(EventError::ReplicateCountZero);
        }
        let first_node: Vec<&Event> = self.events().iter().filter(|e| e.node == 1).collect();
        if let Some(row) =
            first_node.iter().position(|e| e.kind == EventKind::ExtTransfer)
        {
            return Err(EventError::ReplicateExternalTransfer { row });
        }

        let mut events = Vec::with_capacity(n * first_node.len());
        for offset in 0..n {
            for event in &first_node {
                let mut clone = (*event).clone();
                clone.node += offset;
                events.push(clone);
            }
        }
        events.sort_by_key(|e| (e.time, e.kind, e.select));
        Ok(EventTable::from_sorted_events(
            events,
            self.select_matrix().clone(),
            self.shift_matrix().clone(),
            self.event_origin(),
            self.time_origin(),
        ))
    }
}
