//! simulator::errors — error type for the simulator capability boundary.

/// Crate-wide result alias for simulator operations.
pub type SimResult<T> = Result<T, SimError>;

/// `SimError` — failures crossing the simulator boundary.
///
/// `RunFailed` is the recoverable variant: the engine discards the affected
/// trajectory, counts the failure against the per-generation budget, and
/// retries the proposal. The remaining variants indicate a misconfigured
/// handle and are surfaced to the caller unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    // ---- Trajectory execution ----
    RunFailed { message: String },

    // ---- Parameter slots ----
    InvalidGdataIndex { index: usize, len: usize },
    InvalidLdataIndex { index: usize, node: usize, n_rows: usize, n_nodes: usize },

    // ---- Replication ----
    ReplicateUnsupported { reason: String },
    InvalidReplicateCount { n: usize },
}

impl std::error::Error for SimError {}

impl std::fmt::Display for SimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Trajectory execution ----
            SimError::RunFailed { message } => {
                write!(f, "Trajectory execution failed: {message}")
            }

            // ---- Parameter slots ----
            SimError::InvalidGdataIndex { index, len } => {
                write!(f, "gdata index {index} out of bounds: vector has length {len}")
            }
            SimError::InvalidLdataIndex { index, node, n_rows, n_nodes } => {
                write!(
                    f,
                    "ldata slot ({index}, node {node}) out of bounds: \
                     matrix is {n_rows} rows x {n_nodes} nodes"
                )
            }

            // ---- Replication ----
            SimError::ReplicateUnsupported { reason } => {
                write!(f, "First-node replication unsupported: {reason}")
            }
            SimError::InvalidReplicateCount { n } => {
                write!(f, "Invalid replication count {n}: must be >= 1")
            }
        }
    }
}
