//! Engine-wide constants
//!
//! Id allocation seeds, traversal limits and log formatting widths.

/// Node and link id allocation
pub mod ids {
    /// First id handed out by a fresh node-id allocator
    pub const NODE_ID_SEED: i32 = 1;
    /// Distance between consecutive node ids. Attribute ids live in the gap
    /// (`id + 1 ..= id + pins`), so no pin layout may exceed `NODE_ID_STEP - 1`.
    pub const NODE_ID_STEP: i32 = 10;
    /// First id handed out by a fresh link-id allocator
    pub const LINK_ID_SEED: i32 = 10_000;
    /// First project id
    pub const PROJECT_ID_SEED: i32 = 1;
    /// First orchestration id
    pub const ORCHESTRATION_ID_SEED: i32 = 1000;
}

/// Orchestration traversal
pub mod traversal {
    /// Hard cap on link-following steps in one run
    pub const MAX_ITERATIONS: usize = 100;
}

/// Execution log formatting
pub mod log_format {
    /// Characters of a response body echoed into the log
    pub const RESPONSE_BODY_PREVIEW: usize = 200;
    /// Characters of a variable value echoed into the log
    pub const VARIABLE_PREVIEW: usize = 100;
    /// Prefix for lines mirrored from an execution context into the log sink
    pub const EXEC_PREFIX: &str = "[EXEC] ";
}

/// Shared log sink retention
pub mod log_sink {
    /// Lines retained before pruning kicks in
    pub const MAX_LINES: usize = 10_000;
    /// Oldest lines dropped per prune
    pub const PRUNE_BATCH: usize = 1_000;
}
