//! Shared constants for sampling cadence and record file naming.

/// Sampling intervals
pub mod sampling {
    use std::time::Duration;

    /// Default interval between two samples of the same sampler
    pub const STANDARD: Duration = Duration::from_millis(100);
    /// Fast sampling, mostly useful for tests and short-lived commands
    pub const FAST: Duration = Duration::from_millis(10);
}

/// Suffixes appended to a record path prefix
pub mod suffix {
    pub const CPU_LOG: &str = ".cpu.report";
    pub const MEMORY_LOG: &str = ".memory.report";
    pub const RESULT: &str = ".result.json";
}

/// Column headers of the persisted logs
pub mod columns {
    pub const CPU: [&str; 6] = [
        "timestamp",
        "percent",
        "user",
        "system",
        "children_user",
        "children_system",
    ];
    pub const MEMORY: [&str; 2] = ["timestamp", "usage"];
}

pub const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;
