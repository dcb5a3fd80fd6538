//! Free-memory probes.
//!
//! The engine sizes its buffers once at startup and samples free memory
//! periodically afterwards. Both go through [`MemoryProbe`] so the host
//! platform decides what "free" means.

/// Reports how much memory is currently available.
pub trait MemoryProbe: Send + Sync {
    /// Available bytes, or `None` when the platform cannot tell.
    fn free_bytes(&self) -> Option<u64>;
}

/// A probe that never knows. Startup checks pass and sampling is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnknownMemory;

impl MemoryProbe for UnknownMemory {
    fn free_bytes(&self) -> Option<u64> {
        None
    }
}

/// A probe that always reports the same amount.
#[derive(Debug, Clone, Copy)]
pub struct FixedMemory(pub u64);

impl MemoryProbe for FixedMemory {
    fn free_bytes(&self) -> Option<u64> {
        Some(self.0)
    }
}

/// Reads `MemAvailable` from `/proc/meminfo` on Linux.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMemory;

impl MemoryProbe for SystemMemory {
    #[cfg(target_os = "linux")]
    fn free_bytes(&self) -> Option<u64> {
        let text = std::fs::read_to_string("/proc/meminfo").ok()?;
        parse_mem_available(&text)
    }

    #[cfg(not(target_os = "linux"))]
    fn free_bytes(&self) -> Option<u64> {
        None
    }
}

/// Extract `MemAvailable` (reported in kB) as bytes.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_mem_available(meminfo: &str) -> Option<u64> {
    meminfo
        .lines()
        .find_map(|line| line.strip_prefix("MemAvailable:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
}
