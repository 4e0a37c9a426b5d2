//! Capability registry (`spec.md` §5 "Resource-Aware Scheduling").
//!
//! Detects what hardware is actually available and derives a capability
//! tier plus a recommendation report the orchestrator uses to decide which
//! heavy analyses (embeddings, LLM-assisted resolution) to attempt rather
//! than queue indefinitely.

use manuscript_types::{ManuscriptError, Result};
use sysinfo::System;

/// Lowest CUDA/Metal compute capability this workspace will schedule GPU
/// work on (`spec.md` §4.1: "a blocked GPU is reported, not hidden").
/// Below this floor a present GPU is detected but not used.
pub const MIN_SUPPORTED_COMPUTE_CAPABILITY: f32 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CapabilityTier {
    Minimal,
    Standard,
    Accelerated,
}

#[derive(Debug, Clone)]
pub struct SystemCapabilities {
    pub cpu_cores: usize,
    pub total_memory_bytes: u64,
    pub available_memory_bytes: u64,
    /// `Some(capability)` when a GPU was detected, regardless of whether
    /// its compute capability clears `MIN_SUPPORTED_COMPUTE_CAPABILITY`.
    pub gpu_compute_capability: Option<f32>,
    /// True only when a GPU is present AND usable (capability at or above
    /// the floor) — the tier calculation keys off this, not raw presence.
    pub gpu_present: bool,
    /// True when a GPU was detected but its compute capability is below
    /// the floor: a blocked GPU, surfaced rather than silently ignored.
    pub gpu_blocked: bool,
    pub tier: CapabilityTier,
}

/// GPU presence/compute-capability probe, kept as a trait so CI and
/// developer laptops without a GPU driver stack still build and run tests
/// (`spec.md` §7 "Degraded capability").
pub trait GpuProbe: Send + Sync {
    /// Returns the GPU's compute capability version if one is present, or
    /// `None` if there is no GPU (or no GPU capability wired in).
    fn compute_capability(&self) -> Option<f32>;
}

pub struct NoGpu;
impl GpuProbe for NoGpu {
    fn compute_capability(&self) -> Option<f32> {
        None
    }
}

pub struct SystemCapabilityRegistry {
    system: System,
}

impl SystemCapabilityRegistry {
    pub fn new() -> Result<Self> {
        let mut system = System::new_all();
        system.refresh_all();
        Ok(Self { system })
    }

    /// Snapshot current hardware state and derive a tier. Memory thresholds
    /// below which heavy analyses are skipped rather than risk starving the
    /// pipeline (`spec.md` §5: "below 2 GiB available, run minimal").
    pub fn detect(&mut self, gpu_probe: &dyn GpuProbe) -> Result<SystemCapabilities> {
        self.system.refresh_all();

        let cpu_cores = self.system.cpus().len();
        if cpu_cores == 0 {
            return Err(ManuscriptError::CapabilityUnavailable(
                "could not determine CPU core count".to_string(),
            ));
        }
        let total_memory_bytes = self.system.total_memory();
        let available_memory_bytes = self.system.available_memory();

        let gpu_compute_capability = gpu_probe.compute_capability();
        let gpu_usable = gpu_compute_capability.is_some_and(|cc| cc >= MIN_SUPPORTED_COMPUTE_CAPABILITY);
        let gpu_blocked = gpu_compute_capability.is_some() && !gpu_usable;

        const MINIMAL_FLOOR_BYTES: u64 = 2 * 1024 * 1024 * 1024;
        const STANDARD_FLOOR_BYTES: u64 = 8 * 1024 * 1024 * 1024;

        let tier = if gpu_usable && available_memory_bytes >= STANDARD_FLOOR_BYTES {
            CapabilityTier::Accelerated
        } else if available_memory_bytes >= MINIMAL_FLOOR_BYTES {
            CapabilityTier::Standard
        } else {
            CapabilityTier::Minimal
        };

        Ok(SystemCapabilities {
            cpu_cores,
            total_memory_bytes,
            available_memory_bytes,
            gpu_compute_capability,
            gpu_present: gpu_usable,
            gpu_blocked,
            tier,
        })
    }
}

/// Concurrency budget for heavy tasks at a given tier (`spec.md` §5): 1 on
/// low tier, a fixed small budget of 2 on mid tier (not cores-scaled — mid
/// tier is defined by modest memory, not necessarily modest core count),
/// and `cores/2` on high tier.
pub fn concurrency_budget(tier: CapabilityTier, cpu_cores: usize) -> usize {
    match tier {
        CapabilityTier::Minimal => 1,
        CapabilityTier::Standard => 2,
        CapabilityTier::Accelerated => (cpu_cores / 2).max(1),
    }
}

/// Recommendation published alongside the raw hardware snapshot
/// (`spec.md` §4.1: "Publish a recommendation: `max_workers`,
/// `batch_size_embeddings`, `use_gpu_for_embeddings`,
/// `enable_semantic_redundancy`, `max_concurrent_heavy_tasks`").
#[derive(Debug, Clone)]
pub struct CapabilityReport {
    pub capabilities: SystemCapabilities,
    pub max_workers: usize,
    pub batch_size_embeddings: usize,
    pub use_gpu_for_embeddings: bool,
    pub enable_semantic_redundancy: bool,
    pub max_concurrent_heavy_tasks: usize,
}

/// Derive the recommendation from a capability snapshot. `max_workers`
/// tracks CPU cores directly (distinct from the heavy-task semaphore
/// budget, which stays conservative even on many-core minimal-memory
/// boxes); semantic redundancy is only worth enabling once there's
/// standard-tier-or-better headroom to run it alongside everything else.
pub fn recommend(capabilities: SystemCapabilities) -> CapabilityReport {
    let max_concurrent_heavy_tasks = concurrency_budget(capabilities.tier, capabilities.cpu_cores);
    let max_workers = capabilities.cpu_cores.max(1);
    let use_gpu_for_embeddings = capabilities.gpu_present;
    let batch_size_embeddings = if use_gpu_for_embeddings { 64 } else { 8 };
    let enable_semantic_redundancy = capabilities.tier >= CapabilityTier::Standard;

    CapabilityReport {
        capabilities,
        max_workers,
        batch_size_embeddings,
        use_gpu_for_embeddings,
        enable_semantic_redundancy,
        max_concurrent_heavy_tasks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedGpu(f32);
    impl GpuProbe for FixedGpu {
        fn compute_capability(&self) -> Option<f32> {
            Some(self.0)
        }
    }

    #[test]
    fn minimal_tier_gets_single_slot_budget() {
        assert_eq!(concurrency_budget(CapabilityTier::Minimal, 16), 1);
    }

    #[test]
    fn standard_tier_gets_a_fixed_small_budget_regardless_of_cores() {
        assert_eq!(concurrency_budget(CapabilityTier::Standard, 64), 2);
    }

    #[test]
    fn accelerated_tier_scales_with_half_the_cores() {
        assert_eq!(concurrency_budget(CapabilityTier::Accelerated, 16), 8);
    }

    #[test]
    fn registry_detects_without_a_gpu() {
        let mut registry = SystemCapabilityRegistry::new().unwrap();
        let caps = registry.detect(&NoGpu).unwrap();
        assert!(!caps.gpu_present);
        assert!(!caps.gpu_blocked);
        assert!(caps.cpu_cores >= 1);
    }

    #[test]
    fn gpu_below_floor_is_reported_as_blocked_not_hidden() {
        let mut registry = SystemCapabilityRegistry::new().unwrap();
        let caps = registry.detect(&FixedGpu(MIN_SUPPORTED_COMPUTE_CAPABILITY - 1.0)).unwrap();
        assert!(!caps.gpu_present);
        assert!(caps.gpu_blocked);
        assert_eq!(caps.gpu_compute_capability, Some(MIN_SUPPORTED_COMPUTE_CAPABILITY - 1.0));
    }

    #[test]
    fn report_disables_semantic_redundancy_at_minimal_tier() {
        let caps = SystemCapabilities {
            cpu_cores: 4,
            total_memory_bytes: 1024 * 1024 * 1024,
            available_memory_bytes: 512 * 1024 * 1024,
            gpu_compute_capability: None,
            gpu_present: false,
            gpu_blocked: false,
            tier: CapabilityTier::Minimal,
        };
        let report = recommend(caps);
        assert!(!report.enable_semantic_redundancy);
        assert!(!report.use_gpu_for_embeddings);
    }
}
