//! Core emulator primitives and traits.

pub mod cpu_6502;
pub mod logging;
pub mod memory;
pub mod opcodes_6502;

use serde_json::Value;

pub use cpu_6502::StopReason;

/// Description of a mount point (media slot) that a system supports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPointInfo {
    /// Unique identifier for this mount point (e.g., "RomF8", "Disk1")
    pub id: String,
    /// User-friendly name for display (e.g., "Monitor ROM", "Disk drive 1")
    pub name: String,
    /// File extensions accepted by this mount point (e.g., ["do", "po"])
    pub extensions: Vec<String>,
    /// Whether this mount point is required for the system to function
    pub required: bool,
}

/// A high-level System trait tying components together.
///
/// A frontend drives the machine exclusively through this surface: mount
/// media, reset, run a frame's worth of cycles at a time, and snapshot
/// state for inspection.
pub trait System {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Warm reset (the reset line on the real machine).
    fn reset(&mut self);

    /// Power-cycle: registers zeroed, RAM cleared, then a warm reset.
    fn cold_reset(&mut self);

    /// Emulate one frame's worth of cycles and report why the batch
    /// stopped (budget exhausted, breakpoint, cancellation).
    fn step_frame(&mut self) -> Result<StopReason, Self::Error>;

    /// Return a JSON-serializable save state for debugging.
    /// Note: Save states should NOT include ROM/media data.
    fn save_state(&self) -> Value;

    /// Load a JSON save state.
    fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error>;

    /// Check if this system supports save/load state functionality
    fn supports_save_states(&self) -> bool {
        false // Default: no save state support
    }

    /// Get the list of mount points this system supports
    fn mount_points(&self) -> Vec<MountPointInfo>;

    /// Load media into a specific mount point
    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error>;

    /// Unload media from a specific mount point
    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error>;

    /// Check if a mount point has media loaded
    fn is_mounted(&self, mount_point_id: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockSystem {
        mounted: bool,
    }

    impl System for MockSystem {
        type Error = std::convert::Infallible;

        fn reset(&mut self) {}

        fn cold_reset(&mut self) {}

        fn step_frame(&mut self) -> Result<StopReason, Self::Error> {
            Ok(StopReason::BudgetExhausted)
        }

        fn save_state(&self) -> serde_json::Value {
            serde_json::json!({"mock": true, "version": 1})
        }

        fn load_state(&mut self, _v: &serde_json::Value) -> Result<(), serde_json::Error> {
            Ok(())
        }

        fn mount_points(&self) -> Vec<MountPointInfo> {
            vec![MountPointInfo {
                id: "test".to_string(),
                name: "Test Slot".to_string(),
                extensions: vec!["bin".to_string()],
                required: false,
            }]
        }

        fn mount(&mut self, _mount_point_id: &str, _data: &[u8]) -> Result<(), Self::Error> {
            self.mounted = true;
            Ok(())
        }

        fn unmount(&mut self, _mount_point_id: &str) -> Result<(), Self::Error> {
            self.mounted = false;
            Ok(())
        }

        fn is_mounted(&self, _mount_point_id: &str) -> bool {
            self.mounted
        }
    }

    #[test]
    fn mock_system_save_state_round_trips_as_json() {
        let sys = MockSystem { mounted: false };
        let v = sys.save_state();
        let s = serde_json::to_string(&v).expect("serialize");
        let v2: serde_json::Value = serde_json::from_str(&s).expect("deserialize");
        let mut sys2 = MockSystem { mounted: false };
        assert!(sys2.load_state(&v2).is_ok());
    }

    #[test]
    fn mock_system_mount_operations() {
        let mut sys = MockSystem { mounted: false };
        assert!(!sys.is_mounted("test"));
        assert!(sys.mount("test", &[1, 2, 3]).is_ok());
        assert!(sys.is_mounted("test"));
        assert!(sys.unmount("test").is_ok());
        assert!(!sys.is_mounted("test"));
    }

    #[test]
    fn mount_point_info_carries_extensions() {
        let sys = MockSystem { mounted: false };
        let mount_points = sys.mount_points();
        assert_eq!(mount_points.len(), 1);
        assert_eq!(mount_points[0].extensions, vec!["bin".to_string()]);
        assert!(!sys.supports_save_states());
    }
}
