use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::wait::{Interrupt, MAX_INTERRUPT};

/// Tunables for [`ProcessLauncher`](crate::ProcessLauncher).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LauncherConfig {
    /// How long `launch` waits for the spawn to be confirmed.
    #[serde(default = "default_spawn_grace_ms")]
    pub spawn_grace_ms: u64,
    /// Bounded join after the process was killed during cleanup.
    #[serde(default = "default_destroy_wait_ms")]
    pub destroy_wait_ms: u64,
    /// Interrupt budget of every wait the launcher performs.
    #[serde(default = "default_max_interrupts")]
    pub max_interrupts: u32,
}

fn default_spawn_grace_ms() -> u64 {
    1000
}

fn default_destroy_wait_ms() -> u64 {
    5000
}

fn default_max_interrupts() -> u32 {
    MAX_INTERRUPT
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            spawn_grace_ms: default_spawn_grace_ms(),
            destroy_wait_ms: default_destroy_wait_ms(),
            max_interrupts: default_max_interrupts(),
        }
    }
}

impl LauncherConfig {
    pub fn spawn_grace(&self) -> Duration {
        Duration::from_millis(self.spawn_grace_ms)
    }

    pub fn destroy_wait(&self) -> Duration {
        Duration::from_millis(self.destroy_wait_ms)
    }

    /// A fresh interrupt handle carrying this configuration's budget.
    pub fn interrupt(&self) -> Interrupt {
        Interrupt::with_budget(self.max_interrupts)
    }
}
