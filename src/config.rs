/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of consecutive ticks of one pump, without any tick of the other, after which a
    /// record owned by the silent pump is reported as stalled.
    pub stall_threshold: u32,
    /// Registry capacity reserved up front.
    pub initial_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            stall_threshold: 120,
            initial_capacity: 32,
        }
    }
}
