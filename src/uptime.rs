/// Source of the millisecond uptime the simulation runs on.
pub trait Uptime {
    fn uptime_millis(&self) -> u64;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemUptime {
    start: std::time::Instant,
}

impl SystemUptime {
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }
}

impl Default for SystemUptime {
    fn default() -> Self {
        Self::new()
    }
}

impl Uptime for SystemUptime {
    fn uptime_millis(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}
