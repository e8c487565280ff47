use crate::config::PayloadConfig;

/// Payload size schedule: iteration `i` (1-indexed) carries
/// `initial_size * growth_factor^(i-1)` filler characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadRamp {
    initial_size: usize,
    growth_factor: usize,
    iterations: u32,
}

impl PayloadRamp {
    pub fn new(config: &PayloadConfig) -> Self {
        Self {
            initial_size: config.initial_size,
            growth_factor: config.growth_factor,
            iterations: config.iterations,
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Payload size for a 1-indexed iteration, `None` when out of range or on overflow.
    pub fn size_for(&self, iteration: u32) -> Option<usize> {
        if iteration == 0 || iteration > self.iterations {
            return None;
        }
        self.growth_factor
            .checked_pow(iteration - 1)
            .and_then(|scale| self.initial_size.checked_mul(scale))
    }

    /// Iterate `(iteration, payload_size)` strictly in order, stopping at the first overflow.
    pub fn sizes(&self) -> impl Iterator<Item = (u32, usize)> + '_ {
        (1..=self.iterations).map_while(|i| self.size_for(i).map(|size| (i, size)))
    }

    /// Size of the final iteration; `None` if the schedule overflows.
    pub fn largest(&self) -> Option<usize> {
        self.size_for(self.iterations)
    }
}
