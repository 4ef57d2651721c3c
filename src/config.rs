use core::time::Duration;

use crate::identification::{KnownDevice, WINBOND_W25};

/// Readiness budgets, one per class of operation.
///
/// Defaults follow the W25Q80 worst-case AC characteristics with some headroom,
/// except chip erase, which covers the largest part in [`WINBOND_W25`]
/// (W25Q128, tCE 200 s max). Erase budgets are always larger than the program
/// budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Waiting for a previous cycle before issuing a new command.
    pub idle: Duration,
    /// Page program (tPP).
    pub program: Duration,
    /// 4 KiB sector erase (tSE).
    pub sector_erase: Duration,
    /// 32 KiB block erase (tBE1).
    pub block_erase_32k: Duration,
    /// 64 KiB block erase (tBE2).
    pub block_erase_64k: Duration,
    /// Full chip erase (tCE).
    pub chip_erase: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            idle: Duration::from_millis(5),
            program: Duration::from_millis(5),
            sector_erase: Duration::from_millis(450),
            block_erase_32k: Duration::from_millis(1_600),
            block_erase_64k: Duration::from_millis(2_000),
            chip_erase: Duration::from_secs(200),
        }
    }
}

impl Timeouts {
    pub fn with_program(mut self, budget: Duration) -> Self {
        self.program = budget;
        self
    }

    pub fn with_sector_erase(mut self, budget: Duration) -> Self {
        self.sector_erase = budget;
        self
    }

    pub fn with_chip_erase(mut self, budget: Duration) -> Self {
        self.chip_erase = budget;
        self
    }
}

/// Construction-time driver configuration.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Let reads and writes that run past the end of a page continue into the
    /// next one (wrapping to page 0 at the end of the device). When false such
    /// requests are rejected before any byte is transferred.
    pub page_overflow: bool,
    /// Identity codes this driver accepts, with their capacities.
    pub identities: &'static [KnownDevice],
    /// Delay between two consecutive status polls.
    pub poll_interval: Duration,
    pub timeouts: Timeouts,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            page_overflow: true,
            identities: WINBOND_W25,
            poll_interval: Duration::from_micros(10),
            timeouts: Timeouts::default(),
        }
    }
}

impl Config {
    pub fn with_page_overflow(mut self, allow: bool) -> Self {
        self.page_overflow = allow;
        self
    }

    pub fn with_identities(mut self, identities: &'static [KnownDevice]) -> Self {
        self.identities = identities;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Config {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "Config {{ page_overflow: {}, identities: {}, poll_interval_us: {=u64} }}",
            self.page_overflow,
            self.identities.len(),
            self.poll_interval.as_micros() as u64
        )
    }
}
