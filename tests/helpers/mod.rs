#![allow(dead_code)]
pub mod fake_proc;
pub mod mock_sink;

use procload::counters::PlatformConstants;

/// Clock and page size used by every fake `/proc` tree.
pub const TEST_PLATFORM: PlatformConstants = PlatformConstants {
    clock_ticks_per_second: 100,
    page_size: 4096,
};
