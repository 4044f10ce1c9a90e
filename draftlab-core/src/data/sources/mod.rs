//! Concrete ranking providers.

pub mod csv_sheet;
pub mod espn_editorial;
pub mod sleeper_adp;

pub use csv_sheet::CsvSheetProvider;
pub use espn_editorial::{EspnEditorialProvider, ESPN_EDITORIAL_ID};
pub use sleeper_adp::{SleeperAdpProvider, SLEEPER_ADP_ID};
