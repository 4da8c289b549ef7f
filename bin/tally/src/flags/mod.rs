//! Flags of the `tally` binary.

mod tally;
pub use tally::TallyArgs;
