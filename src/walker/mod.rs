mod walker;

pub use walker::{WalkOutcome, Walker};
