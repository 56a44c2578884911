pub mod decision;
pub mod perception;

pub use decision::DecisionEngine;
pub use perception::PerceptionAdapter;
