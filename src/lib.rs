pub mod dataset;
pub mod error;
pub mod learner;
pub mod partition;
pub mod pipeline;
pub mod planner;
pub mod reinject;
pub mod rules;
pub mod scorer;
pub mod violations;
