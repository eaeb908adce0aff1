pub mod message;
pub mod topic;
