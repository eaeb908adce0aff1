pub mod topic_store;
pub mod types;
