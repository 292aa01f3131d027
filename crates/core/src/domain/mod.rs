pub mod ids;
pub mod message;
pub mod query;
pub mod run;
