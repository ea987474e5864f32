// ccheck — C Check
//
// Library root. Analyzers first, then the stages that drive them.

pub mod column;
pub mod config;
pub mod contract;
pub mod diag;
pub mod memcheck;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod report;
pub mod signature;
