pub mod cli;
pub mod demo;
pub mod labels;
pub mod logging;
pub mod report;
pub mod suggestions;
