//! Personal tracking log. Log types describe what is tracked and how often, values are
//! recorded against them and rolling statistics are kept next to each definition.
//! A small daemon reminds once a day about log types still waiting for a value.

pub mod cli;
pub mod fs;
pub mod logs;
pub mod reminder;
pub mod settings;
pub mod storage;
pub mod utils;
