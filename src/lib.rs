//! Structure job postings and grow a skills taxonomy with a text-completion service.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
