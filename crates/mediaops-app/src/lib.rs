pub mod brightcove;
pub mod caas;
pub mod cli;
pub mod compare;
pub mod config;
pub mod constants;
pub mod error;
pub mod files;
pub mod http;
pub mod ledger;
pub mod paths;
pub mod report;
pub mod sheets;
pub mod vimeo;
pub mod youtube;
