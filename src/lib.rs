pub mod application;
pub mod commands;
pub mod console;
pub mod feed;
pub mod nugetify;
pub mod package;
pub mod project;
pub mod resolve;
pub mod runtime;
pub mod xml;
