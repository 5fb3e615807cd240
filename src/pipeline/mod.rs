pub mod dedup;
pub mod enrich;
pub mod importer;
pub mod mapper;
pub mod reader;
pub mod report;
pub mod template;
pub mod validator;
