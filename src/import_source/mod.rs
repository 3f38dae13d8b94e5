//! Import sources, the reusable CSV formats that bank statements are parsed with.

mod config;
mod db;
mod endpoints;

pub use config::{FieldMapping, ImportSourceConfig, TargetField};
pub use db::{
    ImportSource, ImportSourceForm, ImportSourceId, create_import_source,
    create_import_source_table, delete_import_source, get_import_source, get_import_sources,
    update_import_source,
};
pub use endpoints::{
    create_import_source_endpoint, delete_import_source_endpoint, get_import_source_endpoint,
    get_import_sources_endpoint, update_import_source_endpoint,
};
