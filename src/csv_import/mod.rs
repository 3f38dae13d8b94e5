//! Importing transactions from bank statement CSV files.
//!
//! A CSV file is parsed with the field mappings of an import source into a
//! draft import. The draft's candidate transactions can be reviewed and
//! categorised over several sessions before the import is completed, which
//! creates every transaction at once.

mod csv;
mod date_format;
mod endpoints;
mod session;

pub use endpoints::{
    complete_import_endpoint, delete_import_endpoint, get_import_endpoint, get_imports_endpoint,
    save_draft_endpoint, start_import_endpoint,
};
pub use session::{
    CategoryMap, Import, ImportId, ImportPreview, ImportStatus, complete_import,
    create_import_table, delete_import, get_import, get_imports, save_draft, start_import,
};
