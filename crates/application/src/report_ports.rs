mod catalogs;
mod field_options;
mod templates;

pub use catalogs::ReportCatalogSource;
pub use field_options::{FieldOptionsSource, PayloadFragment, merge_fragments};
pub use templates::ReportTemplateRepository;
