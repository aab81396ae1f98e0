use async_trait::async_trait;
use reportdef_core::AppResult;
use reportdef_domain::FieldOptions;
use serde_json::{Map, Value};

/// Backend-shaped fragment of a report query, e.g. `{"sort": [...]}`.
pub type PayloadFragment = Map<String, Value>;

/// Port for the field options resource.
#[async_trait]
pub trait FieldOptionsSource: Send + Sync {
    /// Returns field metadata for a partial report query.
    async fn field_options(&self, query: &PayloadFragment) -> AppResult<FieldOptions>;
}

/// Shallow-merges fragments in order; later keys replace earlier ones.
#[must_use]
pub fn merge_fragments<'a>(fragments: impl IntoIterator<Item = &'a PayloadFragment>) -> PayloadFragment {
    let mut merged = PayloadFragment::new();
    for fragment in fragments {
        for (key, value) in fragment {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}
