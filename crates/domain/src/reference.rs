/// A deleted data source or parameter whose references must be pruned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceRemoval {
    /// Deleted data source; matches the name itself and every path below it.
    Entity(String),
    /// Deleted parameter; matches the parameter name exactly.
    Parameter(String),
}

impl ReferenceRemoval {
    /// Returns whether a field path references the removed item.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Entity(entity) => {
                path == entity
                    || path
                        .strip_prefix(entity.as_str())
                        .is_some_and(|rest| rest.starts_with('.'))
            }
            Self::Parameter(parameter) => path == parameter,
        }
    }
}
