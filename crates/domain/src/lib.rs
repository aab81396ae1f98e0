//! Report definition model: field metadata, operator schemas and the UI and
//! backend shapes of every report setting.

#![forbid(unsafe_code)]

mod aggregate;
mod entity;
mod field;
mod filter;
mod operator;
mod parameter;
mod reference;
mod sort;
mod template;

pub use aggregate::{AggregateDefinition, AggregateFunction};
pub use entity::{EntityColumn, EntityDefinition, EntityRef, JoinType};
pub use field::{FieldClass, FieldItem, FieldMetadata, FieldOption, FieldOptions, TypeSignature};
pub use filter::{
    FilterCondition, FilterGroup, FilterNode, FilterRule, LogicalOperator, RightValueType,
    RuleOperands, prune_filter_definitions,
};
pub use operator::{
    OperandSide, OperatorKeyTable, OperatorKeys, OperatorSchema, SchemaVariant,
    synthesize_left_key, synthesize_right_key,
};
pub use parameter::{
    EnumeratedValue, ParameterDeclaration, ParameterDefinition, ParameterSource,
    ParameterTypeDecl,
};
pub use reference::ReferenceRemoval;
pub use sort::{SortClause, SortDefinition, SortDirection};
pub use template::ReportTemplate;
