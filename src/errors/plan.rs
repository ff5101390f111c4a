use crate::any::TypeInfo;

/// Injection-plan synthesis failure.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanErrorKind {
    #[error("No eligible constructor for {type_info}: the plan registers none")]
    NoConstructor { type_info: TypeInfo },
    #[error("{type_info} has more than one constructor registered: `{first}` and `{second}`")]
    DuplicateConstructor {
        type_info: TypeInfo,
        first: &'static str,
        second: &'static str,
    },
    #[error("No injection plan registered for {type_info}")]
    NoPlan { type_info: TypeInfo },
    #[error("Plan for {type_info} extends {parent}, which has no registered plan")]
    UnknownParent { type_info: TypeInfo, parent: TypeInfo },
    #[error("Plan inheritance cycle through {type_info}")]
    ParentCycle { type_info: TypeInfo },
}
