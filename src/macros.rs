macro_rules! all_the_tuples {
    ($name:ident) => {
        $name!([]);
        $name!([T1]);
        $name!([T1, T2]);
        $name!([T1, T2, T3]);
        $name!([T1, T2, T3, T4]);
        $name!([T1, T2, T3, T4, T5]);
        $name!([T1, T2, T3, T4, T5, T6]);
        $name!([T1, T2, T3, T4, T5, T6, T7]);
        $name!([T1, T2, T3, T4, T5, T6, T7, T8]);
        $name!([T1, T2, T3, T4, T5, T6, T7, T8, T9]);
        $name!([T1, T2, T3, T4, T5, T6, T7, T8, T9, T10]);
        $name!([T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11]);
        $name!([T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12]);
    };
}

/// Creates an `Arc<dyn Trait>` from a value, optionally including supertraits.
///
/// # Syntax
/// ```text
/// shared!(value; Trait [+ SuperTrait1 [+ SuperTrait2 ...]])
/// ```
///
/// # Examples
/// ```rust
/// use rivet::shared;
/// use std::sync::Arc;
///
/// trait UserRepo {}
///
/// struct PostgresUserRepo;
///
/// impl UserRepo for PostgresUserRepo {}
///
/// let repo: Arc<dyn UserRepo + Send + Sync> = shared!(PostgresUserRepo; UserRepo + Send + Sync);
/// ```
#[macro_export]
macro_rules! shared {
    ($val:expr ; $tr:tt $($super_traits:tt)*) => {{
        ::std::sync::Arc::new($val) as ::std::sync::Arc<dyn $tr $($super_traits)*>
    }};
}
