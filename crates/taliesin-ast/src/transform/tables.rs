//! Result shaping: projections and argmax/argmin.

use crate::filter::FilterOp;
use crate::table::{SortDirection, Table};

/// Restrict a table to a single named output argument.
///
/// Projecting an already-projected table replaces the projection rather than
/// nesting one inside the other.
pub fn make_projection(table: &Table, arg: &str) -> Option<Table> {
    let base = match table {
        Table::Projection { inner, .. } => inner.as_ref(),
        other => other,
    };
    let base_schema = base.schema();
    base_schema.out_arg(arg)?;

    let mut schema = base_schema.clone();
    schema
        .args
        .retain(|a| a.is_in() || a.name == arg);
    Some(Table::Projection {
        inner: Box::new(base.clone()),
        args: vec![arg.to_string()],
        schema,
    })
}

/// Wrap a table in sort-plus-first-index, selecting the extreme result.
///
/// Rejected when the table returns a single result, the argument is not a
/// comparable output, the table is already sorted or index-limited, the
/// result set is pinned to one entity, or an equality filter already fixes
/// the sort argument.
pub fn make_arg_max_min_table(
    table: &Table,
    arg: &str,
    direction: SortDirection,
) -> Option<Table> {
    let schema = table.schema();
    if !schema.is_list {
        return None;
    }
    let sort_arg = schema.out_arg(arg)?;
    if !sort_arg.ty.is_comparable() {
        return None;
    }
    if table.is_index_limited() {
        return None;
    }
    if schema.no_filter || has_unique_filter(table) {
        return None;
    }
    let pinned_by_filter = table
        .collected_filter()
        .atoms()
        .iter()
        .any(|(name, op, _)| *name == arg && op.is_equality());
    if pinned_by_filter {
        return None;
    }

    Some(Table::Index {
        inner: Box::new(Table::Sorted {
            inner: Box::new(table.clone()),
            arg: arg.to_string(),
            direction,
        }),
        index: 1,
    })
}

/// Whether any filter in the tree pins a unique argument with an equality.
fn has_unique_filter(table: &Table) -> bool {
    match table {
        Table::Filtered { inner, filter, .. } => {
            filter.atoms().iter().any(|(name, op, _)| {
                *op == FilterOp::Eq && inner.schema().arg(name).is_some_and(|a| a.unique)
            }) || has_unique_filter(inner)
        }
        Table::Invocation(_) => false,
        Table::Projection { inner, .. }
        | Table::Sorted { inner, .. }
        | Table::Index { inner, .. } => has_unique_filter(inner),
        Table::Join { lhs, rhs, .. } => has_unique_filter(lhs) || has_unique_filter(rhs),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterExpr;
    use crate::schema::{ArgDef, Schema};
    use crate::table::{FunctionId, Invocation};
    use crate::transform::add_filter;
    use crate::value::{ParamType, Value};

    fn restaurant_table() -> Table {
        let schema = Schema::list(vec![
            ArgDef::out("id", ParamType::entity("com.yelp:restaurant")).with_unique(),
            ArgDef::out("food", ParamType::String),
            ArgDef::out("rating", ParamType::Number),
            ArgDef::input("limit", ParamType::Number, false),
        ]);
        Table::invocation(Invocation::new(
            FunctionId::new("com.yelp", "restaurant"),
            schema,
        ))
    }

    #[test]
    fn test_projection_narrows_schema() {
        let table = restaurant_table();
        let projected = make_projection(&table, "food").unwrap();

        let schema = projected.schema();
        assert!(schema.has_arg("food"));
        assert!(!schema.has_arg("rating"));
        // Input arguments survive projection.
        assert!(schema.has_arg("limit"));
    }

    #[test]
    fn test_projection_replaces_projection() {
        let table = restaurant_table();
        let first = make_projection(&table, "food").unwrap();
        let second = make_projection(&first, "rating").unwrap();

        match &second {
            Table::Projection { inner, args, .. } => {
                assert_eq!(args, &vec!["rating".to_string()]);
                assert!(matches!(**inner, Table::Invocation(_)));
            }
            other => panic!("expected Projection, got {other:?}"),
        }
    }

    #[test]
    fn test_projection_rejects_unknown_and_input_args() {
        let table = restaurant_table();
        assert_eq!(make_projection(&table, "vibe"), None);
        assert_eq!(make_projection(&table, "limit"), None);
    }

    #[test]
    fn test_arg_max_min_shape() {
        let table = restaurant_table();
        let best = make_arg_max_min_table(&table, "rating", SortDirection::Desc).unwrap();
        match &best {
            Table::Index { inner, index } => {
                assert_eq!(*index, 1);
                assert!(matches!(**inner, Table::Sorted { .. }));
            }
            other => panic!("expected Index, got {other:?}"),
        }
        assert!(best.is_index_limited());
    }

    #[test]
    fn test_arg_max_min_rejects_non_list() {
        let single = Table::invocation(Invocation::new(
            FunctionId::new("org.weather", "current"),
            Schema::single(vec![ArgDef::out("temperature", ParamType::measure("C"))]),
        ));
        assert_eq!(
            make_arg_max_min_table(&single, "temperature", SortDirection::Desc),
            None
        );
    }

    #[test]
    fn test_arg_max_min_rejects_double_limit() {
        let table = restaurant_table();
        let best = make_arg_max_min_table(&table, "rating", SortDirection::Desc).unwrap();
        assert_eq!(
            make_arg_max_min_table(&best, "rating", SortDirection::Asc),
            None
        );
    }

    #[test]
    fn test_arg_max_min_rejects_pinned_table() {
        let table = restaurant_table();
        let by_id = FilterExpr::atom(
            "id",
            FilterOp::Eq,
            Value::entity("R2", "com.yelp:restaurant"),
        );
        let pinned = add_filter(&table, by_id).unwrap();
        assert_eq!(
            make_arg_max_min_table(&pinned, "rating", SortDirection::Desc),
            None
        );
    }

    #[test]
    fn test_arg_max_min_rejects_equality_on_sort_arg() {
        let table = restaurant_table();
        let fixed = add_filter(
            &table,
            FilterExpr::atom("rating", FilterOp::Eq, Value::Number(5.0)),
        )
        .unwrap();
        assert_eq!(
            make_arg_max_min_table(&fixed, "rating", SortDirection::Desc),
            None
        );

        // An inequality on the sort argument still allows argmax.
        let bounded = add_filter(
            &table,
            FilterExpr::atom("rating", FilterOp::Ge, Value::Number(3.0)),
        )
        .unwrap();
        assert!(make_arg_max_min_table(&bounded, "rating", SortDirection::Desc).is_some());
    }

    #[test]
    fn test_arg_max_min_rejects_non_comparable() {
        let table = restaurant_table();
        assert_eq!(make_arg_max_min_table(&table, "id", SortDirection::Desc), None);
    }
}
