//! Filter construction and composition.

use crate::filter::{FilterExpr, FilterOp};
use crate::schema::Schema;
use crate::table::Table;
use crate::value::{ParamType, Value};

use super::TransformConfig;

/// Build a single well-typed filter atom against a schema.
///
/// Returns `None` when the argument is blacklisted, is not an output of the
/// schema, or the value does not type-check under the operator.
pub fn make_filter(
    config: &TransformConfig,
    schema: &Schema,
    name: &str,
    op: FilterOp,
    value: &Value,
) -> Option<FilterExpr> {
    if config.filter_blacklist.contains(name) {
        return None;
    }
    let arg = schema.out_arg(name)?;
    if !filter_value_ok(schema, &arg.ty, op, value) {
        return None;
    }
    Some(FilterExpr::atom(name, op, value.clone()))
}

/// Conjunction of two filters on the same argument.
///
/// Exactly two distinct values are required; a repeated value (including the
/// same variable reference twice) is rejected as vacuous.
pub fn make_and_filter(
    config: &TransformConfig,
    schema: &Schema,
    name: &str,
    op: FilterOp,
    values: &[Value],
) -> Option<FilterExpr> {
    let (first, second) = two_distinct(values)?;
    let lhs = make_filter(config, schema, name, op, first)?;
    let rhs = make_filter(config, schema, name, op, second)?;
    Some(FilterExpr::And(vec![lhs, rhs]))
}

/// Disjunction of two filters on the same argument.
pub fn make_or_filter(
    config: &TransformConfig,
    schema: &Schema,
    name: &str,
    op: FilterOp,
    values: &[Value],
) -> Option<FilterExpr> {
    let (first, second) = two_distinct(values)?;
    let lhs = make_filter(config, schema, name, op, first)?;
    let rhs = make_filter(config, schema, name, op, second)?;
    Some(FilterExpr::Or(vec![lhs, rhs]))
}

/// "X but not Y": the first filter conjoined with the negated second.
pub fn make_but_filter(
    config: &TransformConfig,
    schema: &Schema,
    name: &str,
    op: FilterOp,
    values: &[Value],
) -> Option<FilterExpr> {
    let (first, second) = two_distinct(values)?;
    let keep = make_filter(config, schema, name, op, first)?;
    let drop = make_filter(config, schema, name, op, second)?;
    Some(FilterExpr::And(vec![keep, FilterExpr::not(drop)]))
}

fn two_distinct(values: &[Value]) -> Option<(&Value, &Value)> {
    match values {
        [a, b] if a != b => Some((a, b)),
        _ => None,
    }
}

/// Whether every atom in the filter is well-typed against the table's
/// visible outputs.
pub fn check_filter(table: &Table, filter: &FilterExpr) -> bool {
    let schema = table.schema();
    filter.atoms().iter().all(|(name, op, value)| {
        schema
            .out_arg(name)
            .is_some_and(|arg| filter_value_ok(schema, &arg.ty, *op, value))
    })
}

/// Conjoin a filter onto a table.
///
/// Returns `None` when the table refuses further filters, the filter does not
/// type-check, or an atom is redundant against a filter already present on
/// the same argument. Two inequalities bracketing a range (`>=` with `<=`)
/// are the one permitted overlap. An equality on a unique argument pins the
/// result set to at most one entity, so the new schema refuses further
/// filters.
pub fn add_filter(table: &Table, filter: FilterExpr) -> Option<Table> {
    let schema = table.schema();
    if schema.no_filter {
        return None;
    }
    if !check_filter(table, &filter) {
        return None;
    }

    let existing = table.collected_filter();
    for (name, new_op, _) in filter.atoms() {
        for (old_name, old_op, _) in existing.atoms() {
            if old_name == name && !ops_compose(old_op, new_op) {
                return None;
            }
        }
    }

    let pins_unique = filter.atoms().iter().any(|(name, op, _)| {
        *op == FilterOp::Eq && schema.arg(name).is_some_and(|a| a.unique)
    });
    let new_schema = if pins_unique {
        schema.with_no_filter()
    } else {
        schema.clone()
    };

    // Merge into an existing filter node rather than stacking a second one.
    Some(match table {
        Table::Filtered { inner, filter: old, .. } => Table::Filtered {
            inner: inner.clone(),
            filter: FilterExpr::and(vec![old.clone(), filter]).optimize(),
            schema: new_schema,
        },
        other => Table::Filtered {
            inner: Box::new(other.clone()),
            filter,
            schema: new_schema,
        },
    })
}

/// Whether a second filter on the same argument adds information.
///
/// Same operator twice never does, and an equality on either side leaves
/// nothing to refine. Opposite inequalities bracket a range.
fn ops_compose(old: FilterOp, new: FilterOp) -> bool {
    old != new && !old.is_equality() && !new.is_equality()
}

fn filter_value_ok(schema: &Schema, arg_ty: &ParamType, op: FilterOp, value: &Value) -> bool {
    let Some(value_ty) = resolve_value_ty(schema, value) else {
        return false;
    };
    match op {
        FilterOp::Eq => {
            !matches!(arg_ty, ParamType::Array(_)) && value_ty.assignable_to(arg_ty)
        }
        FilterOp::Ge | FilterOp::Le => {
            arg_ty.is_comparable() && value_ty.assignable_to(arg_ty)
        }
        FilterOp::Contains => match arg_ty.elem() {
            Some(elem) => value_ty.assignable_to(elem),
            None => false,
        },
        FilterOp::InArray => match value_ty.elem() {
            Some(elem) => elem.assignable_to(arg_ty),
            None => false,
        },
        FilterOp::Substr => {
            matches!(arg_ty, ParamType::String) && value_ty.assignable_to(&ParamType::String)
        }
    }
}

/// The type a filter operand contributes. A variable reference takes the
/// type of the output argument it names; an unfilled slot has none.
fn resolve_value_ty(schema: &Schema, value: &Value) -> Option<ParamType> {
    match value {
        Value::VarRef(name) => schema.out_arg(name).map(|a| a.ty.clone()),
        Value::Undefined => None,
        concrete => concrete.ty(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ArgDef;
    use crate::table::{FunctionId, Invocation};

    fn config() -> TransformConfig {
        TransformConfig::default()
    }

    fn restaurant_schema() -> Schema {
        Schema::list(vec![
            ArgDef::out("id", ParamType::entity("com.yelp:restaurant")).with_unique(),
            ArgDef::out("food", ParamType::String),
            ArgDef::out("rating", ParamType::Number),
            ArgDef::out("avg_rating", ParamType::Number),
            ArgDef::out(
                "cuisines",
                ParamType::array(ParamType::Enum(vec![
                    "thai".to_string(),
                    "sushi".to_string(),
                ])),
            ),
            ArgDef::input("limit", ParamType::Number, false),
        ])
    }

    fn restaurant_table() -> Table {
        Table::invocation(Invocation::new(
            FunctionId::new("com.yelp", "restaurant"),
            restaurant_schema(),
        ))
    }

    #[test]
    fn test_make_filter_happy_path() {
        let filter = make_filter(
            &config(),
            &restaurant_schema(),
            "food",
            FilterOp::Eq,
            &Value::string("thai"),
        );
        assert_eq!(
            filter,
            Some(FilterExpr::atom("food", FilterOp::Eq, Value::string("thai")))
        );
    }

    #[test]
    fn test_make_filter_rejects_blacklisted_arg() {
        let result = make_filter(
            &config(),
            &restaurant_schema(),
            "id",
            FilterOp::Eq,
            &Value::entity("R2", "com.yelp:restaurant"),
        );
        assert_eq!(result, None);

        let open = make_filter(
            &TransformConfig::unrestricted(),
            &restaurant_schema(),
            "id",
            FilterOp::Eq,
            &Value::entity("R2", "com.yelp:restaurant"),
        );
        assert!(open.is_some());
    }

    #[test]
    fn test_make_filter_rejects_input_and_unknown_args() {
        let schema = restaurant_schema();
        assert_eq!(
            make_filter(&config(), &schema, "limit", FilterOp::Eq, &Value::Number(3.0)),
            None
        );
        assert_eq!(
            make_filter(&config(), &schema, "vibe", FilterOp::Eq, &Value::string("x")),
            None
        );
    }

    #[test]
    fn test_make_filter_type_checks_operator() {
        let schema = restaurant_schema();
        // Comparison needs a comparable argument and a matching value.
        assert!(
            make_filter(&config(), &schema, "rating", FilterOp::Ge, &Value::Number(4.0)).is_some()
        );
        assert_eq!(
            make_filter(&config(), &schema, "rating", FilterOp::Ge, &Value::string("4")),
            None
        );
        // Contains needs an array argument with a matching element type.
        assert!(
            make_filter(
                &config(),
                &schema,
                "cuisines",
                FilterOp::Contains,
                &Value::Enum("thai".to_string())
            )
            .is_some()
        );
        assert_eq!(
            make_filter(&config(), &schema, "food", FilterOp::Contains, &Value::string("x")),
            None
        );
        // An unfilled slot never filters.
        assert_eq!(
            make_filter(&config(), &schema, "food", FilterOp::Eq, &Value::Undefined),
            None
        );
    }

    #[test]
    fn test_make_filter_resolves_var_refs() {
        let schema = restaurant_schema();
        let cross = make_filter(
            &config(),
            &schema,
            "rating",
            FilterOp::Ge,
            &Value::var_ref("avg_rating"),
        );
        assert!(cross.is_some());

        let dangling = make_filter(
            &config(),
            &schema,
            "rating",
            FilterOp::Ge,
            &Value::var_ref("nonexistent"),
        );
        assert_eq!(dangling, None);
    }

    #[test]
    fn test_and_filter_rejects_repeated_value() {
        let schema = restaurant_schema();
        let same = vec![Value::var_ref("avg_rating"), Value::var_ref("avg_rating")];
        assert_eq!(
            make_and_filter(&config(), &schema, "rating", FilterOp::Ge, &same),
            None
        );

        let distinct = vec![Value::string("thai"), Value::string("sushi")];
        assert!(make_or_filter(&config(), &schema, "food", FilterOp::Eq, &distinct).is_some());
    }

    #[test]
    fn test_but_filter_shape() {
        let schema = restaurant_schema();
        let values = vec![Value::string("thai"), Value::string("sushi")];
        let filter = make_but_filter(&config(), &schema, "food", FilterOp::Eq, &values).unwrap();
        match filter {
            FilterExpr::And(operands) => {
                assert_eq!(operands.len(), 2);
                assert!(matches!(operands[1], FilterExpr::Not(_)));
            }
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn test_add_filter_conjoins() {
        let table = restaurant_table();
        let thai = FilterExpr::atom("food", FilterOp::Eq, Value::string("thai"));
        let rated = FilterExpr::atom("rating", FilterOp::Ge, Value::Number(4.0));

        let once = add_filter(&table, thai).unwrap();
        let twice = add_filter(&once, rated).unwrap();
        assert_eq!(twice.collected_filter().atoms().len(), 2);
        // Merged into one node, not stacked.
        assert!(matches!(
            twice,
            Table::Filtered { ref inner, .. } if matches!(**inner, Table::Invocation(_))
        ));
    }

    #[test]
    fn test_add_filter_rejects_redundant_atom() {
        let table = restaurant_table();
        let thai = FilterExpr::atom("food", FilterOp::Eq, Value::string("thai"));
        let filtered = add_filter(&table, thai).unwrap();

        // Any second filter on an equality-pinned argument is redundant.
        let sushi = FilterExpr::atom("food", FilterOp::Eq, Value::string("sushi"));
        assert_eq!(add_filter(&filtered, sushi), None);

        // Same inequality twice is redundant too.
        let ge = FilterExpr::atom("rating", FilterOp::Ge, Value::Number(4.0));
        let once = add_filter(&table, ge).unwrap();
        let ge_again = FilterExpr::atom("rating", FilterOp::Ge, Value::Number(4.5));
        assert_eq!(add_filter(&once, ge_again), None);
    }

    #[test]
    fn test_add_filter_allows_range_bracket() {
        let table = restaurant_table();
        let ge = FilterExpr::atom("rating", FilterOp::Ge, Value::Number(3.0));
        let le = FilterExpr::atom("rating", FilterOp::Le, Value::Number(4.5));
        let bracketed = add_filter(&add_filter(&table, ge).unwrap(), le);
        assert!(bracketed.is_some());
    }

    #[test]
    fn test_add_filter_on_unique_arg_seals_table() {
        let table = restaurant_table();
        let by_id = FilterExpr::atom(
            "id",
            FilterOp::Eq,
            Value::entity("R2", "com.yelp:restaurant"),
        );
        let pinned = add_filter(&table, by_id).unwrap();
        assert!(pinned.schema().no_filter);

        let more = FilterExpr::atom("food", FilterOp::Eq, Value::string("thai"));
        assert_eq!(add_filter(&pinned, more), None);
        // The original table is untouched.
        assert!(!table.schema().no_filter);
    }

    #[test]
    fn test_check_filter_rejects_foreign_args() {
        let table = restaurant_table();
        let foreign = FilterExpr::atom("temperature", FilterOp::Ge, Value::Number(20.0));
        assert!(!check_filter(&table, &foreign));
        assert_eq!(add_filter(&table, foreign), None);
    }
}
