//! Parameter passing: joins, query-into-action, and when-do rules.

use crate::schema::merge_schemas;
use crate::stream::{Action, Statement, Stream};
use crate::table::{InParam, Invocation, Table};
use crate::value::{ParamType, Value};

/// Substitute a value for an input parameter of an invocation.
///
/// The parameter must be an input of the schema and must not already carry a
/// concrete binding. Concrete values are type-checked; variable references
/// are the caller's responsibility.
pub fn beta_reduce_invocation(
    inv: &Invocation,
    param: &str,
    value: &Value,
) -> Option<Invocation> {
    let arg = inv.schema.in_arg(param)?;
    if inv.param(param).is_some_and(Value::is_concrete) {
        return None;
    }
    if value.is_concrete() && !value.fits(&arg.ty) {
        return None;
    }
    let mut reduced = inv.clone();
    reduced.set_param(param, value.clone());
    Some(reduced)
}

/// The single argument a projection exposes, when it exposes exactly one.
pub fn projection_arg(table: &Table) -> Option<(&str, &ParamType)> {
    match table {
        Table::Projection { args, schema, .. } if args.len() == 1 => {
            let arg = schema.out_arg(&args[0])?;
            Some((arg.name.as_str(), &arg.ty))
        }
        _ => None,
    }
}

/// Replace an unfilled input parameter of `table` with a parameter-passing
/// join from `projection`.
///
/// The projection must expose exactly one argument, that argument's type must
/// fit the parameter, and the two sides must not invoke a common function.
pub fn table_join_replace_placeholder(
    table: &Table,
    param: &str,
    projection: &Table,
) -> Option<Table> {
    let (passed, passed_ty) = projection_arg(projection)?;
    let slot_ty = placeholder_ty(table, param)?;
    if !passed_ty.assignable_to(&slot_ty) {
        return None;
    }
    if has_common_function(projection, table) {
        return None;
    }
    let passed = passed.to_string();
    let rhs = strip_param(table, param);
    let schema = merge_schemas(projection.schema(), table.schema(), Some(param));
    Some(Table::Join {
        lhs: Box::new(projection.clone()),
        rhs: Box::new(rhs),
        in_params: vec![InParam::new(param, Value::var_ref(passed))],
        schema,
    })
}

/// Feed a query's results into an action's input parameter, producing a
/// complete command.
///
/// The passed argument is the table's sole projected argument if it has one,
/// or its identity argument otherwise.
pub fn action_replace_param_with_table(
    action: &Action,
    param: &str,
    table: &Table,
) -> Option<Statement> {
    let (passed, passed_ty) = match projection_arg(table) {
        Some((name, ty)) => (name.to_string(), ty.clone()),
        None => {
            let arg = table.schema().out_arg("id")?;
            (arg.name.clone(), arg.ty.clone())
        }
    };
    let slot = action.invocation.schema.in_arg(param)?;
    if !passed_ty.assignable_to(&slot.ty) {
        return None;
    }
    let bound = beta_reduce_invocation(&action.invocation, param, &Value::var_ref(passed))?;
    Some(Statement::Command {
        table: Some(table.clone()),
        actions: vec![Action::new(bound)],
    })
}

/// Combine a stream and an action into a rule, optionally passing a stream
/// output into an action input.
///
/// With `param` set, the stream output is chosen by name first, then by the
/// first output with an assignable type. A rule whose action re-invokes a
/// stream function is degenerate and rejected.
pub fn when_do_rule(stream: &Stream, action: &Action, param: Option<&str>) -> Option<Statement> {
    if !check_not_self_join_stream(stream) {
        return None;
    }
    let action_fn = action.invocation.function.full_name();
    if stream
        .primitives()
        .iter()
        .any(|inv| inv.function.full_name() == action_fn)
    {
        return None;
    }
    let bound = match param {
        Some(p) => {
            let slot = action.invocation.schema.in_arg(p)?;
            let source = stream
                .schema()
                .out_arg(p)
                .filter(|a| a.ty.assignable_to(&slot.ty))
                .or_else(|| {
                    stream
                        .schema()
                        .iter_out()
                        .find(|a| a.ty.assignable_to(&slot.ty))
                })?;
            let passed = source.name.clone();
            beta_reduce_invocation(&action.invocation, p, &Value::var_ref(passed))?
        }
        None => action.invocation.clone(),
    };
    Some(Statement::Rule {
        stream: stream.clone(),
        actions: vec![Action::new(bound)],
    })
}

/// Whether the stream avoids invoking any function twice.
pub fn check_not_self_join_stream(stream: &Stream) -> bool {
    let mut names: Vec<String> = stream
        .primitives()
        .iter()
        .map(|inv| inv.function.full_name())
        .collect();
    names.sort();
    !names.windows(2).any(|w| w[0] == w[1])
}

/// The declared type of an unfilled input parameter, if the table has one.
fn placeholder_ty(table: &Table, param: &str) -> Option<ParamType> {
    table.primitives().into_iter().find_map(|inv| {
        let arg = inv.schema.in_arg(param)?;
        match inv.param(param) {
            None => Some(arg.ty.clone()),
            Some(v) if v.is_undefined() => Some(arg.ty.clone()),
            Some(_) => None,
        }
    })
}

/// Remove the placeholder binding so the join's parameter passing is the
/// only source for the slot.
fn strip_param(table: &Table, param: &str) -> Table {
    fn walk(table: &mut Table, param: &str, done: &mut bool) {
        if *done {
            return;
        }
        match table {
            Table::Invocation(inv) => {
                if inv.schema.in_arg(param).is_some() {
                    inv.in_params.retain(|p| p.name != param);
                    *done = true;
                }
            }
            Table::Filtered { inner, .. }
            | Table::Projection { inner, .. }
            | Table::Sorted { inner, .. }
            | Table::Index { inner, .. } => walk(inner, param, done),
            Table::Join { lhs, rhs, .. } => {
                walk(lhs, param, done);
                walk(rhs, param, done);
            }
        }
    }
    let mut stripped = table.clone();
    let mut done = false;
    walk(&mut stripped, param, &mut done);
    stripped
}

fn has_common_function(lhs: &Table, rhs: &Table) -> bool {
    let mut names: Vec<String> = lhs
        .primitives()
        .into_iter()
        .chain(rhs.primitives())
        .map(|inv| inv.function.full_name())
        .collect();
    names.sort();
    names.windows(2).any(|w| w[0] == w[1])
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ArgDef, Schema};
    use crate::table::FunctionId;
    use crate::transform::make_projection;

    fn book_table() -> Table {
        let schema = Schema::list(vec![
            ArgDef::out("title", ParamType::String),
            ArgDef::out("author", ParamType::String),
            ArgDef::out("pages", ParamType::Number),
        ]);
        Table::invocation(Invocation::new(
            FunctionId::new("org.library", "book"),
            schema,
        ))
    }

    fn review_search() -> Table {
        let schema = Schema::list(vec![
            ArgDef::input("query", ParamType::String, true),
            ArgDef::out("review", ParamType::String),
        ]);
        Table::invocation(
            Invocation::new(FunctionId::new("org.reviews", "search"), schema)
                .with_param("query", Value::Undefined),
        )
    }

    #[test]
    fn test_beta_reduce_binds_open_slot() {
        let inv = Invocation::new(
            FunctionId::new("org.mail", "send"),
            Schema::single(vec![ArgDef::input("to", ParamType::String, true)]),
        );
        let bound = beta_reduce_invocation(&inv, "to", &Value::string("alice")).unwrap();
        assert_eq!(bound.param("to"), Some(&Value::string("alice")));

        // Rebinding a concrete value is refused.
        assert_eq!(beta_reduce_invocation(&bound, "to", &Value::string("bob")), None);
        // So is a type mismatch.
        assert_eq!(beta_reduce_invocation(&inv, "to", &Value::Number(3.0)), None);
        // And an argument that is not an input.
        assert_eq!(beta_reduce_invocation(&inv, "from", &Value::string("x")), None);
    }

    #[test]
    fn test_projection_arg_requires_single_arg() {
        let table = book_table();
        let single = make_projection(&table, "title").unwrap();
        let (name, ty) = projection_arg(&single).unwrap();
        assert_eq!(name, "title");
        assert_eq!(ty, &ParamType::String);

        assert!(projection_arg(&table).is_none());
    }

    #[test]
    fn test_join_replace_placeholder() {
        let projection = make_projection(&book_table(), "title").unwrap();
        let joined =
            table_join_replace_placeholder(&review_search(), "query", &projection).unwrap();

        match &joined {
            Table::Join { in_params, rhs, .. } => {
                assert_eq!(in_params.len(), 1);
                assert_eq!(in_params[0].name, "query");
                assert_eq!(in_params[0].value, Value::var_ref("title"));
                // The placeholder binding moved onto the join node.
                assert_eq!(rhs.primitives()[0].param("query"), None);
            }
            other => panic!("expected Join, got {other:?}"),
        }
        let schema = joined.schema();
        assert!(schema.has_arg("title"));
        assert!(schema.has_arg("review"));
        assert!(!schema.has_arg("query"));
    }

    #[test]
    fn test_join_rejects_type_mismatch() {
        let projection = make_projection(&book_table(), "pages").unwrap();
        assert_eq!(
            table_join_replace_placeholder(&review_search(), "query", &projection),
            None
        );
    }

    #[test]
    fn test_join_rejects_self_join() {
        let other_search = {
            let schema = Schema::list(vec![
                ArgDef::input("query", ParamType::String, true),
                ArgDef::out("review", ParamType::String),
            ]);
            Table::invocation(Invocation::new(
                FunctionId::new("org.reviews", "search"),
                schema,
            ))
        };
        let projection = make_projection(&other_search, "review").unwrap();
        assert_eq!(
            table_join_replace_placeholder(&review_search(), "query", &projection),
            None
        );
    }

    #[test]
    fn test_join_rejects_bound_param() {
        let projection = make_projection(&book_table(), "title").unwrap();
        let mut search = review_search();
        if let Table::Invocation(inv) = &mut search {
            inv.set_param("query", Value::string("dune"));
        }
        assert_eq!(
            table_join_replace_placeholder(&search, "query", &projection),
            None
        );
    }

    #[test]
    fn test_action_takes_identity_arg_by_default() {
        let restaurant = {
            let schema = Schema::list(vec![
                ArgDef::out("id", ParamType::entity("com.yelp:restaurant")).with_unique(),
                ArgDef::out("food", ParamType::String),
            ]);
            Table::invocation(Invocation::new(
                FunctionId::new("com.yelp", "restaurant"),
                schema,
            ))
        };
        let reserve = Action::new(Invocation::new(
            FunctionId::new("com.yelp", "reserve"),
            Schema::single(vec![ArgDef::input(
                "restaurant",
                ParamType::entity("com.yelp:restaurant"),
                true,
            )]),
        ));

        let stmt = action_replace_param_with_table(&reserve, "restaurant", &restaurant).unwrap();
        match stmt {
            Statement::Command { table, actions } => {
                assert!(table.is_some());
                assert_eq!(
                    actions[0].invocation.param("restaurant"),
                    Some(&Value::var_ref("id"))
                );
            }
            other => panic!("expected Command, got {other:?}"),
        }
    }

    #[test]
    fn test_when_do_rule_binds_by_name_then_type() {
        let thermostat = {
            let schema = Schema::single(vec![ArgDef::out("temperature", ParamType::measure("C"))])
                .with_monitorable();
            Table::invocation(Invocation::new(
                FunctionId::new("org.thermostat", "reading"),
                schema,
            ))
        };
        let stream = Stream::monitor(thermostat).unwrap();

        let heater = Action::new(Invocation::new(
            FunctionId::new("org.heater", "set"),
            Schema::single(vec![ArgDef::input("target", ParamType::measure("C"), true)]),
        ));
        let rule = when_do_rule(&stream, &heater, Some("target")).unwrap();
        match rule {
            Statement::Rule { actions, .. } => assert_eq!(
                actions[0].invocation.param("target"),
                Some(&Value::var_ref("temperature"))
            ),
            other => panic!("expected Rule, got {other:?}"),
        }

        // No output fits a string parameter.
        let mail = Action::new(Invocation::new(
            FunctionId::new("org.mail", "send"),
            Schema::single(vec![ArgDef::input("message", ParamType::String, true)]),
        ));
        assert!(when_do_rule(&stream, &mail, Some("message")).is_none());

        // Without a parameter the rule just fires the action.
        let plain = when_do_rule(&stream, &mail, None).unwrap();
        assert!(matches!(plain, Statement::Rule { .. }));
    }

    #[test]
    fn test_when_do_rejects_action_matching_stream() {
        let light_state = {
            let schema =
                Schema::single(vec![ArgDef::out("power", ParamType::Boolean)]).with_monitorable();
            Table::invocation(Invocation::new(
                FunctionId::new("org.light", "power"),
                schema,
            ))
        };
        let stream = Stream::monitor(light_state).unwrap();
        let same = Action::new(Invocation::new(
            FunctionId::new("org.light", "power"),
            Schema::single(vec![]),
        ));
        assert_eq!(when_do_rule(&stream, &same, None), None);
    }

    #[test]
    fn test_self_join_stream_detection() {
        let inv = Invocation::new(
            FunctionId::new("org.feed", "posts"),
            Schema::list(vec![ArgDef::out("text", ParamType::String)]).with_monitorable(),
        );
        let dup = Table::Join {
            schema: merge_schemas(&inv.schema, &inv.schema, None),
            lhs: Box::new(Table::invocation(inv.clone())),
            rhs: Box::new(Table::invocation(inv.clone())),
            in_params: vec![],
        };
        let stream = Stream::Monitor { table: dup };
        assert!(!check_not_self_join_stream(&stream));

        let ok = Stream::Monitor {
            table: Table::invocation(inv),
        };
        assert!(check_not_self_join_stream(&ok));
    }
}
