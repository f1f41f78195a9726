//! Surface syntax for programs.
//!
//! The printed form is what shows up in logs, debug dumps, and the
//! command-line REPL. It round-trips in the head of a developer, not in a
//! parser: the wire format for programs is JSON.

use std::fmt;

use crate::control::{ControlIntent, SpecialCommand};
use crate::filter::{FilterExpr, FilterOp};
use crate::stream::{Action, Program, Statement, Stream};
use crate::table::{FunctionId, InParam, Invocation, SortDirection, Table};
use crate::value::Value;

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "\"{s}\""),
            Self::Number(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Measure { value, unit } => write!(f, "{value}{unit}"),
            Self::Entity {
                value,
                ty,
                display: Some(d),
            } => write!(f, "\"{value}\"^^{ty}(\"{d}\")"),
            Self::Entity { value, ty, .. } => write!(f, "\"{value}\"^^{ty}"),
            Self::Enum(v) => write!(f, "enum({v})"),
            Self::Date(d) => write!(f, "date({})", d.to_rfc3339()),
            Self::Array(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Self::VarRef(name) => write!(f, "{name}"),
            Self::Undefined => write!(f, "$?"),
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Parenthesize compound operands so precedence reads unambiguously.
        fn operand(f: &mut fmt::Formatter<'_>, expr: &FilterExpr) -> fmt::Result {
            match expr {
                FilterExpr::And(_) | FilterExpr::Or(_) => write!(f, "({expr})"),
                other => write!(f, "{other}"),
            }
        }
        match self {
            Self::True => write!(f, "true"),
            Self::False => write!(f, "false"),
            Self::Atom { name, op, value } => write!(f, "{name} {op} {value}"),
            Self::Not(inner) => {
                write!(f, "!")?;
                operand(f, inner)
            }
            Self::And(operands) => {
                for (i, op) in operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, " && ")?;
                    }
                    operand(f, op)?;
                }
                Ok(())
            }
            Self::Or(operands) => {
                for (i, op) in operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, " || ")?;
                    }
                    operand(f, op)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}.{}", self.kind, self.name)
    }
}

impl fmt::Display for InParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.function)?;
        for (i, p) in self.in_params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invocation(inv) => write!(f, "{inv}"),
            Self::Filtered { inner, filter, .. } => write!(f, "({inner}), {filter}"),
            Self::Projection { inner, args, .. } => {
                write!(f, "[{}] of ({inner})", args.join(", "))
            }
            Self::Join {
                lhs,
                rhs,
                in_params,
                ..
            } => {
                write!(f, "({lhs} join {rhs}")?;
                if !in_params.is_empty() {
                    write!(f, " on (")?;
                    for (i, p) in in_params.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{p}")?;
                    }
                    write!(f, ")")?;
                }
                write!(f, ")")
            }
            Self::Sorted {
                inner,
                arg,
                direction,
            } => write!(f, "sort({arg} {direction} of ({inner}))"),
            Self::Index { inner, index } => write!(f, "({inner})[{index}]"),
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Monitor { table } => write!(f, "monitor ({table})"),
            Self::Filtered { inner, filter } => write!(f, "({inner}), {filter}"),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.invocation)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn actions(f: &mut fmt::Formatter<'_>, list: &[Action]) -> fmt::Result {
            for (i, a) in list.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{a}")?;
            }
            Ok(())
        }
        match self {
            Self::Query(table) => write!(f, "now => {table} => notify;"),
            Self::Command {
                table: Some(table),
                actions: list,
            } => {
                write!(f, "now => ({table}) => ")?;
                actions(f, list)?;
                write!(f, ";")
            }
            Self::Command {
                table: None,
                actions: list,
            } => {
                write!(f, "now => ")?;
                actions(f, list)?;
                write!(f, ";")
            }
            Self::Rule {
                stream,
                actions: list,
            } => {
                write!(f, "{stream} => ")?;
                actions(f, list)?;
                write!(f, ";")
            }
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stmt) in self.statements.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{stmt}")?;
        }
        Ok(())
    }
}

impl fmt::Display for SpecialCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

impl fmt::Display for ControlIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Special(cmd) => write!(f, "{cmd}"),
            Self::Answer(value) => write!(f, "answer({value})"),
            Self::Choice(index) => write!(f, "choice({index})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterOp;
    use crate::schema::{ArgDef, Schema};
    use crate::value::ParamType;

    fn restaurant() -> Table {
        let schema = Schema::list(vec![
            ArgDef::out("food", ParamType::String),
            ArgDef::out("rating", ParamType::Number),
        ]);
        Table::invocation(Invocation::new(
            FunctionId::new("com.yelp", "restaurant"),
            schema,
        ))
    }

    #[test]
    fn test_invocation_format() {
        let inv = Invocation::new(
            FunctionId::new("org.weather", "current"),
            Schema::single(vec![]),
        )
        .with_param("location", Value::string("cardiff"));
        assert_eq!(inv.to_string(), "@org.weather.current(location=\"cardiff\")");
    }

    #[test]
    fn test_filtered_table_format() {
        let table = Table::filtered(
            restaurant(),
            FilterExpr::atom("food", FilterOp::Eq, Value::string("thai")),
        );
        assert_eq!(
            table.to_string(),
            "(@com.yelp.restaurant()), food == \"thai\""
        );
    }

    #[test]
    fn test_sort_index_format() {
        let table = Table::Index {
            inner: Box::new(Table::Sorted {
                inner: Box::new(restaurant()),
                arg: "rating".to_string(),
                direction: SortDirection::Desc,
            }),
            index: 1,
        };
        assert_eq!(
            table.to_string(),
            "(sort(rating desc of (@com.yelp.restaurant())))[1]"
        );
    }

    #[test]
    fn test_compound_filter_parenthesized() {
        let filter = FilterExpr::And(vec![
            FilterExpr::atom("food", FilterOp::Eq, Value::string("thai")),
            FilterExpr::Or(vec![
                FilterExpr::atom("rating", FilterOp::Ge, Value::Number(4.0)),
                FilterExpr::atom("price", FilterOp::Eq, Value::Enum("cheap".to_string())),
            ]),
        ]);
        assert_eq!(
            filter.to_string(),
            "food == \"thai\" && (rating >= 4 || price == enum(cheap))"
        );
    }

    #[test]
    fn test_query_statement_format() {
        let stmt = Statement::Query(restaurant());
        assert_eq!(stmt.to_string(), "now => @com.yelp.restaurant() => notify;");
    }

    #[test]
    fn test_undefined_prints_as_slot() {
        assert_eq!(Value::Undefined.to_string(), "$?");
    }
}
