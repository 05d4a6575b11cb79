use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use xsdforge_config::{BinaryOp, CompiledConstraint, Expr, Function, Literal, UnaryOp};

/// Result of checking one constraint against bound field values.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Satisfied,
    Violated,
    /// A referenced field has no value yet.
    Unbound(String),
    /// The expression could not be evaluated over these values.
    Invalid(String),
}

impl CheckOutcome {
    pub fn is_violated(&self) -> bool {
        matches!(self, CheckOutcome::Violated)
    }
}

/// Field name to lexical value.
pub type Bindings = BTreeMap<String, String>;

pub fn check(constraint: &CompiledConstraint, bindings: &Bindings) -> CheckOutcome {
    match evaluate(&constraint.expr, bindings) {
        Ok(value) => match value.truthy() {
            Some(true) => CheckOutcome::Satisfied,
            Some(false) => CheckOutcome::Violated,
            None => CheckOutcome::Invalid(format!(
                "constraint '{}' does not evaluate to a boolean",
                constraint.source
            )),
        },
        Err(EvalError::Unbound(field)) => CheckOutcome::Unbound(field),
        Err(EvalError::Invalid(message)) => CheckOutcome::Invalid(message),
    }
}

/// True when every constraint whose fields are all bound holds.
pub fn all_bound_hold(constraints: &[CompiledConstraint], bindings: &Bindings) -> bool {
    constraints
        .iter()
        .all(|constraint| !check(constraint, bindings).is_violated())
}

/// Constraints that evaluate to false over the bindings.
pub fn violated<'c>(
    constraints: &'c [CompiledConstraint],
    bindings: &Bindings,
) -> Vec<&'c CompiledConstraint> {
    constraints
        .iter()
        .filter(|constraint| check(constraint, bindings).is_violated())
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Number(f64),
    Text(String),
    Bool(bool),
}

#[derive(Debug)]
enum EvalError {
    Unbound(String),
    Invalid(String),
}

impl Value {
    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(number) => Some(*number),
            Value::Text(text) => text.trim().parse::<f64>().ok(),
            Value::Bool(_) => None,
        }
    }

    fn truthy(&self) -> Option<bool> {
        match self {
            Value::Bool(flag) => Some(*flag),
            Value::Text(text) => match text.trim() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            Value::Number(_) => None,
        }
    }

    fn text(&self) -> String {
        match self {
            Value::Number(number) => format_number(*number),
            Value::Text(text) => text.clone(),
            Value::Bool(flag) => flag.to_string(),
        }
    }
}

fn format_number(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

fn evaluate(expr: &Expr, bindings: &Bindings) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(Literal::Number(number)) => Ok(Value::Number(*number)),
        Expr::Literal(Literal::Text(text)) => Ok(Value::Text(text.clone())),
        Expr::Literal(Literal::Bool(flag)) => Ok(Value::Bool(*flag)),
        Expr::Field(name) => bindings
            .get(name)
            .map(|value| Value::Text(value.clone()))
            .ok_or_else(|| EvalError::Unbound(name.clone())),
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, bindings)?;
            match op {
                UnaryOp::Not => value
                    .truthy()
                    .map(|flag| Value::Bool(!flag))
                    .ok_or_else(|| EvalError::Invalid("'!' needs a boolean".to_string())),
                UnaryOp::Neg => value
                    .as_number()
                    .map(|number| Value::Number(-number))
                    .ok_or_else(|| EvalError::Invalid("'-' needs a number".to_string())),
            }
        }
        Expr::Binary { op, left, right } => evaluate_binary(*op, left, right, bindings),
        Expr::Call { function, args } => {
            let values = args
                .iter()
                .map(|arg| evaluate(arg, bindings))
                .collect::<Result<Vec<_>, _>>()?;
            call(*function, &values)
        }
    }
}

fn evaluate_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    bindings: &Bindings,
) -> Result<Value, EvalError> {
    if matches!(op, BinaryOp::And | BinaryOp::Or) {
        return evaluate_logical(op == BinaryOp::And, left, right, bindings);
    }

    let lhs = evaluate(left, bindings)?;
    let rhs = evaluate(right, bindings)?;
    match op {
        BinaryOp::Add | BinaryOp::Sub => {
            let (Some(a), Some(b)) = (lhs.as_number(), rhs.as_number()) else {
                return Err(EvalError::Invalid("arithmetic needs numbers".to_string()));
            };
            Ok(Value::Number(if op == BinaryOp::Add { a + b } else { a - b }))
        }
        BinaryOp::Eq => Ok(Value::Bool(compare(&lhs, &rhs) == Ordering::Equal)),
        BinaryOp::Ne => Ok(Value::Bool(compare(&lhs, &rhs) != Ordering::Equal)),
        BinaryOp::Lt => Ok(Value::Bool(compare(&lhs, &rhs) == Ordering::Less)),
        BinaryOp::Le => Ok(Value::Bool(compare(&lhs, &rhs) != Ordering::Greater)),
        BinaryOp::Gt => Ok(Value::Bool(compare(&lhs, &rhs) == Ordering::Greater)),
        BinaryOp::Ge => Ok(Value::Bool(compare(&lhs, &rhs) != Ordering::Less)),
        BinaryOp::And | BinaryOp::Or => evaluate_logical(op == BinaryOp::And, left, right, bindings),
    }
}

/// Short-circuits only when the left side decides the result.
fn evaluate_logical(
    conjunction: bool,
    left: &Expr,
    right: &Expr,
    bindings: &Bindings,
) -> Result<Value, EvalError> {
    let operand = |expr: &Expr| {
        evaluate(expr, bindings)?
            .truthy()
            .ok_or_else(|| EvalError::Invalid("logical operand is not a boolean".to_string()))
    };
    let lhs = operand(left)?;
    if lhs != conjunction {
        return Ok(Value::Bool(lhs));
    }
    operand(right).map(Value::Bool)
}

/// Numeric when both sides read as numbers, boolean when both are flags,
/// otherwise lexical.
fn compare(lhs: &Value, rhs: &Value) -> Ordering {
    if let (Some(a), Some(b)) = (lhs.as_number(), rhs.as_number()) {
        return a.partial_cmp(&b).unwrap_or(Ordering::Equal);
    }
    if matches!(lhs, Value::Bool(_)) || matches!(rhs, Value::Bool(_)) {
        if let (Some(a), Some(b)) = (lhs.truthy(), rhs.truthy()) {
            return a.cmp(&b);
        }
    }
    lhs.text().cmp(&rhs.text())
}

fn call(function: Function, args: &[Value]) -> Result<Value, EvalError> {
    let arg = |index: usize| {
        args.get(index).ok_or_else(|| {
            EvalError::Invalid(format!("{}() is missing an argument", function.name()))
        })
    };
    match function {
        Function::DateDiff => {
            let from = parse_date(&arg(0)?.text())?;
            let to = parse_date(&arg(1)?.text())?;
            Ok(Value::Number((to - from).num_days() as f64))
        }
        Function::Len => Ok(Value::Number(arg(0)?.text().chars().count() as f64)),
        Function::Lower => Ok(Value::Text(arg(0)?.text().to_lowercase())),
        Function::Upper => Ok(Value::Text(arg(0)?.text().to_uppercase())),
        Function::Abs => arg(0)?
            .as_number()
            .map(|number| Value::Number(number.abs()))
            .ok_or_else(|| EvalError::Invalid("abs() needs a number".to_string())),
        Function::Contains => Ok(Value::Bool(arg(0)?.text().contains(&arg(1)?.text()))),
        Function::StartsWith => Ok(Value::Bool(arg(0)?.text().starts_with(&arg(1)?.text()))),
        Function::EndsWith => Ok(Value::Bool(arg(0)?.text().ends_with(&arg(1)?.text()))),
    }
}

fn parse_date(text: &str) -> Result<NaiveDate, EvalError> {
    let trimmed = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Ok(datetime.date());
    }
    // Timezoned or fractional forms: the date part is enough.
    trimmed
        .get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        .ok_or_else(|| EvalError::Invalid(format!("'{text}' is not a date")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use xsdforge_config::parse_constraint;

    fn constraint(source: &str) -> CompiledConstraint {
        let expr = parse_constraint(source).unwrap();
        let mut fields: Vec<String> = expr.field_refs().iter().map(|f| f.to_string()).collect();
        fields.sort();
        fields.dedup();
        CompiledConstraint {
            source: source.to_string(),
            expr,
            fields,
        }
    }

    fn bind(pairs: &[(&str, &str)]) -> Bindings {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn compares_strings_and_numbers() {
        let ne = constraint("a != b");
        assert_eq!(check(&ne, &bind(&[("a", "X"), ("b", "Y")])), CheckOutcome::Satisfied);
        assert_eq!(check(&ne, &bind(&[("a", "X"), ("b", "X")])), CheckOutcome::Violated);

        let lt = constraint("price < 100");
        assert_eq!(check(&lt, &bind(&[("price", "99.50")])), CheckOutcome::Satisfied);
        // "9" sorts after "100" lexically.
        assert_eq!(check(&lt, &bind(&[("price", "9")])), CheckOutcome::Satisfied);
    }

    #[test]
    fn reports_unbound_fields() {
        let ne = constraint("a != b");
        assert_eq!(
            check(&ne, &bind(&[("a", "X")])),
            CheckOutcome::Unbound("b".to_string())
        );
        assert!(all_bound_hold(std::slice::from_ref(&ne), &bind(&[("a", "X")])));
    }

    #[test]
    fn date_diff_counts_days() {
        let window = constraint("date_diff(start, end) >= 2 && date_diff(start, end) <= 30");
        assert_eq!(
            check(&window, &bind(&[("start", "2024-01-01"), ("end", "2024-01-10")])),
            CheckOutcome::Satisfied
        );
        assert_eq!(
            check(&window, &bind(&[("start", "2024-01-10"), ("end", "2024-01-01T10:00:00")])),
            CheckOutcome::Violated
        );
    }

    #[test]
    fn string_functions() {
        let c = constraint("starts_with(upper(code), \"BK\") && len(code) == 8");
        assert_eq!(check(&c, &bind(&[("code", "bk123456")])), CheckOutcome::Satisfied);
        assert_eq!(check(&c, &bind(&[("code", "bk12")])), CheckOutcome::Violated);
    }

    #[test]
    fn non_boolean_result_is_invalid() {
        let c = constraint("a + 1");
        assert!(matches!(
            check(&c, &bind(&[("a", "2")])),
            CheckOutcome::Invalid(_)
        ));
    }
}
