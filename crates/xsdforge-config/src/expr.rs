use thiserror::Error;

/// Parsed relationship constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// Reference to a participant field (dotted names allowed).
    Field(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Text(String),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Add,
    Sub,
}

/// Built-in functions callable from constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    /// Whole days from the first date to the second.
    DateDiff,
    Len,
    Lower,
    Upper,
    Abs,
    Contains,
    StartsWith,
    EndsWith,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        let function = match name.to_ascii_lowercase().as_str() {
            "date_diff" => Function::DateDiff,
            "len" | "length" => Function::Len,
            "lower" => Function::Lower,
            "upper" => Function::Upper,
            "abs" => Function::Abs,
            "contains" => Function::Contains,
            "starts_with" => Function::StartsWith,
            "ends_with" => Function::EndsWith,
            _ => return None,
        };
        Some(function)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::DateDiff => "date_diff",
            Function::Len => "len",
            Function::Lower => "lower",
            Function::Upper => "upper",
            Function::Abs => "abs",
            Function::Contains => "contains",
            Function::StartsWith => "starts_with",
            Function::EndsWith => "ends_with",
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Function::Len | Function::Lower | Function::Upper | Function::Abs => 1,
            Function::DateDiff | Function::Contains | Function::StartsWith | Function::EndsWith => {
                2
            }
        }
    }
}

/// Constraint parse failure with the byte offset it was detected at.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at offset {position}")]
pub struct ExprError {
    pub message: String,
    pub position: usize,
}

impl ExprError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl Expr {
    /// Field names referenced anywhere in the expression, in source order.
    pub fn field_refs(&self) -> Vec<&str> {
        let mut refs = Vec::new();
        self.collect_fields(&mut refs);
        refs
    }

    fn collect_fields<'a>(&'a self, refs: &mut Vec<&'a str>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Field(name) => refs.push(name.as_str()),
            Expr::Unary { operand, .. } => operand.collect_fields(refs),
            Expr::Binary { left, right, .. } => {
                left.collect_fields(refs);
                right.collect_fields(refs);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_fields(refs);
                }
            }
        }
    }

    /// Rewrite every field reference, stopping at the first failure.
    pub fn try_map_fields<E>(
        self,
        map: &mut impl FnMut(&str) -> Result<String, E>,
    ) -> Result<Expr, E> {
        Ok(match self {
            Expr::Literal(literal) => Expr::Literal(literal),
            Expr::Field(name) => Expr::Field(map(&name)?),
            Expr::Unary { op, operand } => Expr::Unary {
                op,
                operand: Box::new(operand.try_map_fields(map)?),
            },
            Expr::Binary { op, left, right } => Expr::Binary {
                op,
                left: Box::new(left.try_map_fields(map)?),
                right: Box::new(right.try_map_fields(map)?),
            },
            Expr::Call { function, args } => Expr::Call {
                function,
                args: args
                    .into_iter()
                    .map(|arg| arg.try_map_fields(map))
                    .collect::<Result<Vec<_>, E>>()?,
            },
        })
    }
}

/// Parse a constraint string into an expression tree.
pub fn parse_constraint(source: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        cursor: 0,
        end: source.len(),
    };
    let expr = parser.parse_or()?;
    if let Some((token, position)) = parser.tokens.get(parser.cursor) {
        return Err(ExprError::new(
            format!("unexpected token {}", token.describe()),
            *position,
        ));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Text(String),
    LParen,
    RParen,
    Comma,
    Op(&'static str),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("'{name}'"),
            Token::Number(value) => format!("'{value}'"),
            Token::Text(value) => format!("string '{value}'"),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Op(op) => format!("'{op}'"),
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Ident(name) if name.eq_ignore_ascii_case(keyword))
    }
}

const OPERATORS: &[&str] = &["==", "!=", "<>", "<=", ">=", "&&", "||", "=", "<", ">", "!", "+", "-"];

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, ExprError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut idx = 0;

    while idx < chars.len() {
        let (position, ch) = chars[idx];
        if ch.is_whitespace() {
            idx += 1;
            continue;
        }

        match ch {
            '(' => {
                tokens.push((Token::LParen, position));
                idx += 1;
            }
            ')' => {
                tokens.push((Token::RParen, position));
                idx += 1;
            }
            ',' => {
                tokens.push((Token::Comma, position));
                idx += 1;
            }
            '\'' | '"' => {
                let quote = ch;
                let mut text = String::new();
                idx += 1;
                loop {
                    let Some(&(_, next)) = chars.get(idx) else {
                        return Err(ExprError::new("unterminated string literal", position));
                    };
                    idx += 1;
                    if next == quote {
                        break;
                    }
                    if next == '\\'
                        && let Some(&(_, escaped)) = chars.get(idx)
                    {
                        text.push(escaped);
                        idx += 1;
                        continue;
                    }
                    text.push(next);
                }
                tokens.push((Token::Text(text), position));
            }
            c if c.is_ascii_digit() => {
                let start = idx;
                while idx < chars.len() && (chars[idx].1.is_ascii_digit() || chars[idx].1 == '.') {
                    idx += 1;
                }
                let literal: String = chars[start..idx].iter().map(|(_, c)| *c).collect();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| ExprError::new(format!("invalid number '{literal}'"), position))?;
                tokens.push((Token::Number(value), position));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = idx;
                while idx < chars.len()
                    && (chars[idx].1.is_alphanumeric() || matches!(chars[idx].1, '_' | '.' | '@'))
                {
                    idx += 1;
                }
                let ident: String = chars[start..idx].iter().map(|(_, c)| *c).collect();
                tokens.push((Token::Ident(ident), position));
            }
            '@' => {
                let start = idx;
                idx += 1;
                while idx < chars.len() && (chars[idx].1.is_alphanumeric() || chars[idx].1 == '_')
                {
                    idx += 1;
                }
                let ident: String = chars[start..idx].iter().map(|(_, c)| *c).collect();
                tokens.push((Token::Ident(ident), position));
            }
            _ => {
                let rest = &source[position..];
                let Some(&op) = OPERATORS.iter().find(|op| rest.starts_with(**op)) else {
                    return Err(ExprError::new(format!("unexpected character '{ch}'"), position));
                };
                tokens.push((Token::Op(op), position));
                idx += op.chars().count();
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    cursor: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor).map(|(token, _)| token)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.cursor)
            .map(|(_, position)| *position)
            .unwrap_or(self.end)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).map(|(token, _)| token.clone());
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn eat_op(&mut self, ops: &[&str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.cursor += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek().is_some_and(|token| token.is_keyword(keyword)) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("or") || self.eat_op(&["||"]).is_some() {
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_not()?;
        while self.eat_keyword("and") || self.eat_op(&["&&"]).is_some() {
            let right = self.parse_not()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ExprError> {
        if self.eat_keyword("not") || self.eat_op(&["!"]).is_some() {
            let operand = self.parse_not()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let left = self.parse_additive()?;
        let Some(op) = self.eat_op(&["==", "=", "!=", "<>", "<", "<=", ">", ">="]) else {
            return Ok(left);
        };
        let op = match op {
            "==" | "=" => BinaryOp::Eq,
            "!=" | "<>" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            _ => BinaryOp::Ge,
        };
        let right = self.parse_additive()?;
        Ok(binary(op, left, right))
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.eat_op(&["+", "-"]) {
            let right = self.parse_unary()?;
            let op = if op == "+" { BinaryOp::Add } else { BinaryOp::Sub };
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if self.eat_op(&["-"]).is_some() {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        let position = self.position();
        let Some(token) = self.advance() else {
            return Err(ExprError::new("unexpected end of expression", position));
        };

        match token {
            Token::Number(value) => Ok(Expr::Literal(Literal::Number(value))),
            Token::Text(value) => Ok(Expr::Literal(Literal::Text(value))),
            Token::LParen => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(ExprError::new("expected ')'", self.position())),
                }
            }
            Token::Ident(name) if name.eq_ignore_ascii_case("true") => {
                Ok(Expr::Literal(Literal::Bool(true)))
            }
            Token::Ident(name) if name.eq_ignore_ascii_case("false") => {
                Ok(Expr::Literal(Literal::Bool(false)))
            }
            Token::Ident(name) => {
                if self.peek() != Some(&Token::LParen) {
                    return Ok(Expr::Field(name));
                }
                self.cursor += 1;
                let function = Function::from_name(&name).ok_or_else(|| {
                    ExprError::new(format!("unknown function '{name}'"), position)
                })?;
                let args = self.parse_args()?;
                if args.len() != function.arity() {
                    return Err(ExprError::new(
                        format!(
                            "function '{}' expects {} argument(s), got {}",
                            function.name(),
                            function.arity(),
                            args.len()
                        ),
                        position,
                    ));
                }
                Ok(Expr::Call { function, args })
            }
            other => Err(ExprError::new(
                format!("unexpected token {}", other.describe()),
                position,
            )),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ExprError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.cursor += 1;
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                _ => return Err(ExprError::new("expected ',' or ')'", self.position())),
            }
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str) -> Box<Expr> {
        Box::new(Expr::Field(name.to_string()))
    }

    #[test]
    fn parses_inequality_between_fields() {
        let expr = parse_constraint("departure != arrival").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Ne,
                left: field("departure"),
                right: field("arrival"),
            }
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr = parse_constraint("a = 1 or b = 2 and c = 3").unwrap();
        let Expr::Binary { op, right, .. } = expr else {
            panic!("expected binary expression");
        };
        assert_eq!(op, BinaryOp::Or);
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::And, .. }));
    }

    #[test]
    fn parses_function_calls_and_symbols() {
        let expr = parse_constraint("date_diff(CheckIn, CheckOut) >= 1 && !(len(Code) < 3)")
            .unwrap();
        assert_eq!(expr.field_refs(), vec!["CheckIn", "CheckOut", "Code"]);
    }

    #[test]
    fn rejects_unknown_function_and_bad_arity() {
        let err = parse_constraint("shout(a)").unwrap_err();
        assert!(err.message.contains("unknown function"));
        let err = parse_constraint("lower(a, b)").unwrap_err();
        assert!(err.message.contains("expects 1"));
    }

    #[test]
    fn rejects_unterminated_string_and_trailing_tokens() {
        assert!(parse_constraint("a == 'oops").is_err());
        assert!(parse_constraint("a == b c").is_err());
        assert!(parse_constraint("").is_err());
    }

    #[test]
    fn maps_field_names() {
        let expr = parse_constraint("lower(departure) != 'x'").unwrap();
        let mapped = expr
            .try_map_fields(&mut |name: &str| Ok::<_, ()>(format!("{name}City")))
            .unwrap();
        assert_eq!(mapped.field_refs(), vec!["departureCity"]);
    }
}
