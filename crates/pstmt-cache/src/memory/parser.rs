//! Statement grammar understood by the in-memory backend.
//!
//! ```text
//! CREATE TABLE t(a, b)
//! INSERT INTO t(a, b) VALUES(?, 'x')
//! SELECT a, b | * FROM t [WHERE col = ?] [ORDER BY col [ASC|DESC]]
//! SELECT 1, 'x'
//! DELETE FROM t [WHERE col = ?]
//! ```
//!
//! Keywords and identifiers are case-insensitive; a trailing `;` is allowed.

use crate::value::Value;

use super::error::MemoryError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    /// Zero-based placeholder index
    Param(usize),
    Literal(Value),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Projection {
    All,
    Columns(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Filter {
    pub column: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OrderBy {
    pub column: String,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Statement {
    CreateTable {
        table: String,
        columns: Vec<String>,
    },
    Insert {
        table: String,
        columns: Vec<String>,
        values: Vec<Expr>,
    },
    Select {
        table: String,
        projection: Projection,
        filter: Option<Filter>,
        order_by: Option<OrderBy>,
    },
    SelectValues(Vec<Expr>),
    Delete {
        table: String,
        filter: Option<Filter>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Parsed {
    pub statement: Statement,
    pub param_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Text(String),
    Symbol(char),
}

#[derive(Debug, Clone, PartialEq)]
struct Spanned {
    token: Token,
    offset: usize,
}

fn tokenize(input: &str) -> Result<Vec<Spanned>, MemoryError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_alphabetic() || c == '_' {
            let mut ident = String::new();
            while let Some(&(_, c)) = chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    ident.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Spanned {
                token: Token::Ident(ident),
                offset,
            });
        } else if c.is_ascii_digit() || c == '-' {
            let mut digits = String::new();
            digits.push(c);
            chars.next();
            while let Some(&(_, c)) = chars.peek() {
                if c.is_ascii_digit() {
                    digits.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            let value = digits
                .parse::<i64>()
                .map_err(|_| MemoryError::syntax(offset, format!("invalid integer {digits}")))?;
            tokens.push(Spanned {
                token: Token::Int(value),
                offset,
            });
        } else if c == '\'' {
            chars.next();
            let mut text = String::new();
            loop {
                match chars.next() {
                    Some((_, '\'')) => {
                        if matches!(chars.peek(), Some(&(_, '\''))) {
                            text.push('\'');
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    Some((_, c)) => text.push(c),
                    None => return Err(MemoryError::syntax(offset, "unterminated string")),
                }
            }
            tokens.push(Spanned {
                token: Token::Text(text),
                offset,
            });
        } else if matches!(c, '(' | ')' | ',' | '?' | '=' | '*' | ';') {
            chars.next();
            tokens.push(Spanned {
                token: Token::Symbol(c),
                offset,
            });
        } else {
            return Err(MemoryError::syntax(offset, format!("unexpected character {c:?}")));
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
    params: usize,
}

impl Parser {
    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |t| t.offset)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn error(&self, message: impl Into<String>) -> MemoryError {
        MemoryError::syntax(self.offset(), message)
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(id)) if id.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), MemoryError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!("expected {keyword}")))
        }
    }

    fn eat_symbol(&mut self, symbol: char) -> bool {
        if self.peek() == Some(&Token::Symbol(symbol)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: char) -> Result<(), MemoryError> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{symbol}'")))
        }
    }

    fn identifier(&mut self) -> Result<String, MemoryError> {
        match self.peek() {
            Some(Token::Ident(id)) => {
                let id = id.to_ascii_lowercase();
                self.pos += 1;
                Ok(id)
            }
            _ => Err(self.error("expected identifier")),
        }
    }

    fn identifier_list(&mut self) -> Result<Vec<String>, MemoryError> {
        let mut names = vec![self.identifier()?];
        while self.eat_symbol(',') {
            names.push(self.identifier()?);
        }
        Ok(names)
    }

    fn expr(&mut self) -> Result<Expr, MemoryError> {
        let expr = match self.peek() {
            Some(Token::Symbol('?')) => {
                let index = self.params;
                self.params += 1;
                Expr::Param(index)
            }
            Some(Token::Int(v)) => Expr::Literal(Value::Int(*v)),
            Some(Token::Text(s)) => Expr::Literal(Value::Text(s.clone())),
            Some(Token::Ident(id)) if id.eq_ignore_ascii_case("NULL") => Expr::Literal(Value::Null),
            Some(Token::Ident(id)) if id.eq_ignore_ascii_case("TRUE") => {
                Expr::Literal(Value::Bool(true))
            }
            Some(Token::Ident(id)) if id.eq_ignore_ascii_case("FALSE") => {
                Expr::Literal(Value::Bool(false))
            }
            _ => return Err(self.error("expected value or '?'")),
        };
        self.pos += 1;
        Ok(expr)
    }

    fn expr_list(&mut self) -> Result<Vec<Expr>, MemoryError> {
        let mut exprs = vec![self.expr()?];
        while self.eat_symbol(',') {
            exprs.push(self.expr()?);
        }
        Ok(exprs)
    }

    fn filter(&mut self) -> Result<Option<Filter>, MemoryError> {
        if !self.eat_keyword("WHERE") {
            return Ok(None);
        }
        let column = self.identifier()?;
        self.expect_symbol('=')?;
        let value = self.expr()?;
        Ok(Some(Filter { column, value }))
    }

    fn statement(&mut self) -> Result<Statement, MemoryError> {
        if self.eat_keyword("CREATE") {
            self.expect_keyword("TABLE")?;
            let table = self.identifier()?;
            self.expect_symbol('(')?;
            let columns = self.identifier_list()?;
            self.expect_symbol(')')?;
            Ok(Statement::CreateTable { table, columns })
        } else if self.eat_keyword("INSERT") {
            self.expect_keyword("INTO")?;
            let table = self.identifier()?;
            self.expect_symbol('(')?;
            let columns = self.identifier_list()?;
            self.expect_symbol(')')?;
            self.expect_keyword("VALUES")?;
            self.expect_symbol('(')?;
            let values_at = self.offset();
            let values = self.expr_list()?;
            self.expect_symbol(')')?;
            if values.len() != columns.len() {
                return Err(MemoryError::syntax(
                    values_at,
                    format!("{} columns but {} values", columns.len(), values.len()),
                ));
            }
            Ok(Statement::Insert {
                table,
                columns,
                values,
            })
        } else if self.eat_keyword("SELECT") {
            self.select()
        } else if self.eat_keyword("DELETE") {
            self.expect_keyword("FROM")?;
            let table = self.identifier()?;
            let filter = self.filter()?;
            Ok(Statement::Delete { table, filter })
        } else {
            match self.peek() {
                Some(Token::Ident(id)) => Err(self.error(format!("unknown statement {id}"))),
                _ => Err(self.error("expected statement")),
            }
        }
    }

    fn select(&mut self) -> Result<Statement, MemoryError> {
        let projection = if self.eat_symbol('*') {
            Projection::All
        } else if matches!(self.peek(), Some(Token::Ident(id)) if !is_value_keyword(id)) {
            Projection::Columns(self.identifier_list()?)
        } else {
            return Ok(Statement::SelectValues(self.expr_list()?));
        };

        self.expect_keyword("FROM")?;
        let table = self.identifier()?;
        let filter = self.filter()?;
        let order_by = if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            let column = self.identifier()?;
            let descending = if self.eat_keyword("DESC") {
                true
            } else {
                self.eat_keyword("ASC");
                false
            };
            Some(OrderBy { column, descending })
        } else {
            None
        };

        Ok(Statement::Select {
            table,
            projection,
            filter,
            order_by,
        })
    }
}

fn is_value_keyword(id: &str) -> bool {
    ["NULL", "TRUE", "FALSE"]
        .iter()
        .any(|k| id.eq_ignore_ascii_case(k))
}

pub(crate) fn parse(query: &str) -> Result<Parsed, MemoryError> {
    let tokens = tokenize(query)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: query.len(),
        params: 0,
    };

    let statement = parser.statement()?;
    parser.eat_symbol(';');
    if parser.peek().is_some() {
        return Err(parser.error("unexpected trailing input"));
    }

    Ok(Parsed {
        statement,
        param_count: parser.params,
    })
}
