//! Canonical DDL rendering and replay
//!
//! Captured command text must replay identically on every node, so the
//! reference engine only ever emits one canonical, fully-qualified form
//! per object and only accepts that form back. This is deliberately not
//! a SQL parser; it recognizes exactly the statements the engine itself
//! renders:
//!
//! - `CREATE [UNLOGGED | TEMPORARY] TABLE schema.name (...)`
//! - `DROP TABLE schema.name`

use super::errors::{EngineError, EngineResult};
use super::relation::{quote_identifier, quote_qualified, ColumnType, Persistence};

/// One column of a table definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Column name
    pub name: String,
    /// Value type
    pub column_type: ColumnType,
    /// Whether NULL is a legal value
    pub nullable: bool,
}

/// A table definition, the unit the reference engine creates and
/// renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    /// Schema name
    pub schema: String,
    /// Table name
    pub name: String,
    /// Persistence class
    pub persistence: Persistence,
    /// Columns in declaration order
    pub columns: Vec<ColumnSpec>,
    /// Primary-key column names, empty for none
    pub primary_key: Vec<String>,
}

impl TableSpec {
    /// Renders the canonical, fully-qualified statement for this table.
    ///
    /// The rendering never depends on any session search path.
    pub fn render(&self) -> String {
        let mut out = String::from("CREATE ");
        match self.persistence {
            Persistence::Permanent => {}
            Persistence::Unlogged => out.push_str("UNLOGGED "),
            Persistence::Temporary => out.push_str("TEMPORARY "),
        }
        out.push_str("TABLE ");
        out.push_str(&quote_qualified(&self.schema, &self.name));
        out.push_str(" (");
        let mut sep = "";
        for col in &self.columns {
            out.push_str(sep);
            out.push_str(&quote_identifier(&col.name));
            out.push(' ');
            out.push_str(col.column_type.keyword());
            if !col.nullable {
                out.push_str(" NOT NULL");
            }
            sep = ", ";
        }
        if !self.primary_key.is_empty() {
            out.push_str(sep);
            out.push_str("PRIMARY KEY (");
            let mut ksep = "";
            for key in &self.primary_key {
                out.push_str(ksep);
                out.push_str(&quote_identifier(key));
                ksep = ", ";
            }
            out.push(')');
        }
        out.push(')');
        out
    }
}

/// A parsed canonical statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdlCommand {
    /// Create a table
    CreateTable(TableSpec),
    /// Drop a table by qualified name
    DropTable {
        /// Schema name
        schema: String,
        /// Table name
        name: String,
    },
}

impl DdlCommand {
    /// Parses canonical command text.
    pub fn parse(text: &str) -> EngineResult<Self> {
        let mut tokens = Tokens::lex(text)?;
        let command = match tokens.expect_word()?.as_str() {
            "CREATE" => parse_create(&mut tokens)?,
            "DROP" => parse_drop(&mut tokens)?,
            other => {
                return Err(EngineError::DdlParse(format!(
                    "unrecognized statement head {other:?}"
                )))
            }
        };
        tokens.expect_end()?;
        Ok(command)
    }

    /// Renders the canonical text for this command.
    pub fn render(&self) -> String {
        match self {
            DdlCommand::CreateTable(spec) => spec.render(),
            DdlCommand::DropTable { schema, name } => {
                format!("DROP TABLE {}", quote_qualified(schema, name))
            }
        }
    }
}

fn parse_create(tokens: &mut Tokens) -> EngineResult<DdlCommand> {
    let mut persistence = Persistence::Permanent;
    let mut word = tokens.expect_word()?;
    if word == "UNLOGGED" {
        persistence = Persistence::Unlogged;
        word = tokens.expect_word()?;
    } else if word == "TEMPORARY" {
        persistence = Persistence::Temporary;
        word = tokens.expect_word()?;
    }
    if word != "TABLE" {
        return Err(EngineError::DdlParse(format!(
            "expected TABLE, found {word:?}"
        )));
    }

    let (schema, name) = parse_qualified_name(tokens)?;
    tokens.expect(Token::LParen)?;

    let mut columns = Vec::new();
    let mut primary_key = Vec::new();
    loop {
        if tokens.peek_word("PRIMARY") {
            tokens.expect_word()?; // PRIMARY
            let key = tokens.expect_word()?;
            if key != "KEY" {
                return Err(EngineError::DdlParse(format!(
                    "expected KEY after PRIMARY, found {key:?}"
                )));
            }
            tokens.expect(Token::LParen)?;
            loop {
                primary_key.push(tokens.expect_identifier()?);
                if !tokens.eat(Token::Comma) {
                    break;
                }
            }
            tokens.expect(Token::RParen)?;
        } else {
            let col_name = tokens.expect_identifier()?;
            let type_word = tokens.expect_word()?;
            let column_type = ColumnType::from_keyword(&type_word).ok_or_else(|| {
                EngineError::DdlParse(format!("unknown column type {type_word:?}"))
            })?;
            let mut nullable = true;
            if tokens.peek_word("NOT") {
                tokens.expect_word()?; // NOT
                let null_word = tokens.expect_word()?;
                if null_word != "NULL" {
                    return Err(EngineError::DdlParse(format!(
                        "expected NULL after NOT, found {null_word:?}"
                    )));
                }
                nullable = false;
            }
            columns.push(ColumnSpec {
                name: col_name,
                column_type,
                nullable,
            });
        }
        if !tokens.eat(Token::Comma) {
            break;
        }
    }
    tokens.expect(Token::RParen)?;

    Ok(DdlCommand::CreateTable(TableSpec {
        schema,
        name,
        persistence,
        columns,
        primary_key,
    }))
}

fn parse_drop(tokens: &mut Tokens) -> EngineResult<DdlCommand> {
    let word = tokens.expect_word()?;
    if word != "TABLE" {
        return Err(EngineError::DdlParse(format!(
            "expected TABLE after DROP, found {word:?}"
        )));
    }
    let (schema, name) = parse_qualified_name(tokens)?;
    Ok(DdlCommand::DropTable { schema, name })
}

/// Qualified names are mandatory: replay must not depend on any search
/// path, so a bare table name is a parse error.
fn parse_qualified_name(tokens: &mut Tokens) -> EngineResult<(String, String)> {
    let schema = tokens.expect_identifier()?;
    if !tokens.eat(Token::Dot) {
        return Err(EngineError::DdlParse(format!(
            "relation name {schema:?} is not schema-qualified"
        )));
    }
    let name = tokens.expect_identifier()?;
    Ok((schema, name))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// Bare word: keyword or plain identifier
    Word(String),
    /// Quoted identifier, unescaped
    Quoted(String),
    LParen,
    RParen,
    Comma,
    Dot,
}

struct Tokens {
    tokens: Vec<Token>,
    position: usize,
}

impl Tokens {
    fn lex(text: &str) -> EngineResult<Self> {
        let mut tokens = Vec::new();
        let mut chars = text.chars().peekable();
        while let Some(&c) = chars.peek() {
            match c {
                ' ' | '\t' | '\n' | '\r' => {
                    chars.next();
                }
                '(' => {
                    chars.next();
                    tokens.push(Token::LParen);
                }
                ')' => {
                    chars.next();
                    tokens.push(Token::RParen);
                }
                ',' => {
                    chars.next();
                    tokens.push(Token::Comma);
                }
                '.' => {
                    chars.next();
                    tokens.push(Token::Dot);
                }
                '"' => {
                    chars.next();
                    let mut ident = String::new();
                    loop {
                        match chars.next() {
                            Some('"') => {
                                // Doubled quote is an escaped quote.
                                if chars.peek() == Some(&'"') {
                                    chars.next();
                                    ident.push('"');
                                } else {
                                    break;
                                }
                            }
                            Some(c) => ident.push(c),
                            None => {
                                return Err(EngineError::DdlParse(
                                    "unterminated quoted identifier".to_string(),
                                ))
                            }
                        }
                    }
                    tokens.push(Token::Quoted(ident));
                }
                c if c.is_ascii_alphanumeric() || c == '_' => {
                    let mut word = String::new();
                    while let Some(&c) = chars.peek() {
                        if c.is_ascii_alphanumeric() || c == '_' {
                            word.push(c);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    tokens.push(Token::Word(word));
                }
                other => {
                    return Err(EngineError::DdlParse(format!(
                        "unexpected character {other:?}"
                    )))
                }
            }
        }
        Ok(Self {
            tokens,
            position: 0,
        })
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> EngineResult<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            other => Err(EngineError::DdlParse(format!(
                "expected {expected:?}, found {other:?}"
            ))),
        }
    }

    fn eat(&mut self, expected: Token) -> bool {
        if self.tokens.get(self.position) == Some(&expected) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn peek_word(&self, word: &str) -> bool {
        matches!(self.tokens.get(self.position), Some(Token::Word(w)) if w == word)
    }

    fn expect_word(&mut self) -> EngineResult<String> {
        match self.next() {
            Some(Token::Word(w)) => Ok(w),
            other => Err(EngineError::DdlParse(format!(
                "expected word, found {other:?}"
            ))),
        }
    }

    /// Accepts either a quoted identifier or a plain bare word.
    fn expect_identifier(&mut self) -> EngineResult<String> {
        match self.next() {
            Some(Token::Quoted(s)) => Ok(s),
            Some(Token::Word(w)) => Ok(w),
            other => Err(EngineError::DdlParse(format!(
                "expected identifier, found {other:?}"
            ))),
        }
    }

    fn expect_end(&mut self) -> EngineResult<()> {
        match self.next() {
            None => Ok(()),
            Some(token) => Err(EngineError::DdlParse(format!(
                "trailing token {token:?}"
            ))),
        }
    }
}
