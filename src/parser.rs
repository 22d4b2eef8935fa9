// Expression parser
// Tokenizes the whole input up front, then builds the AST with Pratt parsing

use crate::ast::{
    AstNode, BinaryOp, KeyPresence, MatchArm, ObjectPatternEntry, PathSegment, Pattern, UnaryOp,
};
use crate::utils::{clip, format_number};
use crate::EvalError;
use std::sync::Arc;

/// Default nesting limit when no `EvalOptions` are supplied.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Namespaces whose members are reached with `Name.member`.
pub const NAMESPACES: &[&str] = &[
    "Math",
    "Date",
    "LocalDate",
    "LocalDateTime",
    "LocalTime",
    "JSON",
];

const TERNARY_BP: u8 = 5;
const UNARY_BP: u8 = 70;
const FRAGMENT_CHARS: usize = 24;

static EOF: Token = Token::Eof;

/// Token types for the lexer
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    String(String),
    Number(f64),
    True,
    False,
    Null,
    Regex { pattern: String, flags: String },

    Identifier(String),
    Dollar,
    At,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Equal,
    StrictEqual,
    NotEqual,
    StrictNotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
    Bang,
    Dot,
    DotDot,
    Ellipsis,
    Question,
    Colon,
    Arrow,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Comma,

    // Special
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::String(s) => format!("string \"{}\"", s),
            Token::Number(n) => format!("number {}", format_number(*n)),
            Token::True => "'true'".to_string(),
            Token::False => "'false'".to_string(),
            Token::Null => "'null'".to_string(),
            Token::Regex { pattern, flags } => format!("regex /{}/{}", pattern, flags),
            Token::Identifier(name) => format!("identifier '{}'", name),
            Token::Eof => "end of expression".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Token::Dollar => "$",
            Token::At => "@",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Equal => "==",
            Token::StrictEqual => "===",
            Token::NotEqual => "!=",
            Token::StrictNotEqual => "!==",
            Token::LessThan => "<",
            Token::LessThanOrEqual => "<=",
            Token::GreaterThan => ">",
            Token::GreaterThanOrEqual => ">=",
            Token::And => "&&",
            Token::Or => "||",
            Token::Bang => "!",
            Token::Dot => ".",
            Token::DotDot => "..",
            Token::Ellipsis => "...",
            Token::Question => "?",
            Token::Colon => ":",
            Token::Arrow => "=>",
            Token::LeftParen => "(",
            Token::RightParen => ")",
            Token::LeftBracket => "[",
            Token::RightBracket => "]",
            Token::LeftBrace => "{",
            Token::RightBrace => "}",
            Token::Comma => ",",
            _ => "?",
        }
    }

    /// Whether a `/` following this token starts a regex literal rather than a division.
    fn allows_regex_after(&self) -> bool {
        match self {
            Token::Identifier(name) => name == "typeof",
            Token::String(_)
            | Token::Number(_)
            | Token::True
            | Token::False
            | Token::Null
            | Token::Regex { .. }
            | Token::Dollar
            | Token::At
            | Token::Star
            | Token::RightParen
            | Token::RightBracket
            | Token::RightBrace => false,
            _ => true,
        }
    }
}

/// A token with the character offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

fn fragment_at(input: &[char], offset: usize) -> String {
    let start = offset.min(input.len());
    let rest: String = input[start..].iter().collect();
    clip(&rest, FRAGMENT_CHARS)
}

/// Lexer for tokenizing expressions
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    regex_allowed: bool,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            regex_allowed: true,
        }
    }

    /// Tokenize the whole input. The last token is always `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Spanned>, EvalError> {
        let mut tokens = Vec::new();
        loop {
            let spanned = self.next_token()?;
            let done = spanned.token == Token::Eof;
            tokens.push(spanned);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn error(&self, message: impl Into<String>, offset: usize) -> EvalError {
        EvalError::Syntax {
            message: message.into(),
            fragment: fragment_at(&self.input, offset),
            offset,
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        if self.position < self.input.len() {
            self.position += 1;
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn skip_comment(&mut self) -> Result<(), EvalError> {
        let start = self.position;
        self.advance(); // skip '/'
        self.advance(); // skip '*'

        // Find closing */
        loop {
            match self.current() {
                None => return Err(self.error("unclosed comment", start)),
                Some('*') if self.peek(1) == Some('/') => {
                    self.advance(); // skip '*'
                    self.advance(); // skip '/'
                    return Ok(());
                }
                Some(_) => self.advance(),
            }
        }
    }

    fn read_string(&mut self, quote_char: char) -> Result<String, EvalError> {
        let start = self.position;
        let mut result = String::new();
        self.advance(); // skip opening quote

        loop {
            match self.current() {
                None => return Err(self.error("unclosed string literal", start)),
                Some(ch) if ch == quote_char => {
                    self.advance(); // skip closing quote
                    return Ok(result);
                }
                Some('\\') => {
                    self.advance();
                    match self.current() {
                        None => return Err(self.error("unclosed string literal", start)),
                        Some('b') => result.push('\u{0008}'),
                        Some('f') => result.push('\u{000C}'),
                        Some('n') => result.push('\n'),
                        Some('r') => result.push('\r'),
                        Some('t') => result.push('\t'),
                        Some('u') => {
                            // Unicode escape sequence \uXXXX
                            let escape_at = self.position - 1;
                            self.advance();
                            let mut hex = String::new();
                            for _ in 0..4 {
                                match self.current() {
                                    Some(h) if h.is_ascii_hexdigit() => {
                                        hex.push(h);
                                        self.advance();
                                    }
                                    _ => {
                                        return Err(self.error("invalid unicode escape", escape_at))
                                    }
                                }
                            }
                            let ch = u32::from_str_radix(&hex, 16)
                                .ok()
                                .and_then(char::from_u32)
                                .ok_or_else(|| self.error("invalid unicode escape", escape_at))?;
                            result.push(ch);
                            continue; // Don't advance again
                        }
                        // \" \' \\ \/ and any other escaped character stand for themselves
                        Some(ch) => result.push(ch),
                    }
                    self.advance();
                }
                Some(ch) => {
                    result.push(ch);
                    self.advance();
                }
            }
        }
    }

    fn read_number(&mut self) -> Result<f64, EvalError> {
        let start = self.position;

        while self.current().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        // Fractional part; `1.foo` leaves the dot for the member access
        if self.current() == Some('.') && self.peek(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.current().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        // Exponent part
        if matches!(self.current(), Some('e') | Some('E')) {
            let digit_at = match self.peek(1) {
                Some('+') | Some('-') => 2,
                _ => 1,
            };
            if self.peek(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                for _ in 0..digit_at {
                    self.advance();
                }
                while self.current().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let num_str: String = self.input[start..self.position].iter().collect();
        num_str
            .parse()
            .map_err(|_| self.error(format!("invalid number '{}'", num_str), start))
    }

    fn read_identifier(&mut self) -> String {
        let start = self.position;

        while let Some(ch) = self.current() {
            // Continue if alphanumeric or underscore
            if ch.is_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }

        self.input[start..self.position].iter().collect()
    }

    fn read_regex(&mut self) -> Result<Token, EvalError> {
        let start = self.position;
        self.advance(); // skip opening '/'
        let mut pattern = String::new();
        let mut in_class = false;

        loop {
            match self.current() {
                None | Some('\n') => return Err(self.error("unterminated regex literal", start)),
                Some('\\') => {
                    pattern.push('\\');
                    self.advance();
                    match self.current() {
                        Some(ch) => pattern.push(ch),
                        None => return Err(self.error("unterminated regex literal", start)),
                    }
                }
                Some('[') => {
                    in_class = true;
                    pattern.push('[');
                }
                Some(']') => {
                    in_class = false;
                    pattern.push(']');
                }
                Some('/') if !in_class => break,
                Some(ch) => pattern.push(ch),
            }
            self.advance();
        }
        self.advance(); // skip closing '/'

        let mut flags = String::new();
        while let Some(ch) = self.current().filter(|c| c.is_ascii_alphabetic()) {
            if !matches!(ch, 'g' | 'i' | 'm' | 's') || flags.contains(ch) {
                return Err(self.error(format!("invalid regex flag '{}'", ch), self.position));
            }
            flags.push(ch);
            self.advance();
        }

        if pattern.is_empty() {
            return Err(self.error("empty regex literal", start));
        }
        Ok(Token::Regex { pattern, flags })
    }

    fn single(&mut self, len: usize, token: Token) -> Token {
        for _ in 0..len {
            self.advance();
        }
        token
    }

    pub fn next_token(&mut self) -> Result<Spanned, EvalError> {
        let token = loop {
            self.skip_whitespace();
            if self.current() == Some('/') && self.peek(1) == Some('*') {
                self.skip_comment()?;
                continue; // Skip whitespace again after comment
            }
            break self.scan_token()?;
        };
        self.regex_allowed = token.token.allows_regex_after();
        Ok(token)
    }

    fn scan_token(&mut self) -> Result<Spanned, EvalError> {
        let offset = self.position;
        let token = match self.current() {
            None => Token::Eof,

            // String literals
            Some('"') => Token::String(self.read_string('"')?),
            Some('\'') => Token::String(self.read_string('\'')?),

            // Numbers
            Some(ch) if ch.is_ascii_digit() => Token::Number(self.read_number()?),

            Some('/') if self.regex_allowed => self.read_regex()?,

            // Multi-character operators
            Some('.') if self.peek(1) == Some('.') && self.peek(2) == Some('.') => {
                self.single(3, Token::Ellipsis)
            }
            Some('.') if self.peek(1) == Some('.') => self.single(2, Token::DotDot),
            Some('=') if self.peek(1) == Some('=') && self.peek(2) == Some('=') => {
                self.single(3, Token::StrictEqual)
            }
            Some('=') if self.peek(1) == Some('=') => self.single(2, Token::Equal),
            Some('=') if self.peek(1) == Some('>') => self.single(2, Token::Arrow),
            Some('!') if self.peek(1) == Some('=') && self.peek(2) == Some('=') => {
                self.single(3, Token::StrictNotEqual)
            }
            Some('!') if self.peek(1) == Some('=') => self.single(2, Token::NotEqual),
            Some('>') if self.peek(1) == Some('=') => self.single(2, Token::GreaterThanOrEqual),
            Some('<') if self.peek(1) == Some('=') => self.single(2, Token::LessThanOrEqual),
            Some('&') if self.peek(1) == Some('&') => self.single(2, Token::And),
            Some('|') if self.peek(1) == Some('|') => self.single(2, Token::Or),

            // Single-character operators and delimiters
            Some('(') => self.single(1, Token::LeftParen),
            Some(')') => self.single(1, Token::RightParen),
            Some('[') => self.single(1, Token::LeftBracket),
            Some(']') => self.single(1, Token::RightBracket),
            Some('{') => self.single(1, Token::LeftBrace),
            Some('}') => self.single(1, Token::RightBrace),
            Some(',') => self.single(1, Token::Comma),
            Some(':') => self.single(1, Token::Colon),
            Some('?') => self.single(1, Token::Question),
            Some('.') => self.single(1, Token::Dot),
            Some('$') => self.single(1, Token::Dollar),
            Some('@') => self.single(1, Token::At),
            Some('+') => self.single(1, Token::Plus),
            Some('-') => self.single(1, Token::Minus),
            Some('*') => self.single(1, Token::Star),
            Some('/') => self.single(1, Token::Slash),
            Some('%') => self.single(1, Token::Percent),
            Some('<') => self.single(1, Token::LessThan),
            Some('>') => self.single(1, Token::GreaterThan),
            Some('!') => self.single(1, Token::Bang),

            // Identifiers and keywords
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                let ident = self.read_identifier();
                match ident.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    _ => Token::Identifier(ident),
                }
            }

            Some(ch) => return Err(self.error(format!("unexpected character '{}'", ch), offset)),
        };
        Ok(Spanned { token, offset })
    }
}

/// Parser for expressions using Pratt parsing
pub struct Parser {
    source: Vec<char>,
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    pub fn new(input: &str, max_depth: usize) -> Result<Self, EvalError> {
        let tokens = Lexer::new(input).tokenize()?;
        Ok(Parser {
            source: input.chars().collect(),
            tokens,
            pos: 0,
            depth: 0,
            max_depth,
        })
    }

    /// Parse a complete expression; trailing tokens are an error.
    pub fn parse(mut self) -> Result<AstNode, EvalError> {
        let node = self.parse_expression(0)?;
        if *self.current() != Token::Eof {
            return Err(self.unexpected());
        }
        Ok(node)
    }

    // ── Token cursor ─────────────────────────────────────────────────────────

    fn current(&self) -> &Token {
        self.peek(0)
    }

    fn peek(&self, n: usize) -> &Token {
        let idx = (self.pos + n).min(self.tokens.len().saturating_sub(1));
        self.tokens
            .get(idx)
            .map(|spanned| &spanned.token)
            .unwrap_or(&EOF)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|spanned| spanned.offset)
            .unwrap_or(self.source.len())
    }

    fn advance(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn error_at(&self, message: impl Into<String>, offset: usize) -> EvalError {
        EvalError::Syntax {
            message: message.into(),
            fragment: fragment_at(&self.source, offset),
            offset,
        }
    }

    fn path_error_at(&self, message: impl Into<String>, offset: usize) -> EvalError {
        EvalError::PathSyntax {
            message: message.into(),
            fragment: fragment_at(&self.source, offset),
            offset,
        }
    }

    fn unexpected(&self) -> EvalError {
        let message = match self.current() {
            Token::Eof => "unexpected end of expression (missing operand?)".to_string(),
            other => format!("unexpected {}", other.describe()),
        };
        self.error_at(message, self.offset())
    }

    fn expect(&mut self, expected: Token, opened_at: Option<usize>) -> Result<(), EvalError> {
        if *self.current() == expected {
            self.advance();
            return Ok(());
        }
        Err(match (self.current(), opened_at) {
            (Token::Eof, Some(at)) => {
                self.error_at(format!("unclosed delimiter, expected '{}'", expected.symbol()), at)
            }
            (found, _) => self.error_at(
                format!("expected '{}', found {}", expected.symbol(), found.describe()),
                self.offset(),
            ),
        })
    }

    fn enter(&mut self) -> Result<(), EvalError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            self.depth -= 1;
            log::warn!("parser nesting limit {} reached", self.max_depth);
            return Err(EvalError::ResourceLimitExceeded(format!(
                "expression nesting deeper than {}",
                self.max_depth
            )));
        }
        Ok(())
    }

    // ── Expressions ──────────────────────────────────────────────────────────

    /// Parse an expression with Pratt parsing
    fn parse_expression(&mut self, min_bp: u8) -> Result<AstNode, EvalError> {
        self.enter()?;
        let result = self.parse_expression_inner(min_bp);
        self.depth -= 1;
        result
    }

    fn parse_expression_inner(&mut self, min_bp: u8) -> Result<AstNode, EvalError> {
        let mut lhs = self.parse_prefix()?;

        loop {
            if *self.current() == Token::Question {
                if TERNARY_BP < min_bp {
                    break;
                }
                let question_at = self.offset();
                self.advance();
                let then_branch = self.parse_expression(0)?;
                if *self.current() != Token::Colon {
                    return Err(match self.current() {
                        Token::Eof => self.error_at("ternary is missing ':'", question_at),
                        _ => self.unexpected(),
                    });
                }
                self.advance();
                // Right associative: a ? b : c ? d : e
                let else_branch = self.parse_expression(TERNARY_BP)?;
                lhs = AstNode::Conditional {
                    condition: Box::new(lhs),
                    then_branch: Box::new(then_branch),
                    else_branch: Box::new(else_branch),
                };
                continue;
            }

            if matches!(self.current(), Token::Identifier(name) if name == "instanceof") {
                if BinaryOp::LessThan.precedence() * 10 < min_bp {
                    break;
                }
                self.advance();
                let type_name = match self.current() {
                    Token::Identifier(name) => name.clone(),
                    Token::Null => "Null".to_string(),
                    _ => return Err(self.unexpected()),
                };
                self.advance();
                lhs = AstNode::InstanceOf {
                    value: Box::new(lhs),
                    type_name,
                };
                continue;
            }

            let op = match binary_op(self.current()) {
                Some(op) => op,
                None => break,
            };
            let left_bp = op.precedence() * 10;
            if left_bp < min_bp {
                break;
            }
            self.advance();
            let rhs = self.parse_expression(left_bp + 1)?;
            lhs = AstNode::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }

        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<AstNode, EvalError> {
        let op = match self.current() {
            Token::Bang => UnaryOp::Not,
            Token::Minus => UnaryOp::Negate,
            Token::Plus => UnaryOp::Plus,
            Token::Identifier(name) if name == "typeof" => UnaryOp::TypeOf,
            _ => {
                let primary = self.parse_primary()?;
                return self.parse_postfix(primary);
            }
        };
        self.advance();
        let operand = self.parse_expression(UNARY_BP)?;
        Ok(match (op, operand) {
            (UnaryOp::Negate, AstNode::Number(n)) => AstNode::Number(-n),
            (op, operand) => AstNode::Unary {
                op,
                operand: Box::new(operand),
            },
        })
    }

    /// Parse a primary expression (literals, identifiers, paths, grouping)
    fn parse_primary(&mut self) -> Result<AstNode, EvalError> {
        let start = self.offset();
        match self.current().clone() {
            Token::String(s) => {
                self.advance();
                Ok(AstNode::String(s))
            }
            Token::Number(n) => {
                self.advance();
                Ok(AstNode::Number(n))
            }
            Token::True => {
                self.advance();
                Ok(AstNode::Boolean(true))
            }
            Token::False => {
                self.advance();
                Ok(AstNode::Boolean(false))
            }
            Token::Null => {
                self.advance();
                Ok(AstNode::Null)
            }
            Token::Regex { pattern, flags } => {
                self.advance();
                Ok(AstNode::Regex { pattern, flags })
            }
            Token::Dollar => {
                self.advance();
                Ok(AstNode::Root)
            }
            Token::At => {
                self.advance();
                Ok(AstNode::Current)
            }
            Token::LeftParen => {
                if self.at_arrow_params() {
                    return self.parse_lambda();
                }
                self.advance(); // skip '('
                let inner = self.parse_expression(0)?;
                self.expect(Token::RightParen, Some(start))?;
                Ok(inner)
            }
            Token::LeftBracket => {
                self.advance(); // skip '['
                let mut elements = Vec::new();
                while *self.current() != Token::RightBracket {
                    elements.push(self.parse_expression(0)?);
                    if *self.current() != Token::Comma {
                        break;
                    }
                    self.advance();
                }
                self.expect(Token::RightBracket, Some(start))?;
                Ok(AstNode::Array(elements))
            }
            Token::LeftBrace => self.parse_object_literal(),
            Token::Identifier(name) => self.parse_identifier(name),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_object_literal(&mut self) -> Result<AstNode, EvalError> {
        let start = self.offset();
        self.advance(); // skip '{'

        let mut pairs = Vec::new();
        while *self.current() != Token::RightBrace {
            let key = match self.current().clone() {
                Token::String(s) | Token::Identifier(s) => s,
                Token::Number(n) => format_number(n),
                Token::True => "true".to_string(),
                Token::False => "false".to_string(),
                Token::Null => "null".to_string(),
                Token::Eof => return Err(self.error_at("unclosed delimiter, expected '}'", start)),
                _ => return Err(self.unexpected()),
            };
            self.advance();
            self.expect(Token::Colon, None)?;
            let value = self.parse_expression(0)?;
            pairs.push((key, value));

            if *self.current() != Token::Comma {
                break;
            }
            self.advance();
        }

        self.expect(Token::RightBrace, Some(start))?;
        Ok(AstNode::Object(pairs))
    }

    fn parse_identifier(&mut self, name: String) -> Result<AstNode, EvalError> {
        if *self.peek(1) == Token::Arrow {
            return self.parse_lambda();
        }
        if name == "match" && !matches!(self.peek(1), Token::LeftParen | Token::Eof) {
            return self.parse_match();
        }

        self.advance();

        if NAMESPACES.contains(&name.as_str()) && *self.current() == Token::Dot {
            self.advance();
            let member = match self.current() {
                Token::Identifier(member) => member.clone(),
                _ => return Err(self.unexpected()),
            };
            self.advance();
            if *self.current() == Token::LeftParen {
                let args = self.parse_args()?;
                return Ok(AstNode::FunctionCall {
                    receiver: None,
                    namespace: Some(name),
                    name: member,
                    args,
                });
            }
            return Ok(AstNode::NamespaceMember {
                namespace: name,
                name: member,
            });
        }

        if *self.current() == Token::LeftParen {
            let args = self.parse_args()?;
            return Ok(AstNode::FunctionCall {
                receiver: None,
                namespace: None,
                name,
                args,
            });
        }

        Ok(match name.as_str() {
            "NaN" => AstNode::Number(f64::NAN),
            "Infinity" => AstNode::Number(f64::INFINITY),
            "undefined" => AstNode::Null,
            _ => AstNode::Variable(name),
        })
    }

    /// `(a, b) =>` lookahead starting at the current `(`.
    fn at_arrow_params(&self) -> bool {
        let mut n = 1;
        if *self.peek(n) == Token::RightParen {
            return *self.peek(n + 1) == Token::Arrow;
        }
        loop {
            if !matches!(self.peek(n), Token::Identifier(_)) {
                return false;
            }
            n += 1;
            match self.peek(n) {
                Token::Comma => n += 1,
                Token::RightParen => return *self.peek(n + 1) == Token::Arrow,
                _ => return false,
            }
        }
    }

    fn parse_lambda(&mut self) -> Result<AstNode, EvalError> {
        let mut params = Vec::new();
        match self.current().clone() {
            Token::Identifier(name) => {
                params.push(name);
                self.advance();
            }
            _ => {
                self.advance(); // skip '('
                while let Token::Identifier(name) = self.current().clone() {
                    params.push(name);
                    self.advance();
                    if *self.current() == Token::Comma {
                        self.advance();
                    }
                }
                self.expect(Token::RightParen, None)?;
            }
        }
        self.expect(Token::Arrow, None)?;
        let body = self.parse_expression(0)?;
        Ok(AstNode::Lambda {
            params,
            body: Arc::new(body),
        })
    }

    fn parse_args(&mut self) -> Result<Vec<AstNode>, EvalError> {
        let start = self.offset();
        self.expect(Token::LeftParen, None)?;
        let mut args = Vec::new();
        while *self.current() != Token::RightParen {
            args.push(self.parse_expression(0)?);
            match self.current() {
                Token::Comma => self.advance(),
                Token::RightParen => break,
                Token::Eof => return Err(self.error_at("unclosed delimiter, expected ')'", start)),
                _ => return Err(self.unexpected()),
            }
        }
        self.expect(Token::RightParen, Some(start))?;
        Ok(args)
    }

    // ── Paths and method chains ──────────────────────────────────────────────

    fn parse_postfix(&mut self, mut node: AstNode) -> Result<AstNode, EvalError> {
        loop {
            match self.current() {
                Token::Dot => {
                    let dot_at = self.offset();
                    self.advance();
                    let name = match self.current().clone() {
                        Token::Identifier(name) => name,
                        Token::True => "true".to_string(),
                        Token::False => "false".to_string(),
                        Token::Null => "null".to_string(),
                        Token::Star => {
                            self.advance();
                            node = node.with_segment(PathSegment::Wildcard);
                            continue;
                        }
                        _ => return Err(self.path_error_at("expected field name after '.'", dot_at)),
                    };
                    self.advance();
                    if *self.current() == Token::LeftParen {
                        let args = self.parse_args()?;
                        node = AstNode::FunctionCall {
                            receiver: Some(Box::new(node)),
                            namespace: None,
                            name,
                            args,
                        };
                    } else {
                        node = node.with_segment(PathSegment::Field(name));
                    }
                }
                Token::DotDot => {
                    let dots_at = self.offset();
                    self.advance();
                    let name = match self.current() {
                        Token::Identifier(name) => name.clone(),
                        _ => {
                            return Err(
                                self.path_error_at("expected field name after '..'", dots_at)
                            )
                        }
                    };
                    self.advance();
                    node = node.with_segment(PathSegment::RecursiveDescent(name));
                }
                Token::LeftBracket => {
                    let segment = self.parse_bracket_segment()?;
                    node = node.with_segment(segment);
                }
                _ => return Ok(node),
            }
        }
    }

    fn parse_bracket_segment(&mut self) -> Result<PathSegment, EvalError> {
        let open_at = self.offset();
        self.advance(); // skip '['

        let segment = match (self.current().clone(), self.peek(1).clone()) {
            (Token::Star, Token::RightBracket) => {
                self.advance();
                PathSegment::Wildcard
            }
            (Token::Number(n), Token::RightBracket) if n.fract() == 0.0 => {
                self.advance();
                PathSegment::Index(n as i64)
            }
            (Token::String(s), Token::RightBracket) => {
                self.advance();
                PathSegment::Field(s)
            }
            (Token::RightBracket, _) => {
                return Err(self.path_error_at("empty brackets in path", open_at));
            }
            (Token::Question, _) => {
                self.advance();
                if *self.current() != Token::LeftParen {
                    return Err(self.path_error_at("filter must be written [?(...)]", open_at));
                }
                let paren_at = self.offset();
                self.advance();
                let predicate = self.parse_expression(0)?;
                if *self.current() != Token::RightParen {
                    return Err(self.path_error_at("unclosed filter predicate", paren_at));
                }
                self.advance();
                PathSegment::Filter(Box::new(predicate))
            }
            _ => PathSegment::Dynamic(Box::new(self.parse_expression(0)?)),
        };

        if *self.current() != Token::RightBracket {
            return Err(self.path_error_at("unbalanced '[' in path", open_at));
        }
        self.advance();
        Ok(segment)
    }

    // ── match ────────────────────────────────────────────────────────────────

    fn parse_match(&mut self) -> Result<AstNode, EvalError> {
        let match_at = self.offset();
        self.advance(); // skip 'match'
        let subject = self.parse_expression(0)?;
        let brace_at = self.offset();
        self.expect(Token::LeftBrace, None)?;

        let mut arms = Vec::new();
        while *self.current() != Token::RightBrace {
            if *self.current() == Token::Eof {
                return Err(self.error_at("unclosed match block", brace_at));
            }
            let arm_at = self.offset();
            let pattern = self.parse_pattern()?;
            if arms
                .iter()
                .any(|arm: &MatchArm| arm.pattern == Pattern::Wildcard)
            {
                return Err(self.error_at("'_' must be the last match arm", arm_at));
            }
            self.expect(Token::Arrow, None)?;
            let body = self.parse_expression(0)?;
            arms.push(MatchArm { pattern, body });

            if *self.current() != Token::Comma {
                break;
            }
            self.advance();
        }
        self.expect(Token::RightBrace, Some(brace_at))?;

        if arms.is_empty() {
            return Err(self.error_at("match needs at least one arm", match_at));
        }
        Ok(AstNode::Match {
            subject: Box::new(subject),
            arms,
        })
    }

    fn parse_pattern(&mut self) -> Result<Pattern, EvalError> {
        self.enter()?;
        let result = self.parse_pattern_inner();
        self.depth -= 1;
        result
    }

    fn parse_pattern_inner(&mut self) -> Result<Pattern, EvalError> {
        let start = self.offset();
        let pattern = match self.current().clone() {
            Token::Identifier(name) if name == "_" => Pattern::Wildcard,
            Token::String(s) => Pattern::String(s),
            Token::Number(n) => Pattern::Number(n),
            Token::Minus => match self.peek(1) {
                Token::Number(n) => {
                    let n = *n;
                    self.advance();
                    Pattern::Number(-n)
                }
                _ => return Err(self.error_at("invalid pattern", start)),
            },
            Token::True => Pattern::Boolean(true),
            Token::False => Pattern::Boolean(false),
            Token::Null => Pattern::Null,
            Token::Regex { pattern, flags } => Pattern::Regex { pattern, flags },
            Token::LeftBrace => return self.parse_object_pattern(),
            Token::LeftBracket => return self.parse_array_pattern(),
            _ => return Err(self.error_at("invalid pattern", start)),
        };
        self.advance();
        Ok(pattern)
    }

    fn parse_object_pattern(&mut self) -> Result<Pattern, EvalError> {
        let start = self.offset();
        self.advance(); // skip '{'

        let mut entries = Vec::new();
        while *self.current() != Token::RightBrace {
            let key = match self.current().clone() {
                Token::String(s) | Token::Identifier(s) => s,
                Token::Eof => return Err(self.error_at("unclosed object pattern", start)),
                _ => return Err(self.error_at("invalid pattern key", self.offset())),
            };
            self.advance();
            let presence = match self.current() {
                Token::Question => KeyPresence::Optional,
                Token::Bang => KeyPresence::Required,
                _ => KeyPresence::Plain,
            };
            if presence != KeyPresence::Plain {
                self.advance();
            }
            self.expect(Token::Colon, None)?;
            let value = self.parse_pattern()?;
            entries.push(ObjectPatternEntry {
                key,
                presence,
                value,
            });

            if *self.current() != Token::Comma {
                break;
            }
            self.advance();
        }
        self.expect(Token::RightBrace, Some(start))?;
        Ok(Pattern::Object(entries))
    }

    fn parse_array_pattern(&mut self) -> Result<Pattern, EvalError> {
        let start = self.offset();
        self.advance(); // skip '['

        let mut prefix = Vec::new();
        let mut suffix = Vec::new();
        let mut spread = false;
        while *self.current() != Token::RightBracket {
            if *self.current() == Token::Ellipsis {
                if spread {
                    return Err(self.error_at("only one '...' allowed per array pattern", self.offset()));
                }
                spread = true;
                self.advance();
            } else {
                let item = self.parse_pattern()?;
                if spread {
                    suffix.push(item);
                } else {
                    prefix.push(item);
                }
            }
            if *self.current() != Token::Comma {
                break;
            }
            self.advance();
        }
        self.expect(Token::RightBracket, Some(start))?;
        Ok(Pattern::Array {
            prefix,
            suffix,
            spread,
        })
    }
}

fn binary_op(token: &Token) -> Option<BinaryOp> {
    Some(match token {
        Token::Or => BinaryOp::Or,
        Token::And => BinaryOp::And,
        Token::Equal => BinaryOp::Equal,
        Token::NotEqual => BinaryOp::NotEqual,
        Token::StrictEqual => BinaryOp::StrictEqual,
        Token::StrictNotEqual => BinaryOp::StrictNotEqual,
        Token::LessThan => BinaryOp::LessThan,
        Token::LessThanOrEqual => BinaryOp::LessThanOrEqual,
        Token::GreaterThan => BinaryOp::GreaterThan,
        Token::GreaterThanOrEqual => BinaryOp::GreaterThanOrEqual,
        Token::Plus => BinaryOp::Add,
        Token::Minus => BinaryOp::Subtract,
        Token::Star => BinaryOp::Multiply,
        Token::Slash => BinaryOp::Divide,
        Token::Percent => BinaryOp::Modulo,
        _ => return None,
    })
}

/// Parse expression text into an AST.
pub fn parse(input: &str) -> Result<AstNode, EvalError> {
    parse_with_depth(input, DEFAULT_MAX_DEPTH)
}

/// Parse with an explicit nesting limit.
pub fn parse_with_depth(input: &str, max_depth: usize) -> Result<AstNode, EvalError> {
    Parser::new(input, max_depth)?.parse()
}

/// Parse a standalone path string (`$.a[0].b`, `a.b`, `[0]`).
///
/// Every syntax problem is reported as a path syntax error, and anything that
/// is not a plain accessor chain is rejected.
pub fn parse_path(path: &str, max_depth: usize) -> Result<AstNode, EvalError> {
    let trimmed = path.trim();
    let (text, shift) = if trimmed.starts_with('$') {
        (trimmed.to_string(), 0)
    } else if trimmed.starts_with('[') {
        (format!("${}", trimmed), 1)
    } else {
        (format!("$.{}", trimmed), 2)
    };

    let as_path_error = |e: EvalError| match e {
        EvalError::Syntax {
            message,
            fragment,
            offset,
        }
        | EvalError::PathSyntax {
            message,
            fragment,
            offset,
        } => EvalError::PathSyntax {
            message,
            fragment,
            offset: offset.saturating_sub(shift),
        },
        other => other,
    };

    let node = parse_with_depth(&text, max_depth).map_err(as_path_error)?;
    match &node {
        AstNode::Root => Ok(node),
        AstNode::Path { base, .. } if **base == AstNode::Root => Ok(node),
        _ => Err(EvalError::PathSyntax {
            message: "not a path".to_string(),
            fragment: clip(trimmed, FRAGMENT_CHARS),
            offset: 0,
        }),
    }
}
