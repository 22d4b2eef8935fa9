// Abstract Syntax Tree definitions
// Built once per parse, immutable afterwards

use std::sync::Arc;

/// One accessor in a `$`-rooted (or `@`-rooted) path.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    /// `.name` or `['name']`
    Field(String),

    /// `[n]`
    Index(i64),

    /// `[*]` or `.*`
    Wildcard,

    /// `..name`: every value stored under `name` anywhere below, pre-order
    RecursiveDescent(String),

    /// `[?(predicate)]` with `@` bound to each candidate element
    Filter(Box<AstNode>),

    /// `[expr]`: a number selects an index, a string selects a field
    Dynamic(Box<AstNode>),
}

/// AST Node types
#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    /// String literal (e.g., "hello", 'world')
    String(String),

    /// Number literal
    Number(f64),

    /// Boolean literal
    Boolean(bool),

    /// Null literal
    Null,

    /// Regex literal (e.g., /pattern/flags)
    Regex { pattern: String, flags: String },

    /// `$`: the document root
    Root,

    /// `@`: the element under test inside a filter predicate
    Current,

    /// Bare identifier, resolved against callback parameters and constants
    Variable(String),

    /// Accessor chain applied to a base expression
    Path {
        base: Box<AstNode>,
        segments: Vec<PathSegment>,
    },

    /// Builtin call. `receiver` is set for method calls (`$.s.trim()`),
    /// `namespace` for `Math.max(...)`, neither for globals (`parseInt(...)`).
    FunctionCall {
        receiver: Option<Box<AstNode>>,
        namespace: Option<String>,
        name: String,
        args: Vec<AstNode>,
    },

    /// Namespace constant (e.g., Math.PI)
    NamespaceMember { namespace: String, name: String },

    /// Binary operation
    Binary {
        op: BinaryOp,
        lhs: Box<AstNode>,
        rhs: Box<AstNode>,
    },

    /// Unary operation
    Unary { op: UnaryOp, operand: Box<AstNode> },

    /// `value instanceof TypeName`
    InstanceOf {
        value: Box<AstNode>,
        type_name: String,
    },

    /// Conditional expression (? :)
    Conditional {
        condition: Box<AstNode>,
        then_branch: Box<AstNode>,
        else_branch: Box<AstNode>,
    },

    /// `match subject { pattern => result, ..., _ => default }`
    Match {
        subject: Box<AstNode>,
        arms: Vec<MatchArm>,
    },

    /// Arrow function definition
    Lambda {
        params: Vec<String>,
        body: Arc<AstNode>,
    },

    /// Array constructor
    Array(Vec<AstNode>),

    /// Object constructor; keys are always literal
    Object(Vec<(String, AstNode)>),
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,

    // Comparison
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,

    // Logical
    And,
    Or,
}

impl BinaryOp {
    /// Precedence level; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::StrictEqual
            | BinaryOp::StrictNotEqual => 3,
            BinaryOp::LessThan
            | BinaryOp::LessThanOrEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterThanOrEqual => 4,
            BinaryOp::Add | BinaryOp::Subtract => 5,
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => 6,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::StrictEqual => "===",
            BinaryOp::StrictNotEqual => "!==",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Negation (-)
    Negate,

    /// Numeric coercion (+)
    Plus,

    /// Logical NOT
    Not,

    /// typeof
    TypeOf,
}

/// One `pattern => result` clause of a match expression.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub body: AstNode,
}

/// How an object pattern constrains one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPresence {
    /// `key: p`: present and matching
    Plain,
    /// `key?: p`: absent, or present and matching
    Optional,
    /// `key!: p`: present, non-null and matching
    Required,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectPatternEntry {
    pub key: String,
    pub presence: KeyPresence,
    pub value: Pattern,
}

/// Structural patterns accepted on the left of `=>`.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// `_`
    Wildcard,

    String(String),
    Number(f64),
    Boolean(bool),
    Null,

    Regex { pattern: String, flags: String },

    Object(Vec<ObjectPatternEntry>),

    /// Element patterns around an optional `...` spread.
    Array {
        prefix: Vec<Pattern>,
        suffix: Vec<Pattern>,
        spread: bool,
    },
}

impl AstNode {
    /// Create a string literal node
    pub fn string(s: impl Into<String>) -> Self {
        AstNode::String(s.into())
    }

    /// Create a number literal node
    pub fn number(n: f64) -> Self {
        AstNode::Number(n)
    }

    /// Create a boolean literal node
    pub fn boolean(b: bool) -> Self {
        AstNode::Boolean(b)
    }

    /// Create a null literal node
    pub fn null() -> Self {
        AstNode::Null
    }

    /// Create a variable reference node
    pub fn variable(name: impl Into<String>) -> Self {
        AstNode::Variable(name.into())
    }

    /// Wrap `self` in a path, or extend it when it already is one.
    pub fn with_segment(self, segment: PathSegment) -> Self {
        match self {
            AstNode::Path { base, mut segments } => {
                segments.push(segment);
                AstNode::Path { base, segments }
            }
            other => AstNode::Path {
                base: Box::new(other),
                segments: vec![segment],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ast_node_creation() {
        let str_node = AstNode::string("hello");
        assert!(matches!(str_node, AstNode::String(_)));

        let num_node = AstNode::number(42.0);
        assert!(matches!(num_node, AstNode::Number(_)));

        let bool_node = AstNode::boolean(true);
        assert!(matches!(bool_node, AstNode::Boolean(_)));

        let null_node = AstNode::null();
        assert!(matches!(null_node, AstNode::Null));
    }

    #[test]
    fn test_precedence_table() {
        assert!(BinaryOp::Or.precedence() < BinaryOp::And.precedence());
        assert!(BinaryOp::And.precedence() < BinaryOp::Equal.precedence());
        assert!(BinaryOp::StrictEqual.precedence() < BinaryOp::LessThan.precedence());
        assert!(BinaryOp::GreaterThan.precedence() < BinaryOp::Add.precedence());
        assert!(BinaryOp::Subtract.precedence() < BinaryOp::Multiply.precedence());
        assert_eq!(BinaryOp::Divide.precedence(), 6);
    }

    #[test]
    fn test_with_segment_flattens() {
        let node = AstNode::Root
            .with_segment(PathSegment::Field("a".into()))
            .with_segment(PathSegment::Index(0));
        match node {
            AstNode::Path { base, segments } => {
                assert_eq!(*base, AstNode::Root);
                assert_eq!(segments.len(), 2);
            }
            other => panic!("expected path, got {:?}", other),
        }
    }
}
