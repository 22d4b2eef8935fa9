// Expression evaluator
// Walks the AST against a document, delegating paths to the resolver,
// method calls to the function library and `match` arms to the pattern matcher

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::ast::{AstNode, BinaryOp, MatchArm, UnaryOp};
use crate::functions::{self, global, CallbackHost};
use crate::parser;
use crate::path::{self, SegmentEvaluator};
use crate::pattern;
use crate::utils::clip;
use crate::value::{JValue, Lambda};
use crate::EvalError;

/// Limits applied to a single evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvalOptions {
    /// Bounds parser nesting, evaluator recursion and recursive descent.
    pub max_depth: usize,
    /// Bounds node evaluations plus callback invocations.
    pub max_steps: u64,
    /// Largest string, in bytes, that concatenation or `repeat` may build.
    pub max_string_length: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        EvalOptions {
            max_depth: parser::DEFAULT_MAX_DEPTH,
            max_steps: 1_000_000,
            max_string_length: 1 << 26,
        }
    }
}

impl EvalOptions {
    /// Load options from JSON text; missing fields keep their defaults.
    pub fn from_json_str(s: &str) -> Result<Self, EvalError> {
        Ok(serde_json::from_str(s)?)
    }
}

/// Evaluation context
///
/// A stack of scopes holding callback parameters and `@`. Lookups search
/// from the innermost scope outwards.
#[derive(Debug)]
pub struct Context {
    scopes: Vec<HashMap<String, JValue>>,
}

impl Context {
    pub fn new() -> Self {
        Context {
            scopes: vec![HashMap::new()],
        }
    }

    /// Rebuild a context from captured bindings; later entries shadow earlier ones.
    fn from_bindings(bindings: &[(String, JValue)]) -> Self {
        let mut context = Context::new();
        for (name, value) in bindings {
            context.bind(name.clone(), value.clone());
        }
        context
    }

    pub fn bind(&mut self, name: String, value: JValue) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, value);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&JValue> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Every visible binding, outermost first.
    pub fn snapshot(&self) -> Vec<(String, JValue)> {
        self.scopes
            .iter()
            .flat_map(|scope| scope.iter().map(|(k, v)| (k.clone(), v.clone())))
            .collect()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluator for snap expressions
pub struct Evaluator {
    context: Context,
    options: EvalOptions,
    depth: usize,
    steps: u64,
}

impl Evaluator {
    pub fn new() -> Self {
        Evaluator::with_options(EvalOptions::default())
    }

    pub fn with_options(options: EvalOptions) -> Self {
        Evaluator {
            context: Context::new(),
            options,
            depth: 0,
            steps: 0,
        }
    }

    pub fn options(&self) -> &EvalOptions {
        &self.options
    }

    /// Evaluate an AST node with `root` as `$`.
    pub fn evaluate(&mut self, node: &AstNode, root: &JValue) -> Result<JValue, EvalError> {
        log::debug!(
            "evaluate: max_depth={} max_steps={}",
            self.options.max_depth,
            self.options.max_steps
        );
        self.eval(node, root)
    }

    fn tick(&mut self) -> Result<(), EvalError> {
        self.steps += 1;
        if self.steps > self.options.max_steps {
            log::warn!("step limit of {} exceeded", self.options.max_steps);
            return Err(EvalError::ResourceLimitExceeded(format!(
                "more than {} evaluation steps",
                self.options.max_steps
            )));
        }
        Ok(())
    }

    fn eval(&mut self, node: &AstNode, root: &JValue) -> Result<JValue, EvalError> {
        self.tick()?;
        self.depth += 1;
        if self.depth > self.options.max_depth {
            self.depth -= 1;
            log::warn!("recursion limit of {} exceeded", self.options.max_depth);
            return Err(EvalError::ResourceLimitExceeded(format!(
                "recursion deeper than {}",
                self.options.max_depth
            )));
        }
        let result = self.eval_node(node, root);
        self.depth -= 1;
        result
    }

    fn eval_node(&mut self, node: &AstNode, root: &JValue) -> Result<JValue, EvalError> {
        match node {
            AstNode::String(s) => Ok(JValue::string(s.as_str())),
            AstNode::Number(n) => Ok(JValue::Number(*n)),
            AstNode::Boolean(b) => Ok(JValue::Bool(*b)),
            AstNode::Null => Ok(JValue::Null),
            AstNode::Regex { pattern, flags } => Ok(JValue::regex(pattern.as_str(), flags.as_str())),

            AstNode::Root => Ok(root.clone()),
            AstNode::Current => self
                .context
                .lookup("@")
                .cloned()
                .ok_or_else(|| EvalError::type_error("'@' is only defined inside a filter")),
            AstNode::Variable(name) => self
                .context
                .lookup(name)
                .cloned()
                .ok_or_else(|| EvalError::type_error(format!("'{}' is not defined", name))),

            AstNode::Path { base, segments } => {
                let start = self.eval(base, root)?;
                path::resolve(start, segments, root, self)
            }

            AstNode::FunctionCall {
                receiver,
                namespace,
                name,
                args,
            } => self.eval_call(receiver.as_deref(), namespace.as_deref(), name, args, root),

            AstNode::NamespaceMember { namespace, name } => functions::namespace_member(namespace, name),

            AstNode::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs, root),

            AstNode::Unary { op, operand } => {
                let value = self.eval(operand, root)?;
                Ok(match op {
                    UnaryOp::Negate => JValue::Number(-value.to_number()),
                    UnaryOp::Plus => JValue::Number(value.to_number()),
                    UnaryOp::Not => JValue::Bool(!value.is_truthy()),
                    UnaryOp::TypeOf => JValue::from(value.type_name()),
                })
            }

            AstNode::InstanceOf { value, type_name } => {
                let value = self.eval(value, root)?;
                Ok(JValue::Bool(global::instance_of(&value, type_name)))
            }

            AstNode::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                // Only the taken branch is evaluated
                if self.eval(condition, root)?.is_truthy() {
                    self.eval(then_branch, root)
                } else {
                    self.eval(else_branch, root)
                }
            }

            AstNode::Match { subject, arms } => {
                let subject = self.eval(subject, root)?;
                self.eval_match(&subject, arms, root)
            }

            AstNode::Lambda { params, body } => Ok(JValue::Lambda(Arc::new(Lambda {
                params: params.clone(),
                body: Arc::clone(body),
                captured: self.context.snapshot(),
            }))),

            AstNode::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval(item, root)?);
                }
                Ok(JValue::array(out))
            }

            AstNode::Object(entries) => {
                let mut map = IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(key.clone(), self.eval(value, root)?);
                }
                Ok(JValue::object(map))
            }
        }
    }

    fn eval_call(
        &mut self,
        receiver: Option<&AstNode>,
        namespace: Option<&str>,
        name: &str,
        args: &[AstNode],
        root: &JValue,
    ) -> Result<JValue, EvalError> {
        let receiver = match receiver {
            Some(node) => Some(self.eval(node, root)?),
            None => None,
        };
        let mut values = Vec::with_capacity(args.len());
        for a in args {
            values.push(self.eval(a, root)?);
        }

        match (receiver, namespace) {
            (Some(receiver), _) => functions::call_method(self, root, &receiver, name, &values),
            (None, Some(namespace)) => functions::call_namespace(namespace, name, &values),
            (None, None) => match self.context.lookup(name) {
                Some(JValue::Lambda(f)) => {
                    let f = Arc::clone(f);
                    self.call(&f, &values, root)
                }
                _ => functions::call_global(self, root, name, &values),
            },
        }
    }

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        lhs: &AstNode,
        rhs: &AstNode,
        root: &JValue,
    ) -> Result<JValue, EvalError> {
        let left = self.eval(lhs, root)?;

        // && and || yield an operand, not a coerced boolean
        match op {
            BinaryOp::And if !left.is_truthy() => return Ok(left),
            BinaryOp::Or if left.is_truthy() => return Ok(left),
            _ => {}
        }

        let right = self.eval(rhs, root)?;
        Ok(match op {
            BinaryOp::Add => add(&left, &right, self.options.max_string_length)?,
            BinaryOp::Subtract => JValue::Number(left.to_number() - right.to_number()),
            BinaryOp::Multiply => JValue::Number(left.to_number() * right.to_number()),
            BinaryOp::Divide => {
                let divisor = right.to_number();
                if divisor == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                JValue::Number(left.to_number() / divisor)
            }
            BinaryOp::Modulo => JValue::Number(left.to_number() % right.to_number()),

            BinaryOp::Equal => JValue::Bool(left.equals(&right, false)),
            BinaryOp::NotEqual => JValue::Bool(!left.equals(&right, false)),
            BinaryOp::StrictEqual => JValue::Bool(left.equals(&right, true)),
            BinaryOp::StrictNotEqual => JValue::Bool(!left.equals(&right, true)),

            BinaryOp::LessThan => JValue::Bool(compare(&left, &right) == Some(Ordering::Less)),
            BinaryOp::LessThanOrEqual => JValue::Bool(matches!(
                compare(&left, &right),
                Some(Ordering::Less | Ordering::Equal)
            )),
            BinaryOp::GreaterThan => JValue::Bool(compare(&left, &right) == Some(Ordering::Greater)),
            BinaryOp::GreaterThanOrEqual => JValue::Bool(matches!(
                compare(&left, &right),
                Some(Ordering::Greater | Ordering::Equal)
            )),

            BinaryOp::And | BinaryOp::Or => right,
        })
    }

    fn eval_match(&mut self, subject: &JValue, arms: &[MatchArm], root: &JValue) -> Result<JValue, EvalError> {
        for arm in arms {
            if pattern::matches(subject, &arm.pattern) {
                return self.eval(&arm.body, root);
            }
        }
        Err(EvalError::NoMatch(clip(&subject.to_display_string(), 60)))
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// `+`: concatenation when either side is text or a date, addition otherwise.
fn add(left: &JValue, right: &JValue, max_len: usize) -> Result<JValue, EvalError> {
    if left.is_string() || left.is_date() || right.is_string() || right.is_date() {
        let mut s = left.to_display_string();
        let tail = right.to_display_string();
        functions::check_string_length(s.len().saturating_add(tail.len()), max_len)?;
        s.push_str(&tail);
        Ok(JValue::from(s))
    } else {
        Ok(JValue::Number(left.to_number() + right.to_number()))
    }
}

/// Relational ordering: strings compare as text, everything else numerically.
/// `None` when either side is NaN.
fn compare(left: &JValue, right: &JValue) -> Option<Ordering> {
    match (left, right) {
        (JValue::String(a), JValue::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    }
}

impl SegmentEvaluator for Evaluator {
    fn test_predicate(
        &mut self,
        predicate: &AstNode,
        candidate: &JValue,
        root: &JValue,
    ) -> Result<bool, EvalError> {
        self.context.push_scope();
        self.context.bind("@".to_string(), candidate.clone());
        let result = self.eval(predicate, root);
        self.context.pop_scope();
        Ok(result?.is_truthy())
    }

    fn eval_key(&mut self, expr: &AstNode, root: &JValue) -> Result<JValue, EvalError> {
        self.eval(expr, root)
    }

    fn max_depth(&self) -> usize {
        self.options.max_depth
    }
}

impl CallbackHost for Evaluator {
    fn max_string_length(&self) -> usize {
        self.options.max_string_length
    }

    fn callable(&mut self, callback: &JValue, defaults: &[&str]) -> Result<Arc<Lambda>, EvalError> {
        match callback {
            JValue::Lambda(f) => Ok(Arc::clone(f)),
            JValue::String(text) => {
                let body = parser::parse_with_depth(text, self.options.max_depth)?;
                Ok(Arc::new(Lambda {
                    params: defaults.iter().map(|p| p.to_string()).collect(),
                    body: Arc::new(body),
                    captured: self.context.snapshot(),
                }))
            }
            other => Err(EvalError::type_error(format!(
                "expected a function or expression text, got {}",
                other.type_name()
            ))),
        }
    }

    fn call(&mut self, f: &Lambda, args: &[JValue], root: &JValue) -> Result<JValue, EvalError> {
        self.tick()?;
        let mut scope = Context::from_bindings(&f.captured);
        for (i, param) in f.params.iter().enumerate() {
            scope.bind(param.clone(), args.get(i).cloned().unwrap_or(JValue::Null));
        }
        let saved = std::mem::replace(&mut self.context, scope);
        let result = self.eval(&f.body, root);
        self.context = saved;
        result
    }

    fn eval_text(&mut self, text: &str, root: &JValue) -> Result<JValue, EvalError> {
        log::debug!("eval: {}", clip(text, 80));
        let ast = parser::parse_with_depth(text, self.options.max_depth)?;
        self.eval(&ast, root)
    }

    fn resolve_path(&mut self, value: &JValue, path_text: &str) -> Result<JValue, EvalError> {
        match parser::parse_path(path_text, self.options.max_depth)? {
            AstNode::Path { segments, .. } => path::resolve(value.clone(), &segments, value, self),
            _ => Ok(value.clone()),
        }
    }
}
