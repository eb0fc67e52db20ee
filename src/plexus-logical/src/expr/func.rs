//! Function implementations referenced by calls and calculations.

use std::fmt;
use std::sync::Arc;

use plexus_core::Value;

/// A scalar function body.
pub type ScalarFn = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// A named scalar function together with the evaluation facts rewrites need.
///
/// Two implementations are the same function iff their names are equal.
#[derive(Clone)]
pub struct FnImpl {
    name: String,
    func: ScalarFn,
    short_circuit: bool,
    accepts_sequence: bool,
    aggregate: bool,
    identity: bool,
}

impl FnImpl {
    /// Create a new function implementation.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
            short_circuit: false,
            accepts_sequence: false,
            aggregate: false,
            identity: false,
        }
    }

    /// The identity function over a single argument.
    ///
    /// Front ends wrap bare references in it; equality checks see through it.
    pub fn identity() -> Self {
        let mut f = Self::new("id", |args: &[Value]| args.first().cloned().unwrap_or_default());
        f.identity = true;
        f
    }

    /// Mark every argument after the first as conditionally evaluated.
    #[must_use]
    pub fn with_short_circuit(mut self) -> Self {
        self.short_circuit = true;
        self
    }

    /// Mark the arguments as accepting whole sequences rather than one scalar.
    #[must_use]
    pub fn with_sequence_args(mut self) -> Self {
        self.accepts_sequence = true;
        self
    }

    /// Mark the function as folding a whole group of rows into one value.
    ///
    /// Implies sequence arguments.
    #[must_use]
    pub fn with_aggregate(mut self) -> Self {
        self.aggregate = true;
        self.accepts_sequence = true;
        self
    }

    /// The function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Apply the function.
    pub fn call(&self, args: &[Value]) -> Value {
        (self.func)(args)
    }

    /// Whether arguments after the first may be skipped.
    pub fn is_short_circuit(&self) -> bool {
        self.short_circuit
    }

    /// Whether arguments are consumed as sequences.
    pub fn accepts_sequence(&self) -> bool {
        self.accepts_sequence
    }

    /// Whether the function is an aggregate.
    pub fn is_aggregate(&self) -> bool {
        self.aggregate
    }

    /// Whether this is the identity wrapper.
    pub fn is_identity(&self) -> bool {
        self.identity
    }
}

impl PartialEq for FnImpl {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for FnImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FnImpl({})", self.name)
    }
}

impl fmt::Display for FnImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A small set of functions shared by the front ends.
pub mod builtins {
    use std::cmp::Ordering;

    use plexus_core::Value;

    use super::FnImpl;

    fn compare(args: &[Value]) -> Option<Ordering> {
        match (args.first()?, args.get(1)?) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (a, b) => a.as_float64()?.partial_cmp(&b.as_float64()?),
        }
    }

    fn comparison(name: &str, accept: fn(Ordering) -> bool) -> FnImpl {
        FnImpl::new(name, move |args: &[Value]| {
            compare(args).map_or(Value::Null, |ord| Value::Bool(accept(ord)))
        })
    }

    /// Identity.
    pub fn identity() -> FnImpl {
        FnImpl::identity()
    }

    /// `a = b`.
    pub fn eq() -> FnImpl {
        comparison("=", Ordering::is_eq)
    }

    /// `a <> b`.
    pub fn neq() -> FnImpl {
        comparison("<>", Ordering::is_ne)
    }

    /// `a < b`.
    pub fn lt() -> FnImpl {
        comparison("<", Ordering::is_lt)
    }

    /// `a > b`.
    pub fn gt() -> FnImpl {
        comparison(">", Ordering::is_gt)
    }

    /// Three-valued `AND`; short-circuiting.
    pub fn and() -> FnImpl {
        FnImpl::new("and", |args: &[Value]| {
            if args.iter().any(|a| a.as_bool() == Some(false)) {
                Value::Bool(false)
            } else if args.iter().all(Value::is_true) {
                Value::Bool(true)
            } else {
                Value::Null
            }
        })
        .with_short_circuit()
    }

    /// Three-valued `OR`; short-circuiting.
    pub fn or() -> FnImpl {
        FnImpl::new("or", |args: &[Value]| {
            if args.iter().any(Value::is_true) {
                Value::Bool(true)
            } else if args.iter().all(|a| a.as_bool() == Some(false)) {
                Value::Bool(false)
            } else {
                Value::Null
            }
        })
        .with_short_circuit()
    }

    /// `NOT a`.
    pub fn not() -> FnImpl {
        FnImpl::new("not", |args: &[Value]| match args.first() {
            Some(Value::Bool(b)) => Value::Bool(!b),
            _ => Value::Null,
        })
    }

    /// Numeric addition.
    pub fn add() -> FnImpl {
        FnImpl::new("+", |args: &[Value]| match (args.first(), args.get(1)) {
            (Some(Value::Int64(a)), Some(Value::Int64(b))) => Value::Int64(a.wrapping_add(*b)),
            (Some(a), Some(b)) => match (a.as_float64(), b.as_float64()) {
                (Some(x), Some(y)) => Value::Float64(x + y),
                _ => Value::Null,
            },
            _ => Value::Null,
        })
    }

    /// Numeric multiplication.
    pub fn mul() -> FnImpl {
        FnImpl::new("*", |args: &[Value]| match (args.first(), args.get(1)) {
            (Some(Value::Int64(a)), Some(Value::Int64(b))) => Value::Int64(a.wrapping_mul(*b)),
            (Some(a), Some(b)) => match (a.as_float64(), b.as_float64()) {
                (Some(x), Some(y)) => Value::Float64(x * y),
                _ => Value::Null,
            },
            _ => Value::Null,
        })
    }

    /// Whether a sequence argument is non-empty.
    pub fn exists() -> FnImpl {
        FnImpl::new("exists", |args: &[Value]| match args.first() {
            Some(Value::Array(items)) => Value::Bool(!items.is_empty()),
            Some(Value::Null) | None => Value::Bool(false),
            Some(_) => Value::Bool(true),
        })
        .with_sequence_args()
    }

    /// Number of non-null items in a sequence.
    pub fn count() -> FnImpl {
        FnImpl::new("count", |args: &[Value]| match args.first() {
            Some(Value::Array(items)) => {
                Value::Int64(items.iter().filter(|v| !v.is_null()).count() as i64)
            }
            Some(Value::Null) | None => Value::Int64(0),
            Some(_) => Value::Int64(1),
        })
        .with_aggregate()
    }

    /// Sum of the numeric items in a sequence; null when there are none.
    pub fn sum() -> FnImpl {
        FnImpl::new("sum", |args: &[Value]| {
            let items = match args.first() {
                Some(Value::Array(items)) => items.as_slice(),
                Some(other) => std::slice::from_ref(other),
                None => &[],
            };
            items
                .iter()
                .filter(|v| !v.is_null())
                .cloned()
                .reduce(|acc, v| add().call(&[acc, v]))
                .unwrap_or_default()
        })
        .with_aggregate()
    }

    /// Collect the arguments into one array value.
    pub fn array() -> FnImpl {
        FnImpl::new("array", |args: &[Value]| Value::Array(args.to_vec()))
    }
}
