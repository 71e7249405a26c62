//! Runtime value and object model.
//!
//! `Value` is the tagged runtime variant; classes and instances live behind
//! `Rc` so that assignment copies a handle, not the object, and mutations are
//! observable through every alias. Method resolution walks the single
//! inheritance chain; operator fallback dispatches to the dunder methods
//! named by the constants below.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::rc::Rc;
use std::slice;

use crate::statement::{Flow, Statement};

pub mod error;

use error::RuntimeError;

pub(crate) const INIT_METHOD: &str = "__init__";
pub(crate) const ADD_METHOD: &str = "__add__";
pub(crate) const EQ_METHOD: &str = "__eq__";
pub(crate) const LT_METHOD: &str = "__lt__";
pub(crate) const STR_METHOD: &str = "__str__";

const SELF_NAME: &str = "self";

/// Name-to-value environment, used both as a scope frame and as the field
/// table of an instance.
pub type Closure = HashMap<String, Value>;

/// Execution context threaded through every operation that can reach I/O.
pub trait Context {
    fn output_stream(&mut self) -> &mut dyn io::Write;
}

pub struct SimpleContext<'a> {
    output: &'a mut dyn io::Write,
}

impl<'a> SimpleContext<'a> {
    pub fn new(output: &'a mut dyn io::Write) -> Self {
        Self { output }
    }
}

impl Context for SimpleContext<'_> {
    fn output_stream(&mut self) -> &mut dyn io::Write {
        &mut *self.output
    }
}

#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    pub formal_params: Vec<String>,
    pub body: Rc<Statement>,
}

#[derive(Debug)]
pub struct Class {
    name: String,
    methods: Vec<Method>,
    parent: Option<Rc<Class>>,
}

impl Class {
    pub fn new(name: String, methods: Vec<Method>, parent: Option<Rc<Class>>) -> Self {
        Self {
            name,
            methods,
            parent,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Finds `name` in definition order, then along the parent chain.
    pub fn method(&self, name: &str) -> Option<&Method> {
        if let Some(method) = self.methods.iter().find(|method| method.name == name) {
            return Some(method);
        }
        self.parent.as_deref().and_then(|parent| parent.method(name))
    }

    /// True iff lookup hits and the hit takes exactly `arity` arguments.
    /// A same-name method with the wrong arity shadows any parent method.
    pub fn has_method(&self, name: &str, arity: usize) -> bool {
        self.method(name)
            .is_some_and(|method| method.formal_params.len() == arity)
    }
}

#[derive(Debug)]
pub struct Instance {
    class: Rc<Class>,
    fields: Closure,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: Closure::new(),
        }
    }

    pub fn class(&self) -> &Rc<Class> {
        &self.class
    }

    pub fn fields(&self) -> &Closure {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut Closure {
        &mut self.fields
    }

    /// Invokes `method` on the shared handle: a fresh closure binds `self`
    /// and the formal parameters, then the body runs in it. A body that
    /// completes without `return` yields `None`.
    pub fn call(
        this: &Rc<RefCell<Instance>>,
        method: &str,
        args: &[Value],
        context: &mut dyn Context,
    ) -> Result<Value, RuntimeError> {
        let class = Rc::clone(&this.borrow().class);
        let declaration = match class.method(method) {
            Some(declaration) if declaration.formal_params.len() == args.len() => declaration,
            _ => {
                return Err(RuntimeError::MethodNotFound {
                    class: class.name().to_string(),
                    method: method.to_string(),
                    arity: args.len(),
                });
            }
        };

        let mut closure = Closure::new();
        closure.insert(SELF_NAME.to_string(), Value::Instance(Rc::clone(this)));
        for (param, value) in declaration.formal_params.iter().zip(args) {
            closure.insert(param.clone(), value.clone());
        }

        let body = Rc::clone(&declaration.body);
        match body.execute(&mut closure, context)? {
            Flow::Normal(value) | Flow::Return(value) => Ok(value),
        }
    }
}

#[derive(Clone)]
pub enum Value {
    None,
    Number(i64),
    String(String),
    Bool(bool),
    Class(Rc<Class>),
    Instance(Rc<RefCell<Instance>>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "None",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Bool(_) => "bool",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
        }
    }

    /// Truthiness: non-zero numbers, non-empty strings and `True` are true;
    /// `None`, classes and every instance are false.
    pub fn is_true(&self) -> bool {
        match self {
            Value::Number(value) => *value != 0,
            Value::Bool(value) => *value,
            Value::String(value) => !value.is_empty(),
            _ => false,
        }
    }

    /// Canonical text form. Instances render through `__str__` when their
    /// class defines it, otherwise as the class name plus a stable identity.
    pub fn to_output(&self, context: &mut dyn Context) -> Result<String, RuntimeError> {
        match self {
            Value::None => Ok("None".to_string()),
            Value::Number(value) => Ok(value.to_string()),
            Value::String(value) => Ok(value.clone()),
            Value::Bool(true) => Ok("True".to_string()),
            Value::Bool(false) => Ok("False".to_string()),
            Value::Class(class) => Ok(format!("Class {}", class.name())),
            Value::Instance(instance) => {
                let has_str = instance.borrow().class.has_method(STR_METHOD, 0);
                if has_str {
                    let rendered = Instance::call(instance, STR_METHOD, &[], context)?;
                    return rendered.to_output(context);
                }
                let class_name = instance.borrow().class.name().to_string();
                Ok(format!("<{} object at {:p}>", class_name, Rc::as_ptr(instance)))
            }
        }
    }

    /// Method invocation on an instance value; anything else is a failure.
    pub fn call_method(
        &self,
        method: &str,
        args: &[Value],
        context: &mut dyn Context,
    ) -> Result<Value, RuntimeError> {
        match self {
            Value::Instance(instance) => Instance::call(instance, method, args, context),
            other => Err(RuntimeError::MethodCallOnNonInstance {
                method: method.to_string(),
                type_name: other.type_name(),
            }),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Number(value) => write!(f, "Number({value})"),
            Value::String(value) => write!(f, "String({value:?})"),
            Value::Bool(value) => write!(f, "Bool({value})"),
            Value::Class(class) => write!(f, "Class({})", class.name()),
            // Shallow on purpose: instance graphs may be cyclic.
            Value::Instance(instance) => write!(f, "Instance({})", instance.borrow().class.name()),
        }
    }
}

/// Primitives compare by value; classes and instances by handle identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Number(lhs), Value::Number(rhs)) => lhs == rhs,
            (Value::String(lhs), Value::String(rhs)) => lhs == rhs,
            (Value::Bool(lhs), Value::Bool(rhs)) => lhs == rhs,
            (Value::Class(lhs), Value::Class(rhs)) => Rc::ptr_eq(lhs, rhs),
            (Value::Instance(lhs), Value::Instance(rhs)) => Rc::ptr_eq(lhs, rhs),
            _ => false,
        }
    }
}

fn compare<F>(lhs: &Value, rhs: &Value, comparison: F) -> Result<bool, RuntimeError>
where
    F: Fn(Ordering) -> bool,
{
    let ordering = match (lhs, rhs) {
        (Value::Number(lhs), Value::Number(rhs)) => lhs.cmp(rhs),
        (Value::String(lhs), Value::String(rhs)) => lhs.cmp(rhs),
        (Value::Bool(lhs), Value::Bool(rhs)) => lhs.cmp(rhs),
        _ => {
            return Err(RuntimeError::ComparisonTypeMismatch {
                lhs: lhs.type_name(),
                rhs: rhs.type_name(),
            });
        }
    };
    Ok(comparison(ordering))
}

/// `==`: instances dispatch to `__eq__` (coerced through truthiness),
/// `None == None` holds, primitives compare within the same variant only.
pub fn equal(lhs: &Value, rhs: &Value, context: &mut dyn Context) -> Result<bool, RuntimeError> {
    if matches!(lhs, Value::Instance(_)) {
        let verdict = lhs.call_method(EQ_METHOD, slice::from_ref(rhs), context)?;
        return Ok(verdict.is_true());
    }
    if matches!((lhs, rhs), (Value::None, Value::None)) {
        return Ok(true);
    }
    compare(lhs, rhs, Ordering::is_eq)
}

/// `<`: instances dispatch to `__lt__`, primitives compare within the same
/// variant only.
pub fn less(lhs: &Value, rhs: &Value, context: &mut dyn Context) -> Result<bool, RuntimeError> {
    if matches!(lhs, Value::Instance(_)) {
        let verdict = lhs.call_method(LT_METHOD, slice::from_ref(rhs), context)?;
        return Ok(verdict.is_true());
    }
    compare(lhs, rhs, Ordering::is_lt)
}

pub fn not_equal(
    lhs: &Value,
    rhs: &Value,
    context: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    Ok(!equal(lhs, rhs, context)?)
}

pub fn greater(lhs: &Value, rhs: &Value, context: &mut dyn Context) -> Result<bool, RuntimeError> {
    Ok(!(less(lhs, rhs, context)? || equal(lhs, rhs, context)?))
}

pub fn less_or_equal(
    lhs: &Value,
    rhs: &Value,
    context: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    Ok(!greater(lhs, rhs, context)?)
}

pub fn greater_or_equal(
    lhs: &Value,
    rhs: &Value,
    context: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    Ok(!less(lhs, rhs, context)?)
}
