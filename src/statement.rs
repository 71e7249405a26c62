//! Executable statement tree.
//!
//! Statements and expressions share one node type; every node evaluates with
//! `execute` against a closure and a context. Non-local `return` is the
//! `Flow::Return` case, which unwinds through `Compound` and `IfElse` frames
//! until `MethodBody` collapses it back to a value.

use std::cell::RefCell;
use std::rc::Rc;
use std::slice;

use crate::runtime::error::RuntimeError;
use crate::runtime::{self, Class, Closure, Context, Instance, Value, ADD_METHOD, INIT_METHOD};

/// Outcome of executing a node: a value, or a `return` in flight toward the
/// enclosing method body.
#[derive(Debug)]
pub enum Flow {
    Normal(Value),
    Return(Value),
}

/// Read access to a variable, optionally through a chain of instance fields
/// (`a.b.c`). The chain resolves left to right; every prefix must name an
/// instance.
#[derive(Debug, Clone)]
pub struct VariableValue {
    pub name: String,
    pub dotted_ids: Vec<String>,
}

impl VariableValue {
    fn resolve(&self, closure: &Closure) -> Result<Value, RuntimeError> {
        let mut value = closure
            .get(&self.name)
            .cloned()
            .ok_or_else(|| RuntimeError::UndefinedVariable {
                name: self.name.clone(),
            })?;
        let mut holder = &self.name;
        for field in &self.dotted_ids {
            let instance = match &value {
                Value::Instance(instance) => Rc::clone(instance),
                _ => {
                    return Err(RuntimeError::VariableNotAnInstance {
                        name: holder.clone(),
                    });
                }
            };
            let next = instance
                .borrow()
                .fields()
                .get(field)
                .cloned()
                .ok_or_else(|| RuntimeError::UndefinedVariable {
                    name: field.clone(),
                })?;
            value = next;
            holder = field;
        }
        Ok(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Equal,
    NotEqual,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
}

#[derive(Debug)]
pub enum Statement {
    Constant(Value),
    Variable(VariableValue),
    Assignment {
        var: String,
        rv: Box<Statement>,
    },
    FieldAssignment {
        object: VariableValue,
        field_name: String,
        rv: Box<Statement>,
    },
    Print {
        args: Vec<Statement>,
    },
    MethodCall {
        object: Box<Statement>,
        method: String,
        args: Vec<Statement>,
    },
    NewInstance {
        class: Rc<Class>,
        args: Vec<Statement>,
    },
    Stringify {
        argument: Box<Statement>,
    },
    Add {
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
    Sub {
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
    Mult {
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
    Div {
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
    Or {
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
    And {
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
    Not {
        argument: Box<Statement>,
    },
    Comparison {
        comparator: Comparator,
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
    Compound {
        statements: Vec<Statement>,
    },
    Return {
        statement: Box<Statement>,
    },
    ClassDefinition {
        class: Rc<Class>,
    },
    IfElse {
        condition: Box<Statement>,
        if_body: Box<Statement>,
        else_body: Option<Box<Statement>>,
    },
    MethodBody {
        body: Box<Statement>,
    },
}

impl Statement {
    pub fn execute(
        &self,
        closure: &mut Closure,
        context: &mut dyn Context,
    ) -> Result<Flow, RuntimeError> {
        match self {
            Statement::Constant(value) => Ok(Flow::Normal(value.clone())),

            Statement::Variable(variable) => Ok(Flow::Normal(variable.resolve(closure)?)),

            Statement::Assignment { var, rv } => {
                let value = eval(rv, closure, context)?;
                closure.insert(var.clone(), value.clone());
                Ok(Flow::Normal(value))
            }

            Statement::FieldAssignment {
                object,
                field_name,
                rv,
            } => {
                let target = object.resolve(closure)?;
                let instance = match target {
                    Value::Instance(instance) => instance,
                    _ => {
                        let name = object.dotted_ids.last().unwrap_or(&object.name);
                        return Err(RuntimeError::VariableNotAnInstance { name: name.clone() });
                    }
                };
                let value = eval(rv, closure, context)?;
                instance
                    .borrow_mut()
                    .fields_mut()
                    .insert(field_name.clone(), value.clone());
                Ok(Flow::Normal(value))
            }

            Statement::Print { args } => {
                for (index, arg) in args.iter().enumerate() {
                    if index > 0 {
                        write_output(context, " ")?;
                    }
                    let value = eval(arg, closure, context)?;
                    let rendered = value.to_output(context)?;
                    write_output(context, &rendered)?;
                }
                write_output(context, "\n")?;
                Ok(Flow::Normal(Value::None))
            }

            Statement::MethodCall {
                object,
                method,
                args,
            } => {
                let receiver = eval(object, closure, context)?;
                let mut actual_args = Vec::with_capacity(args.len());
                for arg in args {
                    actual_args.push(eval(arg, closure, context)?);
                }
                Ok(Flow::Normal(receiver.call_method(
                    method,
                    &actual_args,
                    context,
                )?))
            }

            Statement::NewInstance { class, args } => {
                let instance = Value::Instance(Rc::new(RefCell::new(Instance::new(Rc::clone(
                    class,
                )))));
                // Arguments are only evaluated when a matching __init__ exists;
                // its return value is discarded.
                if class.has_method(INIT_METHOD, args.len()) {
                    let mut actual_args = Vec::with_capacity(args.len());
                    for arg in args {
                        actual_args.push(eval(arg, closure, context)?);
                    }
                    instance.call_method(INIT_METHOD, &actual_args, context)?;
                }
                Ok(Flow::Normal(instance))
            }

            Statement::Stringify { argument } => {
                let value = eval(argument, closure, context)?;
                Ok(Flow::Normal(Value::String(value.to_output(context)?)))
            }

            Statement::Add { lhs, rhs } => {
                let lhs_value = eval(lhs, closure, context)?;
                let rhs_value = eval(rhs, closure, context)?;
                let result = match (&lhs_value, &rhs_value) {
                    (Value::Number(lhs), Value::Number(rhs)) => Value::Number(lhs.wrapping_add(*rhs)),
                    (Value::String(lhs), Value::String(rhs)) => Value::String(format!("{lhs}{rhs}")),
                    (Value::Instance(_), _) => {
                        lhs_value.call_method(ADD_METHOD, slice::from_ref(&rhs_value), context)?
                    }
                    _ => {
                        return Err(RuntimeError::UnsupportedOperandTypes {
                            operation: '+',
                            lhs: lhs_value.type_name(),
                            rhs: rhs_value.type_name(),
                        });
                    }
                };
                Ok(Flow::Normal(result))
            }

            Statement::Sub { lhs, rhs } => {
                let lhs_value = eval(lhs, closure, context)?;
                let rhs_value = eval(rhs, closure, context)?;
                numeric_binary('-', &lhs_value, &rhs_value, i64::wrapping_sub)
            }

            Statement::Mult { lhs, rhs } => {
                let lhs_value = eval(lhs, closure, context)?;
                let rhs_value = eval(rhs, closure, context)?;
                numeric_binary('*', &lhs_value, &rhs_value, i64::wrapping_mul)
            }

            Statement::Div { lhs, rhs } => {
                let lhs_value = eval(lhs, closure, context)?;
                let rhs_value = eval(rhs, closure, context)?;
                // A zero divisor is reported before any operand type check.
                if matches!(rhs_value, Value::Number(0)) {
                    return Err(RuntimeError::DivisionByZero);
                }
                numeric_binary('/', &lhs_value, &rhs_value, i64::wrapping_div)
            }

            Statement::Or { lhs, rhs } => {
                if eval(lhs, closure, context)?.is_true() {
                    return Ok(Flow::Normal(Value::Bool(true)));
                }
                let rhs_value = eval(rhs, closure, context)?;
                Ok(Flow::Normal(Value::Bool(rhs_value.is_true())))
            }

            Statement::And { lhs, rhs } => {
                if !eval(lhs, closure, context)?.is_true() {
                    return Ok(Flow::Normal(Value::Bool(false)));
                }
                let rhs_value = eval(rhs, closure, context)?;
                Ok(Flow::Normal(Value::Bool(rhs_value.is_true())))
            }

            Statement::Not { argument } => {
                let value = eval(argument, closure, context)?;
                Ok(Flow::Normal(Value::Bool(!value.is_true())))
            }

            Statement::Comparison {
                comparator,
                lhs,
                rhs,
            } => {
                let lhs_value = eval(lhs, closure, context)?;
                let rhs_value = eval(rhs, closure, context)?;
                let result = match comparator {
                    Comparator::Equal => runtime::equal(&lhs_value, &rhs_value, context)?,
                    Comparator::NotEqual => runtime::not_equal(&lhs_value, &rhs_value, context)?,
                    Comparator::Less => runtime::less(&lhs_value, &rhs_value, context)?,
                    Comparator::Greater => runtime::greater(&lhs_value, &rhs_value, context)?,
                    Comparator::LessOrEqual => {
                        runtime::less_or_equal(&lhs_value, &rhs_value, context)?
                    }
                    Comparator::GreaterOrEqual => {
                        runtime::greater_or_equal(&lhs_value, &rhs_value, context)?
                    }
                };
                Ok(Flow::Normal(Value::Bool(result)))
            }

            Statement::Compound { statements } => {
                for statement in statements {
                    if let Flow::Return(value) = statement.execute(closure, context)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal(Value::None))
            }

            Statement::Return { statement } => {
                let value = eval(statement, closure, context)?;
                Ok(Flow::Return(value))
            }

            Statement::ClassDefinition { class } => {
                closure.insert(class.name().to_string(), Value::Class(Rc::clone(class)));
                Ok(Flow::Normal(Value::None))
            }

            Statement::IfElse {
                condition,
                if_body,
                else_body,
            } => {
                if eval(condition, closure, context)?.is_true() {
                    if_body.execute(closure, context)
                } else if let Some(else_body) = else_body {
                    else_body.execute(closure, context)
                } else {
                    Ok(Flow::Normal(Value::None))
                }
            }

            Statement::MethodBody { body } => match body.execute(closure, context)? {
                Flow::Normal(_) => Ok(Flow::Normal(Value::None)),
                Flow::Return(value) => Ok(Flow::Normal(value)),
            },
        }
    }
}

/// Expression-position evaluation: unwraps the value and rejects a stray
/// `return` (unreachable from parsed programs).
fn eval(
    statement: &Statement,
    closure: &mut Closure,
    context: &mut dyn Context,
) -> Result<Value, RuntimeError> {
    match statement.execute(closure, context)? {
        Flow::Normal(value) => Ok(value),
        Flow::Return(_) => Err(RuntimeError::ReturnOutsideMethod),
    }
}

fn numeric_binary(
    operation: char,
    lhs: &Value,
    rhs: &Value,
    apply: fn(i64, i64) -> i64,
) -> Result<Flow, RuntimeError> {
    match (lhs, rhs) {
        (Value::Number(lhs), Value::Number(rhs)) => {
            Ok(Flow::Normal(Value::Number(apply(*lhs, *rhs))))
        }
        _ => Err(RuntimeError::UnsupportedOperandTypes {
            operation,
            lhs: lhs.type_name(),
            rhs: rhs.type_name(),
        }),
    }
}

fn write_output(context: &mut dyn Context, text: &str) -> Result<(), RuntimeError> {
    context
        .output_stream()
        .write_all(text.as_bytes())
        .map_err(|error| RuntimeError::OutputWrite {
            message: error.to_string(),
        })
}
