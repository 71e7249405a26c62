//! Recursive-descent parser from the token stream to the executable
//! statement tree.
//!
//! Class names resolve while parsing: a declared-class table lets
//! `NewInstance` and inheritance hold their `Rc<Class>` directly, so a call
//! position must name an already-declared class (or `str`, the stringify
//! form). Method parameter lists do not include `self`; the runtime injects
//! it on every call.

use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{bail, Result};

use crate::runtime::{Class, Method, Value};
use crate::statement::{Comparator, Statement, VariableValue};
use crate::token::Token;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    classes: HashMap<String, Rc<Class>>,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.is_empty() {
            tokens.push(Token::Eof);
        }
        Self {
            tokens,
            pos: 0,
            classes: HashMap::new(),
        }
    }

    /// Parses the whole program into its root compound statement.
    pub fn parse_program(mut self) -> Result<Statement> {
        let mut statements = Vec::new();
        while !matches!(self.current(), Token::Eof) {
            if self.consume_newlines() {
                continue;
            }
            statements.push(self.parse_statement()?);
        }
        Ok(Statement::Compound { statements })
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn consume_newlines(&mut self) -> bool {
        let mut consumed = false;
        while matches!(self.current(), Token::Newline) {
            self.advance();
            consumed = true;
        }
        consumed
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        if *self.current() != expected {
            bail!("Expected {:?}, got {:?}", expected, self.current());
        }
        self.advance();
        Ok(())
    }

    fn expect_id(&mut self) -> Result<String> {
        match self.current() {
            Token::Id(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            other => bail!("Expected identifier, got {:?}", other),
        }
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        match self.current() {
            Token::Class => self.parse_class_definition(),
            Token::If => self.parse_if_else(),
            Token::Return => self.parse_return(),
            Token::Print => self.parse_print(),
            Token::Def => bail!("'def' is only allowed inside a class body"),
            _ => self.parse_assignment_or_call(),
        }
    }

    fn parse_class_definition(&mut self) -> Result<Statement> {
        self.expect(Token::Class)?;
        let name = self.expect_id()?;
        let parent = if matches!(self.current(), Token::Char('(')) {
            self.advance();
            let parent_name = self.expect_id()?;
            self.expect(Token::Char(')'))?;
            match self.classes.get(&parent_name) {
                Some(class) => Some(Rc::clone(class)),
                None => bail!("Base class '{parent_name}' is not defined"),
            }
        } else {
            None
        };
        self.expect(Token::Char(':'))?;
        self.expect(Token::Newline)?;
        self.expect(Token::Indent)?;

        let mut methods = Vec::new();
        while !matches!(self.current(), Token::Dedent | Token::Eof) {
            if self.consume_newlines() {
                continue;
            }
            methods.push(self.parse_method()?);
        }
        self.expect(Token::Dedent)?;

        let class = Rc::new(Class::new(name.clone(), methods, parent));
        self.classes.insert(name, Rc::clone(&class));
        Ok(Statement::ClassDefinition { class })
    }

    fn parse_method(&mut self) -> Result<Method> {
        self.expect(Token::Def)?;
        let name = self.expect_id()?;
        self.expect(Token::Char('('))?;
        let mut formal_params = Vec::new();
        if !matches!(self.current(), Token::Char(')')) {
            loop {
                formal_params.push(self.expect_id()?);
                if !matches!(self.current(), Token::Char(',')) {
                    break;
                }
                self.advance();
            }
        }
        self.expect(Token::Char(')'))?;
        self.expect(Token::Char(':'))?;
        let body = self.parse_block()?;
        Ok(Method {
            name,
            formal_params,
            body: Rc::new(Statement::MethodBody {
                body: Box::new(body),
            }),
        })
    }

    /// NEWLINE INDENT statement+ DEDENT, as a compound.
    fn parse_block(&mut self) -> Result<Statement> {
        self.expect(Token::Newline)?;
        self.expect(Token::Indent)?;
        let mut statements = Vec::new();
        while !matches!(self.current(), Token::Dedent | Token::Eof) {
            if self.consume_newlines() {
                continue;
            }
            statements.push(self.parse_statement()?);
        }
        self.expect(Token::Dedent)?;
        Ok(Statement::Compound { statements })
    }

    fn parse_if_else(&mut self) -> Result<Statement> {
        self.expect(Token::If)?;
        let condition = self.parse_expression()?;
        self.expect(Token::Char(':'))?;
        let if_body = self.parse_block()?;
        let else_body = if matches!(self.current(), Token::Else) {
            self.advance();
            self.expect(Token::Char(':'))?;
            Some(Box::new(self.parse_block()?))
        } else {
            None
        };
        Ok(Statement::IfElse {
            condition: Box::new(condition),
            if_body: Box::new(if_body),
            else_body,
        })
    }

    fn parse_return(&mut self) -> Result<Statement> {
        self.expect(Token::Return)?;
        if matches!(self.current(), Token::Newline) {
            self.advance();
            return Ok(Statement::Return {
                statement: Box::new(Statement::Constant(Value::None)),
            });
        }
        let value = self.parse_expression()?;
        self.expect(Token::Newline)?;
        Ok(Statement::Return {
            statement: Box::new(value),
        })
    }

    fn parse_print(&mut self) -> Result<Statement> {
        self.expect(Token::Print)?;
        let mut args = Vec::new();
        if !matches!(self.current(), Token::Newline) {
            loop {
                args.push(self.parse_expression()?);
                if !matches!(self.current(), Token::Char(',')) {
                    break;
                }
                self.advance();
            }
        }
        self.expect(Token::Newline)?;
        Ok(Statement::Print { args })
    }

    /// `a = expr`, `a.b.c = expr`, or a call used for its effect.
    fn parse_assignment_or_call(&mut self) -> Result<Statement> {
        let (head, mut tail) = self.parse_dotted_ids()?;
        if matches!(self.current(), Token::Char('=')) {
            self.advance();
            let rv = Box::new(self.parse_expression()?);
            self.expect(Token::Newline)?;
            return Ok(match tail.pop() {
                None => Statement::Assignment { var: head, rv },
                Some(field_name) => Statement::FieldAssignment {
                    object: VariableValue {
                        name: head,
                        dotted_ids: tail,
                    },
                    field_name,
                    rv,
                },
            });
        }
        let expression = self.parse_postfix(head, tail)?;
        self.expect(Token::Newline)?;
        Ok(expression)
    }

    fn parse_dotted_ids(&mut self) -> Result<(String, Vec<String>)> {
        let head = self.expect_id()?;
        let mut tail = Vec::new();
        while matches!(self.current(), Token::Char('.')) {
            self.advance();
            tail.push(self.expect_id()?);
        }
        Ok((head, tail))
    }

    /// Finishes a dotted-name prefix: a plain variable read, or one of the
    /// call forms (`str(x)`, class construction, method call), with further
    /// `.name(...)` calls chaining on the result.
    fn parse_postfix(&mut self, head: String, mut tail: Vec<String>) -> Result<Statement> {
        if !matches!(self.current(), Token::Char('(')) {
            return Ok(Statement::Variable(VariableValue {
                name: head,
                dotted_ids: tail,
            }));
        }

        let mut expression = match tail.pop() {
            None => {
                let mut args = self.parse_call_args()?;
                if head == "str" {
                    if args.len() != 1 {
                        bail!("str() takes exactly one argument, got {}", args.len());
                    }
                    Statement::Stringify {
                        argument: Box::new(args.remove(0)),
                    }
                } else if let Some(class) = self.classes.get(&head) {
                    Statement::NewInstance {
                        class: Rc::clone(class),
                        args,
                    }
                } else {
                    bail!("'{head}' is not a defined class");
                }
            }
            Some(method) => {
                let object = Statement::Variable(VariableValue {
                    name: head,
                    dotted_ids: tail,
                });
                let args = self.parse_call_args()?;
                Statement::MethodCall {
                    object: Box::new(object),
                    method,
                    args,
                }
            }
        };

        while matches!(self.current(), Token::Char('.')) {
            self.advance();
            let method = self.expect_id()?;
            if !matches!(self.current(), Token::Char('(')) {
                bail!("Expected '(' after method name '{method}'");
            }
            let args = self.parse_call_args()?;
            expression = Statement::MethodCall {
                object: Box::new(expression),
                method,
                args,
            };
        }
        Ok(expression)
    }

    fn parse_call_args(&mut self) -> Result<Vec<Statement>> {
        self.expect(Token::Char('('))?;
        let mut args = Vec::new();
        if !matches!(self.current(), Token::Char(')')) {
            loop {
                args.push(self.parse_expression()?);
                if !matches!(self.current(), Token::Char(',')) {
                    break;
                }
                self.advance();
            }
        }
        self.expect(Token::Char(')'))?;
        Ok(args)
    }

    fn parse_expression(&mut self) -> Result<Statement> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Statement> {
        let mut expression = self.parse_and()?;
        while matches!(self.current(), Token::Or) {
            self.advance();
            let rhs = self.parse_and()?;
            expression = Statement::Or {
                lhs: Box::new(expression),
                rhs: Box::new(rhs),
            };
        }
        Ok(expression)
    }

    fn parse_and(&mut self) -> Result<Statement> {
        let mut expression = self.parse_not()?;
        while matches!(self.current(), Token::And) {
            self.advance();
            let rhs = self.parse_not()?;
            expression = Statement::And {
                lhs: Box::new(expression),
                rhs: Box::new(rhs),
            };
        }
        Ok(expression)
    }

    fn parse_not(&mut self) -> Result<Statement> {
        if matches!(self.current(), Token::Not) {
            self.advance();
            let argument = self.parse_not()?;
            return Ok(Statement::Not {
                argument: Box::new(argument),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Statement> {
        let expression = self.parse_additive()?;
        let comparator = match self.current() {
            Token::Eq => Comparator::Equal,
            Token::NotEq => Comparator::NotEqual,
            Token::Char('<') => Comparator::Less,
            Token::Char('>') => Comparator::Greater,
            Token::LessOrEq => Comparator::LessOrEqual,
            Token::GreaterOrEq => Comparator::GreaterOrEqual,
            _ => return Ok(expression),
        };
        self.advance();
        let rhs = self.parse_additive()?;
        Ok(Statement::Comparison {
            comparator,
            lhs: Box::new(expression),
            rhs: Box::new(rhs),
        })
    }

    fn parse_additive(&mut self) -> Result<Statement> {
        let mut expression = self.parse_term()?;
        loop {
            let is_add = match self.current() {
                Token::Char('+') => true,
                Token::Char('-') => false,
                _ => break,
            };
            self.advance();
            let lhs = Box::new(expression);
            let rhs = Box::new(self.parse_term()?);
            expression = if is_add {
                Statement::Add { lhs, rhs }
            } else {
                Statement::Sub { lhs, rhs }
            };
        }
        Ok(expression)
    }

    fn parse_term(&mut self) -> Result<Statement> {
        let mut expression = self.parse_unary()?;
        loop {
            let is_mult = match self.current() {
                Token::Char('*') => true,
                Token::Char('/') => false,
                _ => break,
            };
            self.advance();
            let lhs = Box::new(expression);
            let rhs = Box::new(self.parse_unary()?);
            expression = if is_mult {
                Statement::Mult { lhs, rhs }
            } else {
                Statement::Div { lhs, rhs }
            };
        }
        Ok(expression)
    }

    fn parse_unary(&mut self) -> Result<Statement> {
        if matches!(self.current(), Token::Char('-')) {
            self.advance();
            // A literal folds directly; anything else subtracts from zero.
            if let Token::Number(value) = self.current() {
                let value = *value;
                self.advance();
                return Ok(Statement::Constant(Value::Number(-value)));
            }
            let operand = self.parse_unary()?;
            return Ok(Statement::Sub {
                lhs: Box::new(Statement::Constant(Value::Number(0))),
                rhs: Box::new(operand),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Statement> {
        match self.current().clone() {
            Token::Number(value) => {
                self.advance();
                Ok(Statement::Constant(Value::Number(value)))
            }
            Token::String(text) => {
                self.advance();
                Ok(Statement::Constant(Value::String(text)))
            }
            Token::True => {
                self.advance();
                Ok(Statement::Constant(Value::Bool(true)))
            }
            Token::False => {
                self.advance();
                Ok(Statement::Constant(Value::Bool(false)))
            }
            Token::None => {
                self.advance();
                Ok(Statement::Constant(Value::None))
            }
            Token::Char('(') => {
                self.advance();
                let expression = self.parse_expression()?;
                self.expect(Token::Char(')'))?;
                Ok(expression)
            }
            Token::Id(_) => {
                let (head, tail) = self.parse_dotted_ids()?;
                self.parse_postfix(head, tail)
            }
            other => bail!("Unexpected token {:?} in expression", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use indoc::indoc;

    fn parse(source: &str) -> Result<Statement> {
        Parser::new(tokenize(source).expect("tokenize should succeed")).parse_program()
    }

    fn parse_statements(source: &str) -> Vec<Statement> {
        match parse(source).expect("parse should succeed") {
            Statement::Compound { statements } => statements,
            other => panic!("expected root compound, got {other:?}"),
        }
    }

    #[test]
    fn parses_assignment_and_field_assignment() {
        let statements = parse_statements("x = 1\nx.a.b = 2\n");
        assert!(matches!(&statements[0], Statement::Assignment { var, .. } if var == "x"));
        match &statements[1] {
            Statement::FieldAssignment {
                object, field_name, ..
            } => {
                assert_eq!(object.name, "x");
                assert_eq!(object.dotted_ids, vec!["a".to_string()]);
                assert_eq!(field_name, "b");
            }
            other => panic!("expected field assignment, got {other:?}"),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let statements = parse_statements("x = 2 * 5 + 10 / 2\n");
        let Statement::Assignment { rv, .. } = &statements[0] else {
            panic!("expected assignment");
        };
        // (2 * 5) + (10 / 2)
        let Statement::Add { lhs, rhs } = rv.as_ref() else {
            panic!("expected addition at the top, got {rv:?}");
        };
        assert!(matches!(lhs.as_ref(), Statement::Mult { .. }));
        assert!(matches!(rhs.as_ref(), Statement::Div { .. }));
    }

    #[test]
    fn comparison_binds_looser_than_addition() {
        let statements = parse_statements("x = 1 + 2 < 4\n");
        let Statement::Assignment { rv, .. } = &statements[0] else {
            panic!("expected assignment");
        };
        let Statement::Comparison {
            comparator, lhs, ..
        } = rv.as_ref()
        else {
            panic!("expected comparison at the top, got {rv:?}");
        };
        assert_eq!(*comparator, Comparator::Less);
        assert!(matches!(lhs.as_ref(), Statement::Add { .. }));
    }

    #[test]
    fn boolean_operators_nest_or_above_and() {
        let statements = parse_statements("x = True or False and not True\n");
        let Statement::Assignment { rv, .. } = &statements[0] else {
            panic!("expected assignment");
        };
        let Statement::Or { rhs, .. } = rv.as_ref() else {
            panic!("expected or at the top, got {rv:?}");
        };
        assert!(matches!(rhs.as_ref(), Statement::And { .. }));
    }

    #[test]
    fn parses_class_with_inheritance_and_methods() {
        let statements = parse_statements(indoc! {"
            class Base:
              def ping():
                return 1

            class Child(Base):
              def pong(a, b):
                return a + b
        "});
        let Statement::ClassDefinition { class: base } = &statements[0] else {
            panic!("expected class definition");
        };
        let Statement::ClassDefinition { class: child } = &statements[1] else {
            panic!("expected class definition");
        };
        assert_eq!(base.name(), "Base");
        assert_eq!(child.name(), "Child");
        // The child resolves the parent's methods through the chain.
        assert!(child.has_method("ping", 0));
        assert!(child.has_method("pong", 2));
        assert!(!child.has_method("pong", 1));
    }

    #[test]
    fn parses_construction_method_calls_and_stringify() {
        let statements = parse_statements(indoc! {"
            class Greeter:
              def greet(name):
                return 'hi ' + name

            g = Greeter()
            x = g.greet(str(5))
        "});
        let Statement::Assignment { rv, .. } = &statements[1] else {
            panic!("expected assignment");
        };
        assert!(matches!(rv.as_ref(), Statement::NewInstance { .. }));

        let Statement::Assignment { rv, .. } = &statements[2] else {
            panic!("expected assignment");
        };
        let Statement::MethodCall { method, args, .. } = rv.as_ref() else {
            panic!("expected method call, got {rv:?}");
        };
        assert_eq!(method, "greet");
        assert!(matches!(&args[0], Statement::Stringify { .. }));
    }

    #[test]
    fn chains_method_calls_on_call_results() {
        let statements = parse_statements(indoc! {"
            class Builder:
              def with_x(x):
                return self

            b = Builder()
            b.with_x(1).with_x(2)
        "});
        let Statement::MethodCall { object, method, .. } = &statements[2] else {
            panic!("expected method call");
        };
        assert_eq!(method, "with_x");
        assert!(matches!(object.as_ref(), Statement::MethodCall { .. }));
    }

    #[test]
    fn bare_return_yields_none() {
        let statements = parse_statements(indoc! {"
            class A:
              def f():
                return
        "});
        let Statement::ClassDefinition { class } = &statements[0] else {
            panic!("expected class definition");
        };
        let body = &class.method("f").expect("method f").body;
        let Statement::MethodBody { body } = body.as_ref() else {
            panic!("expected method body wrapper");
        };
        let Statement::Compound { statements } = body.as_ref() else {
            panic!("expected compound body");
        };
        let Statement::Return { statement } = &statements[0] else {
            panic!("expected return");
        };
        assert!(matches!(
            statement.as_ref(),
            Statement::Constant(Value::None)
        ));
    }

    #[test]
    fn negative_literals_fold_into_constants() {
        let statements = parse_statements("x = -8\ny = -x\n");
        let Statement::Assignment { rv, .. } = &statements[0] else {
            panic!("expected assignment");
        };
        assert!(matches!(
            rv.as_ref(),
            Statement::Constant(Value::Number(-8))
        ));
        let Statement::Assignment { rv, .. } = &statements[1] else {
            panic!("expected assignment");
        };
        assert!(matches!(rv.as_ref(), Statement::Sub { .. }));
    }

    #[test]
    fn rejects_unknown_class_in_call_position() {
        let err = parse("x = Missing()\n").expect_err("expected parse failure");
        assert!(err.to_string().contains("'Missing' is not a defined class"));
    }

    #[test]
    fn rejects_undeclared_base_class() {
        let err = parse("class A(B):\n  def f():\n    return\n")
            .expect_err("expected parse failure");
        assert!(err.to_string().contains("Base class 'B' is not defined"));
    }

    #[test]
    fn rejects_def_outside_class() {
        let err = parse("def f():\n  return\n").expect_err("expected parse failure");
        assert!(err.to_string().contains("only allowed inside a class body"));
    }

    #[test]
    fn rejects_statements_in_class_bodies() {
        let err = parse("class A:\n  x = 1\n").expect_err("expected parse failure");
        assert!(err.to_string().contains("Expected Def"));
    }
}
