// The AST. We don't generate these with a script the way the book does
// (`tool/GenerateAst.java`); a closed enum per category plus a
// hand-written visitor trait is the idiomatic Rust shape for a fixed set
// of node kinds.

use std::cell::Cell;
use std::fmt;

use crate::error::Error;
use crate::token::Token;

pub type NodeId = u32;

thread_local! {
    static NEXT_NODE_ID: Cell<NodeId> = Cell::new(0);
}

/// Every expression node gets one of these at construction time. The
/// resolver's side-map is keyed on this, never on a `Token` or on
/// structural equality — two `Variable("x")` nodes at different source
/// positions must resolve independently.
pub fn next_node_id() -> NodeId {
    NEXT_NODE_ID.with(|cell| {
        let id = cell.get();
        cell.set(id + 1);
        id
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Number(f64),
    String(String),
    Boolean(bool),
    Nil,
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Nil => write!(f, "nil"),
            LiteralValue::Boolean(b) => write!(f, "{b}"),
            LiteralValue::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            LiteralValue::String(s) => write!(f, "{s:?}"),
        }
    }
}

#[derive(Clone)]
pub enum Expr {
    Literal {
        id: NodeId,
        value: LiteralValue,
    },
    Variable {
        id: NodeId,
        name: Token,
    },
    Assign {
        id: NodeId,
        name: Token,
        value: Box<Expr>,
    },
    Unary {
        id: NodeId,
        operator: Token,
        right: Box<Expr>,
    },
    Binary {
        id: NodeId,
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },
    Logical {
        id: NodeId,
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },
    Grouping {
        id: NodeId,
        expression: Box<Expr>,
    },
    Call {
        id: NodeId,
        callee: Box<Expr>,
        paren: Token,
        arguments: Vec<Expr>,
    },
    Get {
        id: NodeId,
        object: Box<Expr>,
        name: Token,
    },
    Set {
        id: NodeId,
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },
    This {
        id: NodeId,
        keyword: Token,
    },
    Super {
        id: NodeId,
        keyword: Token,
        method: Token,
    },
}

impl Expr {
    pub fn id(&self) -> NodeId {
        match self {
            Expr::Literal { id, .. }
            | Expr::Variable { id, .. }
            | Expr::Assign { id, .. }
            | Expr::Unary { id, .. }
            | Expr::Binary { id, .. }
            | Expr::Logical { id, .. }
            | Expr::Grouping { id, .. }
            | Expr::Call { id, .. }
            | Expr::Get { id, .. }
            | Expr::Set { id, .. }
            | Expr::This { id, .. }
            | Expr::Super { id, .. } => *id,
        }
    }

    pub fn literal(value: LiteralValue) -> Expr {
        Expr::Literal {
            id: next_node_id(),
            value,
        }
    }

    pub fn variable(name: Token) -> Expr {
        Expr::Variable {
            id: next_node_id(),
            name,
        }
    }

    pub fn assign(name: Token, value: Box<Expr>) -> Expr {
        Expr::Assign {
            id: next_node_id(),
            name,
            value,
        }
    }

    pub fn unary(operator: Token, right: Box<Expr>) -> Expr {
        Expr::Unary {
            id: next_node_id(),
            operator,
            right,
        }
    }

    pub fn binary(left: Box<Expr>, operator: Token, right: Box<Expr>) -> Expr {
        Expr::Binary {
            id: next_node_id(),
            left,
            operator,
            right,
        }
    }

    pub fn logical(left: Box<Expr>, operator: Token, right: Box<Expr>) -> Expr {
        Expr::Logical {
            id: next_node_id(),
            left,
            operator,
            right,
        }
    }

    pub fn grouping(expression: Box<Expr>) -> Expr {
        Expr::Grouping {
            id: next_node_id(),
            expression,
        }
    }

    pub fn call(callee: Box<Expr>, paren: Token, arguments: Vec<Expr>) -> Expr {
        Expr::Call {
            id: next_node_id(),
            callee,
            paren,
            arguments,
        }
    }

    pub fn get(object: Box<Expr>, name: Token) -> Expr {
        Expr::Get {
            id: next_node_id(),
            object,
            name,
        }
    }

    pub fn set(object: Box<Expr>, name: Token, value: Box<Expr>) -> Expr {
        Expr::Set {
            id: next_node_id(),
            object,
            name,
            value,
        }
    }

    pub fn this(keyword: Token) -> Expr {
        Expr::This {
            id: next_node_id(),
            keyword,
        }
    }

    pub fn super_(keyword: Token, method: Token) -> Expr {
        Expr::Super {
            id: next_node_id(),
            keyword,
            method,
        }
    }

    pub fn accept<R, V: expr::Visitor<R> + ?Sized>(&self, visitor: &mut V) -> Result<R, Error> {
        match self {
            Expr::Literal { value, .. } => visitor.visit_literal_expr(value),
            Expr::Variable { id, name } => visitor.visit_variable_expr(*id, name),
            Expr::Assign { id, name, value } => visitor.visit_assign_expr(*id, name, value),
            Expr::Unary { operator, right, .. } => visitor.visit_unary_expr(operator, right),
            Expr::Binary {
                left,
                operator,
                right,
                ..
            } => visitor.visit_binary_expr(left, operator, right),
            Expr::Logical {
                left,
                operator,
                right,
                ..
            } => visitor.visit_logical_expr(left, operator, right),
            Expr::Grouping { expression, .. } => visitor.visit_grouping_expr(expression),
            Expr::Call {
                callee,
                paren,
                arguments,
                ..
            } => visitor.visit_call_expr(callee, paren, arguments),
            Expr::Get { object, name, .. } => visitor.visit_get_expr(object, name),
            Expr::Set {
                object,
                name,
                value,
                ..
            } => visitor.visit_set_expr(object, name, value),
            Expr::This { id, keyword } => visitor.visit_this_expr(*id, keyword),
            Expr::Super {
                id,
                keyword,
                method,
            } => visitor.visit_super_expr(*id, keyword, method),
        }
    }
}

pub mod expr {
    use super::{Error, Expr, LiteralValue, Token};

    pub trait Visitor<R> {
        fn visit_literal_expr(&mut self, value: &LiteralValue) -> Result<R, Error>;
        fn visit_variable_expr(&mut self, id: super::NodeId, name: &Token) -> Result<R, Error>;
        fn visit_assign_expr(
            &mut self,
            id: super::NodeId,
            name: &Token,
            value: &Expr,
        ) -> Result<R, Error>;
        fn visit_unary_expr(&mut self, operator: &Token, right: &Expr) -> Result<R, Error>;
        fn visit_binary_expr(
            &mut self,
            left: &Expr,
            operator: &Token,
            right: &Expr,
        ) -> Result<R, Error>;
        fn visit_logical_expr(
            &mut self,
            left: &Expr,
            operator: &Token,
            right: &Expr,
        ) -> Result<R, Error>;
        fn visit_grouping_expr(&mut self, expression: &Expr) -> Result<R, Error>;
        fn visit_call_expr(
            &mut self,
            callee: &Expr,
            paren: &Token,
            arguments: &[Expr],
        ) -> Result<R, Error>;
        fn visit_get_expr(&mut self, object: &Expr, name: &Token) -> Result<R, Error>;
        fn visit_set_expr(
            &mut self,
            object: &Expr,
            name: &Token,
            value: &Expr,
        ) -> Result<R, Error>;
        fn visit_this_expr(&mut self, id: super::NodeId, keyword: &Token) -> Result<R, Error>;
        fn visit_super_expr(
            &mut self,
            id: super::NodeId,
            keyword: &Token,
            method: &Token,
        ) -> Result<R, Error>;
    }
}

#[derive(Clone)]
pub enum Stmt {
    Expression {
        expression: Expr,
    },
    Print {
        expression: Expr,
    },
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    Return {
        keyword: Token,
        value: Option<Expr>,
    },
    Block {
        statements: Vec<Stmt>,
    },
    Var {
        name: Token,
        initializer: Option<Expr>,
    },
    Function {
        name: Token,
        params: Vec<Token>,
        body: Vec<Stmt>,
    },
    Class {
        name: Token,
        superclass: Option<Expr>,
        methods: Vec<Stmt>,
    },
    // Parse-error recovery sentinel: synchronize() leaves a hole where a
    // statement couldn't be parsed; the resolver/interpreter never run
    // over it since `had_error` short-circuits the pipeline first.
    Null,
}

impl Stmt {
    pub fn accept<R, V: stmt::Visitor<R> + ?Sized>(&self, visitor: &mut V) -> Result<R, Error> {
        match self {
            Stmt::Expression { expression } => visitor.visit_expression_stmt(expression),
            Stmt::Print { expression } => visitor.visit_print_stmt(expression),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => visitor.visit_if_stmt(condition, then_branch, else_branch.as_deref()),
            Stmt::While { condition, body } => visitor.visit_while_stmt(condition, body),
            Stmt::Return { keyword, value } => visitor.visit_return_stmt(keyword, value),
            Stmt::Block { statements } => visitor.visit_block_stmt(statements),
            Stmt::Var { name, initializer } => visitor.visit_var_stmt(name, initializer),
            Stmt::Function { name, params, body } => {
                visitor.visit_function_stmt(name, params, body)
            }
            Stmt::Class {
                name,
                superclass,
                methods,
            } => visitor.visit_class_stmt(name, superclass.as_ref(), methods),
            Stmt::Null => visitor.visit_null_stmt(),
        }
    }
}

pub mod stmt {
    use super::{Error, Expr, Stmt, Token};

    pub trait Visitor<R> {
        fn visit_expression_stmt(&mut self, expression: &Expr) -> Result<R, Error>;
        fn visit_print_stmt(&mut self, expression: &Expr) -> Result<R, Error>;
        fn visit_if_stmt(
            &mut self,
            condition: &Expr,
            then_branch: &Stmt,
            else_branch: Option<&Stmt>,
        ) -> Result<R, Error>;
        fn visit_while_stmt(&mut self, condition: &Expr, body: &Stmt) -> Result<R, Error>;
        fn visit_return_stmt(&mut self, keyword: &Token, value: &Option<Expr>)
            -> Result<R, Error>;
        fn visit_block_stmt(&mut self, statements: &[Stmt]) -> Result<R, Error>;
        fn visit_var_stmt(&mut self, name: &Token, initializer: &Option<Expr>)
            -> Result<R, Error>;
        fn visit_function_stmt(
            &mut self,
            name: &Token,
            params: &[Token],
            body: &[Stmt],
        ) -> Result<R, Error>;
        fn visit_class_stmt(
            &mut self,
            name: &Token,
            superclass: Option<&Expr>,
            methods: &[Stmt],
        ) -> Result<R, Error>;
        fn visit_null_stmt(&mut self) -> Result<R, Error>;
    }
}

/// Renders a node as an S-expression, handy for golden tests: `(+ 2 3)`,
/// `(if <test> <then> <else>)`, `(class Foo <super> <m1> …)`.
pub struct AstPrinter;

impl AstPrinter {
    pub fn print_expr(&mut self, expr: &Expr) -> String {
        expr.accept(self).expect("printing an expression cannot fail")
    }

    pub fn print_stmt(&mut self, stmt: &Stmt) -> String {
        stmt.accept(self).expect("printing a statement cannot fail")
    }

    fn parenthesize(&mut self, name: &str, exprs: &[&Expr]) -> String {
        let mut builder = String::from("(");
        builder.push_str(name);
        for expr in exprs {
            builder.push(' ');
            builder.push_str(&self.print_expr(expr));
        }
        builder.push(')');
        builder
    }

    fn parenthesize_stmts(&mut self, name: &str, parts: &[&str], stmts: &[&Stmt]) -> String {
        let mut builder = String::from("(");
        builder.push_str(name);
        for part in parts {
            builder.push(' ');
            builder.push_str(part);
        }
        for stmt in stmts {
            builder.push(' ');
            builder.push_str(&self.print_stmt(stmt));
        }
        builder.push(')');
        builder
    }
}

impl expr::Visitor<String> for AstPrinter {
    fn visit_literal_expr(&mut self, value: &LiteralValue) -> Result<String, Error> {
        Ok(value.to_string())
    }

    fn visit_variable_expr(&mut self, _id: NodeId, name: &Token) -> Result<String, Error> {
        Ok(name.lexeme.clone())
    }

    fn visit_assign_expr(
        &mut self,
        _id: NodeId,
        name: &Token,
        value: &Expr,
    ) -> Result<String, Error> {
        Ok(self.parenthesize(&format!("= {}", name.lexeme), &[value]))
    }

    fn visit_unary_expr(&mut self, operator: &Token, right: &Expr) -> Result<String, Error> {
        Ok(self.parenthesize(&operator.lexeme, &[right]))
    }

    fn visit_binary_expr(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
    ) -> Result<String, Error> {
        Ok(self.parenthesize(&operator.lexeme, &[left, right]))
    }

    fn visit_logical_expr(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
    ) -> Result<String, Error> {
        Ok(self.parenthesize(&operator.lexeme, &[left, right]))
    }

    fn visit_grouping_expr(&mut self, expression: &Expr) -> Result<String, Error> {
        Ok(self.parenthesize("group", &[expression]))
    }

    fn visit_call_expr(
        &mut self,
        callee: &Expr,
        _paren: &Token,
        arguments: &[Expr],
    ) -> Result<String, Error> {
        let mut exprs = vec![callee];
        exprs.extend(arguments.iter());
        Ok(self.parenthesize("call", &exprs))
    }

    fn visit_get_expr(&mut self, object: &Expr, name: &Token) -> Result<String, Error> {
        Ok(self.parenthesize(&format!(". {}", name.lexeme), &[object]))
    }

    fn visit_set_expr(
        &mut self,
        object: &Expr,
        name: &Token,
        value: &Expr,
    ) -> Result<String, Error> {
        Ok(self.parenthesize(&format!("set {}", name.lexeme), &[object, value]))
    }

    fn visit_this_expr(&mut self, _id: NodeId, _keyword: &Token) -> Result<String, Error> {
        Ok("this".to_string())
    }

    fn visit_super_expr(
        &mut self,
        _id: NodeId,
        _keyword: &Token,
        method: &Token,
    ) -> Result<String, Error> {
        Ok(format!("(super {})", method.lexeme))
    }
}

impl stmt::Visitor<String> for AstPrinter {
    fn visit_expression_stmt(&mut self, expression: &Expr) -> Result<String, Error> {
        Ok(self.parenthesize(";", &[expression]))
    }

    fn visit_print_stmt(&mut self, expression: &Expr) -> Result<String, Error> {
        Ok(self.parenthesize("print", &[expression]))
    }

    fn visit_if_stmt(
        &mut self,
        condition: &Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
    ) -> Result<String, Error> {
        let cond = self.print_expr(condition);
        let then_s = self.print_stmt(then_branch);
        match else_branch {
            Some(else_s) => {
                let else_rendered = self.print_stmt(else_s);
                Ok(format!("(if {cond} {then_s} {else_rendered})"))
            }
            None => Ok(format!("(if {cond} {then_s})")),
        }
    }

    fn visit_while_stmt(&mut self, condition: &Expr, body: &Stmt) -> Result<String, Error> {
        let cond = self.print_expr(condition);
        let body_s = self.print_stmt(body);
        Ok(format!("(while {cond} {body_s})"))
    }

    fn visit_return_stmt(
        &mut self,
        _keyword: &Token,
        value: &Option<Expr>,
    ) -> Result<String, Error> {
        match value {
            Some(v) => Ok(self.parenthesize("return", &[v])),
            None => Ok("(return)".to_string()),
        }
    }

    fn visit_block_stmt(&mut self, statements: &[Stmt]) -> Result<String, Error> {
        let refs: Vec<&Stmt> = statements.iter().collect();
        Ok(self.parenthesize_stmts("block", &[], &refs))
    }

    fn visit_var_stmt(
        &mut self,
        name: &Token,
        initializer: &Option<Expr>,
    ) -> Result<String, Error> {
        match initializer {
            Some(init) => Ok(self.parenthesize(&format!("var {}", name.lexeme), &[init])),
            None => Ok(format!("(var {})", name.lexeme)),
        }
    }

    fn visit_function_stmt(
        &mut self,
        name: &Token,
        params: &[Token],
        body: &[Stmt],
    ) -> Result<String, Error> {
        let param_names: Vec<&str> = params.iter().map(|p| p.lexeme.as_str()).collect();
        let refs: Vec<&Stmt> = body.iter().collect();
        Ok(self.parenthesize_stmts(
            &format!("fun {}({})", name.lexeme, param_names.join(" ")),
            &[],
            &refs,
        ))
    }

    fn visit_class_stmt(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Stmt],
    ) -> Result<String, Error> {
        let header = match superclass {
            Some(super_expr) => format!("class {} < {}", name.lexeme, self.print_expr(super_expr)),
            None => format!("class {}", name.lexeme),
        };
        let refs: Vec<&Stmt> = methods.iter().collect();
        Ok(self.parenthesize_stmts(&header, &[], &refs))
    }

    fn visit_null_stmt(&mut self) -> Result<String, Error> {
        Ok("(null)".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn tok(tpe: TokenType, lexeme: &str) -> Token {
        Token::new(tpe, lexeme, 1, 0, lexeme.len())
    }

    #[test]
    fn prints_nested_binary_expression() {
        let expression = Expr::binary(
            Box::new(Expr::unary(
                tok(TokenType::Minus, "-"),
                Box::new(Expr::literal(LiteralValue::Number(123.0))),
            )),
            tok(TokenType::Star, "*"),
            Box::new(Expr::grouping(Box::new(Expr::literal(LiteralValue::Number(
                45.67,
            ))))),
        );

        let mut printer = AstPrinter;
        assert_eq!(printer.print_expr(&expression), "(* (- 123) (group 45.67))");
    }

    #[test]
    fn node_ids_are_distinct() {
        let a = Expr::literal(LiteralValue::Nil);
        let b = Expr::literal(LiteralValue::Nil);
        assert_ne!(a.id(), b.id());
    }
}
