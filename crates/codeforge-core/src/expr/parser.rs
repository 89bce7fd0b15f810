//! Recursive-descent parser producing the expression AST.
//!
//! Precedence, lowest first:
//! `?:`, `?? ||`, `&&`, `== != === !==`, `< <= > >=`, `+ -`, `* / %`,
//! unary `! -`, postfix member/index/call.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::errors::{ForgeError, ForgeResult};
use crate::expr::lexer::{tokenize, Tok, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    LooseEq,
    LooseNe,
    StrictEq,
    StrictNe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Literal(Value),
    Undefined,
    Ident(String),
    Array(Vec<Node>),
    Object(Vec<(String, Node)>),
    Member {
        object: Box<Node>,
        property: String,
        optional: bool,
    },
    Index {
        object: Box<Node>,
        index: Box<Node>,
        optional: bool,
    },
    Call {
        callee: Box<Node>,
        args: Vec<Node>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    Conditional {
        test: Box<Node>,
        then: Box<Node>,
        otherwise: Box<Node>,
    },
    Lambda {
        params: Vec<String>,
        body: Box<Node>,
    },
}

impl Node {
    /// Collect free root identifiers (data-source ids and scope variables).
    ///
    /// Lambda parameters are bound inside their bodies and are not reported.
    pub fn collect_refs(&self, bound: &mut Vec<String>, out: &mut BTreeSet<String>) {
        match self {
            Node::Literal(_) | Node::Undefined => {}
            Node::Ident(name) => {
                if !bound.iter().any(|b| b == name) {
                    out.insert(name.clone());
                }
            }
            Node::Array(items) => items.iter().for_each(|n| n.collect_refs(bound, out)),
            Node::Object(fields) => fields.iter().for_each(|(_, n)| n.collect_refs(bound, out)),
            Node::Member { object, .. } => object.collect_refs(bound, out),
            Node::Index { object, index, .. } => {
                object.collect_refs(bound, out);
                index.collect_refs(bound, out);
            }
            Node::Call { callee, args } => {
                callee.collect_refs(bound, out);
                args.iter().for_each(|n| n.collect_refs(bound, out));
            }
            Node::Unary { operand, .. } => operand.collect_refs(bound, out),
            Node::Binary { left, right, .. } | Node::Logical { left, right, .. } => {
                left.collect_refs(bound, out);
                right.collect_refs(bound, out);
            }
            Node::Conditional {
                test,
                then,
                otherwise,
            } => {
                test.collect_refs(bound, out);
                then.collect_refs(bound, out);
                otherwise.collect_refs(bound, out);
            }
            Node::Lambda { params, body } => {
                let before = bound.len();
                bound.extend(params.iter().cloned());
                body.collect_refs(bound, out);
                bound.truncate(before);
            }
        }
    }
}

/// Parse a complete expression.
pub fn parse(src: &str) -> ForgeResult<Node> {
    let tokens = tokenize(src)?;
    let mut p = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let node = p.expression()?;
    if p.peek() != &Tok::Eof {
        return Err(p.error(format!("unexpected token {:?}", p.peek())));
    }
    Ok(node)
}

const MAX_NESTING: usize = 256;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].tok
    }

    fn peek_at(&self, ahead: usize) -> &Tok {
        &self.tokens[(self.pos + ahead).min(self.tokens.len() - 1)].tok
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].offset
    }

    fn advance(&mut self) -> Tok {
        let t = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == tok {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Tok, what: &str) -> ForgeResult<()> {
        if self.eat(&tok) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}, found {:?}", self.peek())))
        }
    }

    fn error(&self, message: impl Into<String>) -> ForgeError {
        ForgeError::Syntax {
            offset: self.offset(),
            message: message.into(),
        }
    }

    fn expression(&mut self) -> ForgeResult<Node> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error("expression nesting too deep"));
        }
        let node = match self.try_lambda()? {
            Some(lambda) => Ok(lambda),
            None => self.conditional(),
        };
        self.depth -= 1;
        node
    }

    fn try_lambda(&mut self) -> ForgeResult<Option<Node>> {
        // `x => body`
        if let (Tok::Ident(name), Tok::Arrow) = (self.peek().clone(), self.peek_at(1)) {
            self.advance();
            self.advance();
            let body = self.expression()?;
            return Ok(Some(Node::Lambda {
                params: vec![name],
                body: Box::new(body),
            }));
        }

        // `(a, b) => body`
        if self.peek() != &Tok::LParen {
            return Ok(None);
        }
        let mut params = Vec::new();
        let mut ahead = 1;
        loop {
            match self.peek_at(ahead) {
                Tok::RParen => break,
                Tok::Ident(name) => {
                    params.push(name.clone());
                    ahead += 1;
                    match self.peek_at(ahead) {
                        Tok::Comma => ahead += 1,
                        Tok::RParen => break,
                        _ => return Ok(None),
                    }
                }
                _ => return Ok(None),
            }
        }
        if self.peek_at(ahead + 1) != &Tok::Arrow {
            return Ok(None);
        }
        for _ in 0..ahead + 2 {
            self.advance();
        }
        let body = self.expression()?;
        Ok(Some(Node::Lambda {
            params,
            body: Box::new(body),
        }))
    }

    fn conditional(&mut self) -> ForgeResult<Node> {
        let test = self.logical_or()?;
        if self.eat(&Tok::Question) {
            let then = self.expression()?;
            self.expect(Tok::Colon, "':' in conditional expression")?;
            let otherwise = self.expression()?;
            return Ok(Node::Conditional {
                test: Box::new(test),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });
        }
        Ok(test)
    }

    fn logical_or(&mut self) -> ForgeResult<Node> {
        let mut left = self.logical_and()?;
        loop {
            let op = match self.peek() {
                Tok::OrOr => LogicalOp::Or,
                Tok::Nullish => LogicalOp::Nullish,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.logical_and()?;
            left = Node::Logical {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn logical_and(&mut self) -> ForgeResult<Node> {
        let mut left = self.equality()?;
        while self.eat(&Tok::AndAnd) {
            let right = self.equality()?;
            left = Node::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn equality(&mut self) -> ForgeResult<Node> {
        let mut left = self.comparison()?;
        loop {
            let op = match self.peek() {
                Tok::EqEq => BinaryOp::LooseEq,
                Tok::NotEq => BinaryOp::LooseNe,
                Tok::EqEqEq => BinaryOp::StrictEq,
                Tok::NotEqEq => BinaryOp::StrictNe,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.comparison()?;
            left = binary(op, left, right);
        }
    }

    fn comparison(&mut self) -> ForgeResult<Node> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Tok::Lt => BinaryOp::Lt,
                Tok::Le => BinaryOp::Le,
                Tok::Gt => BinaryOp::Gt,
                Tok::Ge => BinaryOp::Ge,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.additive()?;
            left = binary(op, left, right);
        }
    }

    fn additive(&mut self) -> ForgeResult<Node> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Tok::Plus => BinaryOp::Add,
                Tok::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn multiplicative(&mut self) -> ForgeResult<Node> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Tok::Star => BinaryOp::Mul,
                Tok::Slash => BinaryOp::Div,
                Tok::Percent => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = binary(op, left, right);
        }
    }

    fn unary(&mut self) -> ForgeResult<Node> {
        let op = match self.peek() {
            Tok::Bang => UnaryOp::Not,
            Tok::Minus => UnaryOp::Neg,
            Tok::Plus => UnaryOp::Plus,
            _ => return self.postfix(),
        };
        self.advance();
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error("expression nesting too deep"));
        }
        let operand = self.unary()?;
        self.depth -= 1;
        Ok(Node::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn postfix(&mut self) -> ForgeResult<Node> {
        let mut node = self.primary()?;
        loop {
            match self.peek() {
                Tok::Dot | Tok::OptDot => {
                    let optional = self.advance() == Tok::OptDot;
                    if optional && self.peek() == &Tok::LBracket {
                        self.advance();
                        let index = self.expression()?;
                        self.expect(Tok::RBracket, "']'")?;
                        node = Node::Index {
                            object: Box::new(node),
                            index: Box::new(index),
                            optional,
                        };
                        continue;
                    }
                    let Tok::Ident(property) = self.advance() else {
                        return Err(self.error("expected property name after '.'"));
                    };
                    node = Node::Member {
                        object: Box::new(node),
                        property,
                        optional,
                    };
                }
                Tok::LBracket => {
                    self.advance();
                    let index = self.expression()?;
                    self.expect(Tok::RBracket, "']'")?;
                    node = Node::Index {
                        object: Box::new(node),
                        index: Box::new(index),
                        optional: false,
                    };
                }
                Tok::LParen => {
                    self.advance();
                    let args = self.arguments()?;
                    node = Node::Call {
                        callee: Box::new(node),
                        args,
                    };
                }
                _ => return Ok(node),
            }
        }
    }

    fn arguments(&mut self) -> ForgeResult<Vec<Node>> {
        let mut args = Vec::new();
        if self.eat(&Tok::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if self.eat(&Tok::Comma) {
                continue;
            }
            self.expect(Tok::RParen, "')' after arguments")?;
            return Ok(args);
        }
    }

    fn primary(&mut self) -> ForgeResult<Node> {
        match self.advance() {
            Tok::Num(n) => Ok(Node::Literal(super::eval::number(n).unwrap_or(Value::Null))),
            Tok::Str(s) => Ok(Node::Literal(Value::String(s))),
            Tok::Ident(name) => Ok(match name.as_str() {
                "true" => Node::Literal(Value::Bool(true)),
                "false" => Node::Literal(Value::Bool(false)),
                "null" => Node::Literal(Value::Null),
                "undefined" => Node::Undefined,
                _ => Node::Ident(name),
            }),
            Tok::LParen => {
                let inner = self.expression()?;
                self.expect(Tok::RParen, "')'")?;
                Ok(inner)
            }
            Tok::LBracket => {
                let mut items = Vec::new();
                if self.eat(&Tok::RBracket) {
                    return Ok(Node::Array(items));
                }
                loop {
                    items.push(self.expression()?);
                    if self.eat(&Tok::Comma) {
                        if self.eat(&Tok::RBracket) {
                            return Ok(Node::Array(items));
                        }
                        continue;
                    }
                    self.expect(Tok::RBracket, "']' after array items")?;
                    return Ok(Node::Array(items));
                }
            }
            Tok::LBrace => self.object_literal(),
            other => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.error(format!("unexpected token {other:?}")))
            }
        }
    }

    fn object_literal(&mut self) -> ForgeResult<Node> {
        let mut fields = Vec::new();
        if self.eat(&Tok::RBrace) {
            return Ok(Node::Object(fields));
        }
        loop {
            let key = match self.advance() {
                Tok::Ident(k) | Tok::Str(k) => k,
                other => return Err(self.error(format!("expected object key, found {other:?}"))),
            };
            let value = if self.eat(&Tok::Colon) {
                self.expression()?
            } else {
                // shorthand `{ todos }`
                Node::Ident(key.clone())
            };
            fields.push((key, value));
            if self.eat(&Tok::Comma) {
                if self.eat(&Tok::RBrace) {
                    return Ok(Node::Object(fields));
                }
                continue;
            }
            self.expect(Tok::RBrace, "'}' after object fields")?;
            return Ok(Node::Object(fields));
        }
    }
}

fn binary(op: BinaryOp, left: Node, right: Node) -> Node {
    Node::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
