/*
 * parser.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template parser.
//!
//! A hand-written scanner over the raw source producing the AST in
//! [`crate::ast`]. Text runs are split into newline / whitespace / other
//! tokens for the whitespace normalizer. Tag kinds are tried in priority
//! order: comment, raw expression, block, partial, close tag, inverted
//! block or `{{^}}` separator, `{{else}}` separator, escaped expression —
//! blocks before plain expressions because both start with `{{`.
//!
//! A structural failure reports the 1-based line and the character offset
//! within that line, located by walking back to the last preceding newline.

use quarto_source_map::{offset_to_location, range_from_offsets, Location, Range};

use crate::ast::{Arg, BlockNode, Expression, LiteralValue, Node, PartialNode, Path, Segment};
use crate::error::{TemplateError, TemplateResult};

/// Parse template source into an AST.
pub fn parse(source: &str) -> TemplateResult<Vec<Node>> {
    let mut parser = Parser { source, pos: 0 };
    let (nodes, term) = parser.parse_nodes()?;
    match term {
        Terminator::Eof => Ok(nodes),
        Terminator::Close { name, offset } => {
            Err(parser.error_at(offset, format!("unexpected '{{{{/{name}}}}}'")))
        }
        Terminator::Else { offset } => Err(parser.error_at(offset, "unexpected '{{else}}'")),
    }
}

/// Why a body parse stopped.
enum Terminator {
    Eof,
    Close { name: String, offset: usize },
    Else { offset: usize },
}

struct Parser<'a> {
    source: &'a str,
    pos: usize,
}

fn is_symbol_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '@' | '$' | '.' | '/')
}

fn is_safe_symbol(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split a raw path token into segments. `.` and `/` separate; `..`
/// ascends; `@..` ascends carrying the `@`-prefix to the next segment.
fn parse_path(raw: &str) -> Path {
    let mut segments = Vec::new();
    let mut i = 0;
    while i < raw.len() {
        let rest = &raw[i..];
        if rest.starts_with("@..") {
            segments.push(Segment::ParentAttr);
            i += 3;
        } else if rest.starts_with("..") {
            segments.push(Segment::Parent);
            i += 2;
        } else if rest.starts_with('.') || rest.starts_with('/') {
            i += 1;
        } else {
            let end = rest
                .find(['.', '/'])
                .map(|j| i + j)
                .unwrap_or(raw.len());
            let symbol = &raw[i..end];
            if symbol == "this" {
                segments.push(Segment::This);
            } else {
                segments.push(Segment::Name(symbol.to_string()));
            }
            i = end;
        }
    }
    if segments.is_empty() {
        segments.push(Segment::This);
    }
    Path { segments }
}

fn keyword_or_path(token: &str) -> Arg {
    match token {
        "true" => Arg::Literal(LiteralValue::Bool(true)),
        "false" => Arg::Literal(LiteralValue::Bool(false)),
        "null" | "undefined" => Arg::Literal(LiteralValue::Null),
        _ => Arg::Path(parse_path(token)),
    }
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn looking_at(&self, pat: &str) -> bool {
        self.rest().starts_with(pat)
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    fn skip_tag_ws(&mut self) {
        while let Some(c) = self.peek_char() {
            if matches!(c, ' ' | '\t' | '\r' | '\n') {
                self.advance(1);
            } else {
                break;
            }
        }
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> TemplateError {
        let clamped = offset.min(self.source.len());
        let loc = offset_to_location(self.source, clamped).unwrap_or(Location {
            offset: clamped,
            row: 0,
            column: 0,
        });
        TemplateError::Parse {
            line: loc.row + 1,
            character: loc.column + 1,
            message: message.into(),
        }
    }

    fn parse_nodes(&mut self) -> TemplateResult<(Vec<Node>, Terminator)> {
        let mut nodes = Vec::new();
        loop {
            if self.at_end() {
                return Ok((nodes, Terminator::Eof));
            }
            if !self.looking_at("{{") {
                self.scan_text(&mut nodes);
                continue;
            }
            if self.looking_at("{{!") {
                nodes.push(self.parse_comment()?);
            } else if self.looking_at("{{{") {
                nodes.push(Node::Expand(self.parse_expression_tag(3, "}}}")?));
            } else if self.looking_at("{{&") {
                nodes.push(Node::Expand(self.parse_expression_tag(3, "}}")?));
            } else if self.looking_at("{{#") {
                nodes.push(self.parse_block(false)?);
            } else if self.looking_at("{{>") {
                nodes.push(self.parse_partial()?);
            } else if self.looking_at("{{/") {
                let offset = self.pos;
                let name = self.parse_close_tag()?;
                return Ok((nodes, Terminator::Close { name, offset }));
            } else if self.looking_at("{{^") {
                let save = self.pos;
                self.advance(3);
                self.skip_tag_ws();
                if self.looking_at("}}") {
                    self.advance(2);
                    return Ok((nodes, Terminator::Else { offset: save }));
                }
                self.pos = save;
                nodes.push(self.parse_block(true)?);
            } else if let Some(offset) = self.try_else_tag() {
                return Ok((nodes, Terminator::Else { offset }));
            } else {
                nodes.push(Node::EscapedExpand(self.parse_expression_tag(2, "}}")?));
            }
        }
    }

    /// Consume `{{else}}` if that is what comes next.
    fn try_else_tag(&mut self) -> Option<usize> {
        let save = self.pos;
        self.advance(2);
        self.skip_tag_ws();
        if self.looking_at("else") {
            let boundary_ok = self.rest()[4..]
                .chars()
                .next()
                .map(|c| !is_symbol_char(c))
                .unwrap_or(true);
            if boundary_ok {
                self.advance(4);
                self.skip_tag_ws();
                if self.looking_at("}}") {
                    self.advance(2);
                    return Some(save);
                }
            }
        }
        self.pos = save;
        None
    }

    /// Consume a text run up to the next tag, split into newline /
    /// whitespace / other tokens.
    fn scan_text(&mut self, nodes: &mut Vec<Node>) {
        while !self.at_end() && !self.looking_at("{{") {
            match self.peek_char() {
                Some('\r') => {
                    if self.looking_at("\r\n") {
                        nodes.push(Node::Newline("\r\n".to_string()));
                        self.advance(2);
                    } else {
                        nodes.push(Node::Newline("\r".to_string()));
                        self.advance(1);
                    }
                }
                Some('\n') => {
                    nodes.push(Node::Newline("\n".to_string()));
                    self.advance(1);
                }
                Some(' ' | '\t') => {
                    let start = self.pos;
                    while matches!(self.peek_char(), Some(' ' | '\t')) {
                        self.advance(1);
                    }
                    nodes.push(Node::Whitespace(self.source[start..self.pos].to_string()));
                }
                Some(_) => {
                    let start = self.pos;
                    while !self.at_end() && !self.looking_at("{{") {
                        match self.peek_char() {
                            Some('\r' | '\n' | ' ' | '\t') | None => break,
                            Some(c) => self.advance(c.len_utf8()),
                        }
                    }
                    nodes.push(Node::Text(self.source[start..self.pos].to_string()));
                }
                None => break,
            }
        }
    }

    fn parse_comment(&mut self) -> TemplateResult<Node> {
        if self.looking_at("{{!--") {
            let content_start = self.pos + 5;
            match self.source[content_start..].find("--}}") {
                Some(j) => {
                    let text = self.source[content_start..content_start + j].to_string();
                    self.pos = content_start + j + 4;
                    Ok(Node::Comment(text))
                }
                None => Err(self.error_at(self.pos, "expected '--}}'")),
            }
        } else {
            let content_start = self.pos + 3;
            match self.source[content_start..].find("}}") {
                Some(j) => {
                    let text = self.source[content_start..content_start + j].to_string();
                    self.pos = content_start + j + 2;
                    Ok(Node::Comment(text))
                }
                None => Err(self.error_at(self.pos, "expected '}}'")),
            }
        }
    }

    fn parse_expression_tag(&mut self, open_len: usize, close: &str) -> TemplateResult<Expression> {
        self.advance(open_len);
        self.skip_tag_ws();
        let token = self.read_path_token();
        if token.is_empty() {
            return Err(self.error_at(self.pos, "expected a path"));
        }
        let path = parse_path(token);
        let (args, kwargs) = self.parse_args(close)?;
        Ok(Expression { path, args, kwargs })
    }

    fn parse_args(&mut self, close: &str) -> TemplateResult<(Vec<Arg>, Vec<(String, Arg)>)> {
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        loop {
            self.skip_tag_ws();
            if self.looking_at(close) {
                self.advance(close.len());
                return Ok((args, kwargs));
            }
            if self.at_end() {
                return Err(self.error_at(self.pos, format!("expected '{close}'")));
            }
            self.parse_arg_into(&mut args, &mut kwargs)?;
        }
    }

    fn parse_arg_into(
        &mut self,
        args: &mut Vec<Arg>,
        kwargs: &mut Vec<(String, Arg)>,
    ) -> TemplateResult<()> {
        let c = match self.peek_char() {
            Some(c) => c,
            None => return Err(self.error_at(self.pos, "expected an argument")),
        };
        if c == '(' {
            args.push(self.parse_subexpr()?);
            return Ok(());
        }
        if c == '"' || c == '\'' {
            let s = self.parse_string_literal(c)?;
            args.push(Arg::Literal(LiteralValue::Str(s)));
            return Ok(());
        }
        if c.is_ascii_digit() || (c == '-' && self.second_char_is_digit()) {
            let n = self.parse_int()?;
            args.push(Arg::Literal(LiteralValue::Int(n)));
            return Ok(());
        }
        let token = self.read_path_token();
        if token.is_empty() {
            return Err(self.error_at(self.pos, format!("unexpected character '{c}'")));
        }
        if self.peek_char() == Some('=') && is_safe_symbol(token) {
            self.advance(1);
            let value = self.parse_arg_value()?;
            kwargs.push((token.to_string(), value));
            return Ok(());
        }
        args.push(keyword_or_path(token));
        Ok(())
    }

    fn parse_arg_value(&mut self) -> TemplateResult<Arg> {
        match self.peek_char() {
            Some('(') => self.parse_subexpr(),
            Some(q @ ('"' | '\'')) => Ok(Arg::Literal(LiteralValue::Str(
                self.parse_string_literal(q)?,
            ))),
            Some(c) if c.is_ascii_digit() || (c == '-' && self.second_char_is_digit()) => {
                Ok(Arg::Literal(LiteralValue::Int(self.parse_int()?)))
            }
            _ => {
                let token = self.read_path_token();
                if token.is_empty() {
                    Err(self.error_at(self.pos, "expected a value"))
                } else {
                    Ok(keyword_or_path(token))
                }
            }
        }
    }

    fn parse_subexpr(&mut self) -> TemplateResult<Arg> {
        self.advance(1); // consume '('
        self.skip_tag_ws();
        let name = self.read_path_token();
        if name.is_empty() {
            return Err(self.error_at(self.pos, "expected a helper name"));
        }
        let name = name.to_string();
        let (args, kwargs) = self.parse_args(")")?;
        Ok(Arg::SubExpr { name, args, kwargs })
    }

    fn parse_string_literal(&mut self, quote: char) -> TemplateResult<String> {
        let start = self.pos;
        self.advance(1);
        let mut out = String::new();
        loop {
            let c = match self.peek_char() {
                Some(c) => c,
                None => return Err(self.error_at(start, "unterminated string literal")),
            };
            if c == quote {
                self.advance(1);
                return Ok(out);
            }
            if c == '\\' {
                self.advance(1);
                let esc = match self.peek_char() {
                    Some(e) => e,
                    None => return Err(self.error_at(start, "unterminated string literal")),
                };
                match esc {
                    'n' => out.push('\n'),
                    'r' => out.push('\r'),
                    '\\' => out.push('\\'),
                    '\'' => out.push('\''),
                    '"' => out.push('"'),
                    other => {
                        return Err(
                            self.error_at(self.pos, format!("invalid escape sequence '\\{other}'"))
                        );
                    }
                }
                self.advance(esc.len_utf8());
            } else {
                out.push(c);
                self.advance(c.len_utf8());
            }
        }
    }

    fn second_char_is_digit(&self) -> bool {
        let mut chars = self.rest().chars();
        chars.next();
        matches!(chars.next(), Some(c) if c.is_ascii_digit())
    }

    fn parse_int(&mut self) -> TemplateResult<i64> {
        let start = self.pos;
        if self.peek_char() == Some('-') {
            self.advance(1);
        }
        while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
            self.advance(1);
        }
        self.source[start..self.pos]
            .parse::<i64>()
            .map_err(|_| self.error_at(start, "invalid integer literal"))
    }

    fn read_path_token(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.source[self.pos..].chars().next() {
            if is_symbol_char(c) {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        &self.source[start..self.pos]
    }

    fn parse_block(&mut self, inverted: bool) -> TemplateResult<Node> {
        let open_offset = self.pos;
        self.advance(3); // {{# or {{^
        self.skip_tag_ws();
        let name_token = self.read_path_token();
        if name_token.is_empty() {
            return Err(self.error_at(self.pos, "expected a block name"));
        }
        let name = name_token.to_string();
        let path = parse_path(&name);
        let (args, kwargs) = self.parse_args("}}")?;
        let open_range = range_from_offsets(open_offset, self.pos);
        let sigil = if inverted { '^' } else { '#' };

        let (body, term) = self.parse_nodes()?;
        let (body, alt) = match term {
            Terminator::Close {
                name: close_name,
                offset,
            } => {
                if close_name != name {
                    return Err(self.close_mismatch_error(&name, &close_name, offset));
                }
                (body, None)
            }
            Terminator::Else { .. } => {
                let (alt_body, term2) = self.parse_nodes()?;
                match term2 {
                    Terminator::Close {
                        name: close_name,
                        offset,
                    } => {
                        if close_name != name {
                            return Err(self.close_mismatch_error(&name, &close_name, offset));
                        }
                        (body, Some(alt_body))
                    }
                    Terminator::Else { offset } => {
                        return Err(self.error_at(offset, "unexpected '{{else}}'"));
                    }
                    Terminator::Eof => {
                        return Err(self.unclosed_block_error(sigil, &name, &open_range));
                    }
                }
            }
            Terminator::Eof => {
                return Err(self.unclosed_block_error(sigil, &name, &open_range));
            }
        };

        let block = BlockNode {
            name,
            path,
            args,
            kwargs,
            body,
            alt,
        };
        Ok(if inverted {
            Node::InvertedBlock(block)
        } else {
            Node::Block(block)
        })
    }

    fn close_mismatch_error(&self, expected: &str, found: &str, offset: usize) -> TemplateError {
        self.error_at(
            offset,
            format!("expected '{{{{/{expected}}}}}' but found '{{{{/{found}}}}}'"),
        )
    }

    fn unclosed_block_error(&self, sigil: char, name: &str, open: &Range) -> TemplateError {
        let loc = offset_to_location(self.source, open.start.offset).unwrap_or(Location {
            offset: open.start.offset,
            row: 0,
            column: 0,
        });
        self.error_at(
            self.pos,
            format!(
                "unclosed block '{{{{{sigil}{name}}}}}' opened at line {}, character {}; expected '{{{{/{name}}}}}'",
                loc.row + 1,
                loc.column + 1
            ),
        )
    }

    fn parse_close_tag(&mut self) -> TemplateResult<String> {
        self.advance(3); // {{/
        self.skip_tag_ws();
        let name = self.read_path_token();
        if name.is_empty() {
            return Err(self.error_at(self.pos, "expected a block name"));
        }
        let name = name.to_string();
        self.skip_tag_ws();
        if !self.looking_at("}}") {
            return Err(self.error_at(self.pos, "expected '}}'"));
        }
        self.advance(2);
        Ok(name)
    }

    fn parse_partial(&mut self) -> TemplateResult<Node> {
        self.advance(3); // {{>
        self.skip_tag_ws();
        let name = self.read_path_token();
        if name.is_empty() {
            return Err(self.error_at(self.pos, "expected a partial name"));
        }
        let name = name.to_string();

        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        loop {
            self.skip_tag_ws();
            if self.looking_at("}}") {
                self.advance(2);
                break;
            }
            if self.at_end() {
                return Err(self.error_at(self.pos, "expected '}}'"));
            }
            let arg_offset = self.pos;
            self.parse_arg_into(&mut args, &mut kwargs)?;
            if args.len() > 1 {
                return Err(self.error_at(
                    arg_offset,
                    format!("partial '{name}' accepts at most one context argument"),
                ));
            }
        }

        Ok(Node::Partial(PartialNode {
            name,
            arg: args.pop(),
            kwargs,
        }))
    }
}
