/*
 * Copyright 2022 Collabora, Ltd.
 *
 * SPDX-License-Identifier: MIT
 */
//! Style sheet compilation.
//!
//! Top-level `@name: value;` definitions are collected and substituted into
//! declaration values, then the sheet is minified: comments go, whitespace is
//! squeezed, and redundant semicolons are dropped.

use std::collections::HashMap;

use log::trace;

use super::MinifyError;

type MinifyResult<T> = Result<T, MinifyError>;

/// No whitespace is needed after these
const TIGHT_AFTER: &str = "{};,>:";
/// No whitespace is needed before these
const TIGHT_BEFORE: &str = "{};,>)!";

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

struct Compiler {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    out: String,
    pending_space: bool,
    in_value: bool,
    open_blocks: Vec<usize>,
    variables: HashMap<String, String>,
}

impl Compiler {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            out: String::with_capacity(source.len()),
            pending_space: false,
            in_value: false,
            open_blocks: Vec::new(),
            variables: HashMap::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn emit(&mut self, c: char) {
        if self.pending_space {
            self.pending_space = false;
            if let Some(last) = self.out.chars().next_back() {
                if !TIGHT_AFTER.contains(last) && !TIGHT_BEFORE.contains(c) {
                    self.out.push(' ');
                }
            }
        }
        self.out.push(c);
    }

    fn emit_str(&mut self, s: &str) {
        let mut chars = s.chars();
        if let Some(first) = chars.next() {
            self.emit(first);
            self.out.extend(chars);
        }
    }

    fn skip_comment(&mut self) -> MinifyResult<()> {
        // opening "/*"
        self.bump();
        self.bump();
        loop {
            match self.bump() {
                Some('*') if self.peek() == Some('/') => {
                    self.bump();
                    return Ok(());
                }
                Some(_) => {}
                None => return Err(MinifyError::UnterminatedComment),
            }
        }
    }

    fn read_string(&mut self, quote: char) -> MinifyResult<String> {
        let mut s = String::new();
        s.push(quote);
        self.bump();
        loop {
            match self.bump() {
                Some(c) if c == quote => {
                    s.push(c);
                    return Ok(s);
                }
                Some('\\') => {
                    s.push('\\');
                    match self.bump() {
                        Some(c) => s.push(c),
                        None => return Err(MinifyError::UnterminatedString),
                    }
                }
                Some('\n') | None => return Err(MinifyError::UnterminatedString),
                Some(c) => s.push(c),
            }
        }
    }

    fn read_ident(&mut self) -> String {
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if !is_ident(c) {
                break;
            }
            ident.push(c);
            self.bump();
        }
        ident
    }

    /// Whether a `url(` token starts here, rather than the tail of a
    /// longer identifier
    fn url_follows(&self) -> bool {
        let follows = self
            .chars
            .get(self.pos..self.pos + 4)
            .map_or(false, |w| {
                w.iter()
                    .map(char::to_ascii_lowercase)
                    .eq("url(".chars())
            });
        let joined = !self.pending_space && self.out.chars().next_back().map_or(false, is_ident);
        follows && !joined
    }

    /// Copy a `url(...)` token through untouched
    fn read_url(&mut self) -> MinifyResult<String> {
        let mut s = String::new();
        for _ in 0..4 {
            s.extend(self.bump());
        }
        loop {
            match self.peek() {
                Some(')') => {
                    self.bump();
                    s.push(')');
                    return Ok(s);
                }
                Some(q) if q == '"' || q == '\'' => s.push_str(&self.read_string(q)?),
                Some('\\') => {
                    self.bump();
                    s.push('\\');
                    s.extend(self.bump());
                }
                Some('\n') | None => return Err(MinifyError::UnterminatedUrl),
                Some(c) => {
                    self.bump();
                    s.push(c);
                }
            }
        }
    }

    fn lookup(&self, name: &str) -> MinifyResult<String> {
        self.variables
            .get(name)
            .cloned()
            .ok_or_else(|| MinifyError::UndefinedVariable(name.to_string()))
    }

    /// Expand references to earlier definitions inside a variable's value
    fn expand(&self, value: &str) -> MinifyResult<String> {
        let mut out = String::with_capacity(value.len());
        let mut chars = value.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '@' {
                let mut name = String::new();
                while let Some(&n) = chars.peek() {
                    if !is_ident(n) {
                        break;
                    }
                    name.push(n);
                    chars.next();
                }
                out.push_str(&self.lookup(&name)?);
            } else {
                out.push(c);
            }
        }
        Ok(out.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    fn define_variable(&mut self, name: String) -> MinifyResult<()> {
        // the colon
        self.bump();
        let mut raw = String::new();
        loop {
            match self.peek() {
                Some(';') => {
                    self.bump();
                    break;
                }
                Some(q) if q == '"' || q == '\'' => raw.push_str(&self.read_string(q)?),
                Some('/') if self.chars.get(self.pos + 1) == Some(&'*') => self.skip_comment()?,
                Some(c) => {
                    raw.push(c);
                    self.bump();
                }
                None => break,
            }
        }
        let value = self.expand(raw.trim())?;
        trace!("style variable @{} = {}", name, value);
        self.variables.insert(name, value);
        Ok(())
    }

    fn at_keyword(&mut self) -> MinifyResult<()> {
        self.bump();
        let name = self.read_ident();
        if self.open_blocks.is_empty() && !name.is_empty() && self.peek() == Some(':') {
            return self.define_variable(name);
        }
        if self.in_value {
            let value = self.lookup(&name)?;
            self.emit_str(&value);
        } else {
            self.emit('@');
            self.out.push_str(&name);
        }
        Ok(())
    }

    fn run(mut self) -> MinifyResult<String> {
        while let Some(c) = self.peek() {
            match c {
                '/' if self.chars.get(self.pos + 1) == Some(&'*') => {
                    self.skip_comment()?;
                }
                '"' | '\'' => {
                    let s = self.read_string(c)?;
                    self.emit_str(&s);
                }
                '@' => self.at_keyword()?,
                'u' | 'U' if self.url_follows() => {
                    let url = self.read_url()?;
                    self.emit_str(&url);
                }
                '{' => {
                    self.open_blocks.push(self.line);
                    self.in_value = false;
                    self.bump();
                    self.emit('{');
                }
                '}' => {
                    if self.open_blocks.pop().is_none() {
                        return Err(MinifyError::UnexpectedClose(self.line));
                    }
                    self.in_value = false;
                    self.bump();
                    self.pending_space = false;
                    if self.out.ends_with(';') {
                        self.out.pop();
                    }
                    self.out.push('}');
                }
                ';' => {
                    self.in_value = false;
                    self.bump();
                    self.pending_space = false;
                    if !self.out.ends_with(';') && !self.out.ends_with('{') {
                        self.out.push(';');
                    }
                }
                ':' => {
                    if !self.open_blocks.is_empty() {
                        self.in_value = true;
                    }
                    self.bump();
                    self.emit(':');
                }
                c if c.is_whitespace() => {
                    self.bump();
                    self.pending_space = true;
                }
                c => {
                    self.bump();
                    self.emit(c);
                }
            }
        }

        if let Some(line) = self.open_blocks.pop() {
            return Err(MinifyError::UnclosedBlock(line));
        }
        Ok(self.out.trim().to_string())
    }
}

/// Compile a style sheet with full minification.
pub fn compile(source: &str) -> Result<String, MinifyError> {
    Compiler::new(source).run()
}
