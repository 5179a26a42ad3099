/*
 * Copyright 2022 Collabora, Ltd.
 *
 * SPDX-License-Identifier: MIT
 */
//! Script minification using Douglas Crockford's JSMin algorithm.
//!
//! Comments are removed and whitespace is squeezed, but line breaks that may
//! terminate a statement are kept as `\n`. Callers that need single-line output
//! must deal with those themselves.

use std::str::Chars;

use super::MinifyError;

type MinifyResult<T> = Result<T, MinifyError>;

fn is_alphanum(c: Option<char>) -> bool {
    match c {
        Some(c) => c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '\\' || (c as u32) > 126,
        None => false,
    }
}

fn is_operator(c: Option<char>) -> bool {
    matches!(c, Some('+') | Some('-') | Some('*') | Some('/'))
}

/// Characters after which a `/` starts a regular expression literal
fn precedes_regex(c: Option<char>) -> bool {
    match c {
        Some(c) => "(,=:[!&|?+-~*/{};".contains(c),
        None => false,
    }
}

struct JsMin<'a> {
    input: Chars<'a>,
    out: String,
    a: Option<char>,
    b: Option<char>,
    lookahead: Option<char>,
    x: Option<char>,
    y: Option<char>,
}

impl<'a> JsMin<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            input: source.chars(),
            out: String::with_capacity(source.len()),
            a: Some('\n'),
            b: None,
            lookahead: None,
            x: None,
            y: None,
        }
    }

    fn put(&mut self, c: Option<char>) {
        if let Some(c) = c {
            self.out.push(c);
        }
    }

    /// Next input character, with control characters other than newline
    /// turned into spaces.
    fn get(&mut self) -> Option<char> {
        match self.lookahead.take().or_else(|| self.input.next()) {
            Some('\r') => Some('\n'),
            Some(c) if c >= ' ' || c == '\n' => Some(c),
            Some(_) => Some(' '),
            None => None,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.lookahead = self.get();
        self.lookahead
    }

    /// Next input character, skipping comments.
    fn next(&mut self) -> MinifyResult<Option<char>> {
        let mut c = self.get();
        if c == Some('/') {
            match self.peek() {
                Some('/') => loop {
                    c = self.get();
                    if c.is_none() || c == Some('\n') {
                        break;
                    }
                },
                Some('*') => {
                    self.get();
                    while c != Some(' ') {
                        match self.get() {
                            Some('*') => {
                                if self.peek() == Some('/') {
                                    self.get();
                                    c = Some(' ');
                                }
                            }
                            None => return Err(MinifyError::UnterminatedComment),
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }
        self.y = self.x;
        self.x = c;
        Ok(c)
    }

    fn copy_string(&mut self) -> MinifyResult<()> {
        loop {
            self.put(self.a);
            self.a = self.get();
            if self.a == self.b {
                return Ok(());
            }
            if self.a == Some('\\') {
                self.put(self.a);
                self.a = self.get();
            }
            if self.a.is_none() {
                return Err(MinifyError::UnterminatedString);
            }
        }
    }

    fn copy_regex(&mut self) -> MinifyResult<()> {
        self.put(self.a);
        if matches!(self.a, Some('/') | Some('*')) {
            self.put(Some(' '));
        }
        self.put(self.b);
        loop {
            self.a = self.get();
            if self.a == Some('[') {
                loop {
                    self.put(self.a);
                    self.a = self.get();
                    if self.a == Some(']') {
                        break;
                    }
                    if self.a == Some('\\') {
                        self.put(self.a);
                        self.a = self.get();
                    }
                    if self.a.is_none() {
                        return Err(MinifyError::UnterminatedRegexSet);
                    }
                }
            } else if self.a == Some('/') {
                if matches!(self.peek(), Some('/') | Some('*')) {
                    return Err(MinifyError::UnterminatedRegexSet);
                }
                break;
            } else if self.a == Some('\\') {
                self.put(self.a);
                self.a = self.get();
            }
            if self.a.is_none() {
                return Err(MinifyError::UnterminatedRegex);
            }
            self.put(self.a);
        }
        self.b = self.next()?;
        Ok(())
    }

    /// 1: output A, copy B to A, fetch B.
    /// 2: copy B to A, fetch B.
    /// 3: fetch B.
    fn action(&mut self, d: u8) -> MinifyResult<()> {
        if d <= 1 {
            self.put(self.a);
            if matches!(self.y, Some('\n') | Some(' ')) && is_operator(self.a) && is_operator(self.b)
            {
                self.put(self.y);
            }
        }
        if d <= 2 {
            self.a = self.b;
            if matches!(self.a, Some('\'') | Some('"') | Some('`')) {
                self.copy_string()?;
            }
        }
        self.b = self.next()?;
        if self.b == Some('/') && precedes_regex(self.a) {
            self.copy_regex()?;
        }
        Ok(())
    }

    fn run(mut self) -> MinifyResult<String> {
        self.action(3)?;
        while self.a.is_some() {
            let d = match self.a {
                Some(' ') => {
                    if is_alphanum(self.b) {
                        1
                    } else {
                        2
                    }
                }
                Some('\n') => match self.b {
                    Some('{') | Some('[') | Some('(') | Some('+') | Some('-') | Some('!')
                    | Some('~') => 1,
                    Some(' ') => 3,
                    _ if is_alphanum(self.b) => 1,
                    _ => 2,
                },
                _ => match self.b {
                    Some(' ') => {
                        if is_alphanum(self.a) {
                            1
                        } else {
                            3
                        }
                    }
                    Some('\n') => match self.a {
                        Some('}') | Some(']') | Some(')') | Some('+') | Some('-') | Some('"')
                        | Some('\'') | Some('`') => 1,
                        _ if is_alphanum(self.a) => 1,
                        _ => 3,
                    },
                    _ => 1,
                },
            };
            self.action(d)?;
        }
        Ok(self.out.trim().to_string())
    }
}

/// Minify script source. Statement-terminating line breaks survive as `\n`.
pub fn minify(source: &str) -> Result<String, MinifyError> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    JsMin::new(source).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squeezes_whitespace() {
        assert_eq!(
            minify("var a = 1;\n\nvar b  =  2;\n").unwrap(),
            "var a=1;var b=2;"
        );
    }

    #[test]
    fn keeps_statement_line_breaks() {
        assert_eq!(minify("a = 1\nb = 2\n").unwrap(), "a=1\nb=2");
    }

    #[test]
    fn strips_comments() {
        let src = "// leading\nvar x = 1; /* block\n comment */ var y = 2; // trailing\n";
        assert_eq!(minify(src).unwrap(), "var x=1;var y=2;");
    }

    #[test]
    fn keeps_strings_intact() {
        assert_eq!(
            minify("var s = \"a  // not a comment\";").unwrap(),
            "var s=\"a  // not a comment\";"
        );
        assert_eq!(minify("var t = 'it\\'s';").unwrap(), "var t='it\\'s';");
    }

    #[test]
    fn keeps_regex_literals_intact() {
        assert_eq!(
            minify("var r = /a\\/b [c]/g;").unwrap(),
            "var r=/a\\/b [c]/g;"
        );
    }

    #[test]
    fn separates_adjacent_operators() {
        assert_eq!(minify("a + ++b").unwrap(), "a+ ++b");
    }

    #[test]
    fn strips_byte_order_mark() {
        assert_eq!(minify("\u{feff}var a;").unwrap(), "var a;");
    }

    #[test]
    fn rejects_unterminated_input() {
        assert_eq!(minify("var a; /* open"), Err(MinifyError::UnterminatedComment));
        assert_eq!(minify("var s = \"open"), Err(MinifyError::UnterminatedString));
        assert_eq!(minify("x = /abc"), Err(MinifyError::UnterminatedRegex));
    }
}
