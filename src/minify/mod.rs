/*
 * Copyright 2022 Collabora, Ltd.
 *
 * SPDX-License-Identifier: MIT
 */
use thiserror::Error;

pub mod css;
pub mod html;
pub mod js;

#[derive(Debug, Error, PartialEq)]
pub enum MinifyError {
    #[error("unterminated comment")]
    UnterminatedComment,
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated set in regular expression literal")]
    UnterminatedRegexSet,
    #[error("unterminated regular expression literal")]
    UnterminatedRegex,
    #[error("unexpected '}}' at line {0}")]
    UnexpectedClose(usize),
    #[error("unclosed block opened at line {0}")]
    UnclosedBlock(usize),
    #[error("unterminated url()")]
    UnterminatedUrl,
    #[error("undefined variable @{0}")]
    UndefinedVariable(String),
}

/// The transformation applied to a staged source file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Minifier {
    Script,
    Style,
    Markup,
}

impl Minifier {
    pub fn apply(self, source: &str) -> Result<String, MinifyError> {
        match self {
            Minifier::Script => js::minify(source),
            Minifier::Style => css::compile(source),
            Minifier::Markup => Ok(html::minify(source)),
        }
    }
}
