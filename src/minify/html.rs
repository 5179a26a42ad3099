/*
 * Copyright 2022 Collabora, Ltd.
 *
 * SPDX-License-Identifier: MIT
 */
//! Markup minification.

/// Elements whose content is copied through untouched
const RAW_ELEMENTS: [&str; 4] = ["pre", "script", "style", "textarea"];

struct Scanner {
    chars: Vec<char>,
    pos: usize,
    out: String,
    remove_comments: bool,
}

impl Scanner {
    fn starts_with(&self, pat: &str) -> bool {
        let mut i = self.pos;
        for p in pat.chars() {
            match self.chars.get(i) {
                Some(c) if c.to_ascii_lowercase() == p => i += 1,
                _ => return false,
            }
        }
        true
    }

    fn find(&self, pat: &str) -> Option<usize> {
        let pat = pat.chars().collect::<Vec<_>>();
        (self.pos..self.chars.len()).find(|&i| {
            pat.iter()
                .enumerate()
                .all(|(j, p)| self.chars.get(i + j).map(char::to_ascii_lowercase) == Some(*p))
        })
    }

    /// Comments are copied unless removal was asked for; conditional
    /// comments are always kept.
    fn comment(&mut self, pending_space: bool) {
        let end = self
            .find("-->")
            .map_or(self.chars.len(), |i| (i + 3).min(self.chars.len()));
        let conditional = self.starts_with("<!--[if") || self.starts_with("<!--<![endif");
        if !self.remove_comments || conditional {
            if pending_space && !self.out.is_empty() {
                self.out.push(' ');
            }
            self.out.extend(&self.chars[self.pos..end]);
        }
        self.pos = end;
    }

    /// Copy a tag, squeezing the whitespace between its attributes, and
    /// return its lowercased element name.
    fn tag(&mut self) -> String {
        let mut tag = String::from("<");
        let mut quote = None;
        let mut space = false;
        self.pos += 1;
        while let Some(&c) = self.chars.get(self.pos) {
            self.pos += 1;
            if let Some(q) = quote {
                tag.push(c);
                if c == q {
                    quote = None;
                }
                continue;
            }
            match c {
                '>' => {
                    tag.push('>');
                    break;
                }
                '=' => {
                    space = false;
                    tag.push('=');
                }
                '/' if self.chars.get(self.pos) == Some(&'>') => {
                    space = false;
                    tag.push('/');
                }
                c if c.is_whitespace() => space = true,
                c => {
                    if space && !tag.ends_with('<') && !tag.ends_with('=') {
                        tag.push(' ');
                    }
                    space = false;
                    if c == '"' || c == '\'' {
                        quote = Some(c);
                    }
                    tag.push(c);
                }
            }
        }
        self.out.push_str(&tag);
        if tag.ends_with("/>") {
            return String::new();
        }
        tag.chars()
            .skip(1)
            .take_while(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect()
    }

    fn run(mut self) -> String {
        let mut pending_space = false;
        while let Some(&c) = self.chars.get(self.pos) {
            if self.starts_with("<!--") {
                self.comment(pending_space);
                pending_space = false;
                continue;
            }
            let opens_tag = c == '<'
                && self
                    .chars
                    .get(self.pos + 1)
                    .map_or(false, |n| n.is_ascii_alphabetic() || "/!?".contains(*n));
            if opens_tag {
                if pending_space && !self.out.is_empty() {
                    self.out.push(' ');
                }
                pending_space = false;
                let name = self.tag();
                if RAW_ELEMENTS.contains(&name.as_str()) {
                    let end = self
                        .find(&format!("</{}", name))
                        .unwrap_or(self.chars.len());
                    self.out.extend(&self.chars[self.pos..end]);
                    self.pos = end;
                }
            } else if c.is_whitespace() {
                pending_space = true;
                self.pos += 1;
            } else {
                if pending_space && !self.out.is_empty() {
                    self.out.push(' ');
                }
                pending_space = false;
                self.out.push(c);
                self.pos += 1;
            }
        }
        self.out
    }
}

/// Minify markup. Whitespace runs collapse to a single space and the
/// content of `pre`, `script`, `style` and `textarea` elements is kept as
/// written. Comments are kept.
pub fn minify(source: &str) -> String {
    minify_with(source, false)
}

/// As [`minify`], optionally dropping every comment that is not a
/// conditional comment.
pub fn minify_with(source: &str, remove_comments: bool) -> String {
    Scanner {
        chars: source.chars().collect(),
        pos: 0,
        out: String::with_capacity(source.len()),
        remove_comments,
    }
    .run()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace() {
        let src = "<!DOCTYPE html>\n<html>\n  <head>\n    <title>2048  game</title>\n  </head>\n</html>\n";
        assert_eq!(
            minify(src),
            "<!DOCTYPE html> <html> <head> <title>2048 game</title> </head> </html>"
        );
    }

    #[test]
    fn keeps_comments_by_default() {
        let src = "<p>a</p>\n  <!-- note  -->\n<p>b</p>";
        assert_eq!(minify(src), "<p>a</p> <!-- note  --> <p>b</p>");
    }

    #[test]
    fn drops_comments_on_request() {
        let src = "<p>a</p>\n<!-- note -->\n<p>b</p>";
        assert_eq!(minify_with(src, true), "<p>a</p> <p>b</p>");
    }

    #[test]
    fn keeps_conditional_comments() {
        let src = "<!--[if lt IE 9]><script src=\"x.js\"></script><![endif]-->";
        assert_eq!(minify(src), src);
        assert_eq!(minify_with(src, true), src);
    }

    #[test]
    fn squeezes_attributes() {
        let src = "<div   class=\"a  b\"\n     id = \"x\" >\n<br />";
        assert_eq!(minify(src), "<div class=\"a  b\" id=\"x\"> <br/>");
    }

    #[test]
    fn keeps_raw_elements() {
        let src = "<pre>  a\n   b</pre>\n<script>\n  if (a < b) { c(); }\n</script>";
        assert_eq!(
            minify(src),
            "<pre>  a\n   b</pre> <script>\n  if (a < b) { c(); }\n</script>"
        );
    }

    #[test]
    fn keeps_text_comparisons() {
        assert_eq!(minify("<p>1 < 2</p>"), "<p>1 < 2</p>");
    }
}
