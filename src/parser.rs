//! Indentation-based text format parser.
//!
//! Each line is a section header (`name:` or `name: modifier`), a value
//! (`name = value`), or a comment (blank, or whitespace followed by `#`).
//! A deeper indentation is only allowed directly after a section header and
//! opens that section; a shallower one must return to an indentation level
//! that is still open.

use crate::config::{Config, NodeMut};
use crate::error::{ConfigError, ConfigResult, ConfigResultExt};
use crate::literal;
use crate::node::NodeId;
use regex::Regex;
use std::io::BufRead;
use std::sync::OnceLock;

static LINE_PATTERN: OnceLock<Regex> = OnceLock::new();
static COMMENT_PATTERN: OnceLock<Regex> = OnceLock::new();

fn line_pattern() -> &'static Regex {
    LINE_PATTERN.get_or_init(|| {
        Regex::new(concat!(
            r"^(?:(?P<indent> *)(?P<key>[a-zA-Z_][a-zA-Z0-9_]*)\s*",
            r"(?:(?P<section>:)\s*(?P<modifier>[a-zA-Z_][a-zA-Z0-9_]*)?\s*",
            r"|=\s*(?P<value>\S.*))",
            r"|(?P<comment>[ \t\r\x0B\x0C]*(?:#.*)?))$",
        ))
        .expect("Static regex is valid")
    })
}

fn comment_pattern() -> &'static Regex {
    COMMENT_PATTERN.get_or_init(|| {
        Regex::new(r"^[ \t\r\x0B\x0C]*(?:#.*)?$").expect("Static regex is valid")
    })
}

/// Returns true if `line` would be read back as a comment.
pub fn is_comment_line(line: &str) -> bool {
    comment_pattern().is_match(line)
}

/// A classified input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'t> {
    Section {
        indent: usize,
        key: &'t str,
        modifier: Option<&'t str>,
    },
    Value {
        indent: usize,
        key: &'t str,
        value: &'t str,
    },
    Comment(&'t str),
}

/// Classifies one line (without its line terminator).
pub fn classify_line(line: &str) -> ConfigResult<Line<'_>> {
    let caps = line_pattern().captures(line).ok_or_else(|| {
        ConfigError::syntax("Ill formed line: could not be matched by regular expression")
    })?;

    if caps.name("comment").is_some() {
        return Ok(Line::Comment(line));
    }

    let indent = caps.name("indent").map_or(0, |m| m.as_str().len());
    let key = caps.name("key").map_or("", |m| m.as_str());
    if caps.name("section").is_some() {
        return Ok(Line::Section {
            indent,
            key,
            modifier: caps.name("modifier").map(|m| m.as_str()),
        });
    }
    match caps.name("value") {
        Some(value) => Ok(Line::Value {
            indent,
            key,
            value: value.as_str().trim_end(),
        }),
        None => Err(ConfigError::syntax(
            "Ill formed line: could not be matched by regular expression",
        )),
    }
}

/// Streams lines into a target node.
pub struct Parser<'c> {
    config: &'c mut Config,
    base: NodeId,
    stack: Vec<(usize, NodeId)>,
    pending: Option<NodeId>,
}

impl<'c> Parser<'c> {
    pub fn new(target: NodeMut<'c>) -> Self {
        let base = target.id;
        Self {
            config: target.config,
            base,
            stack: vec![(0, base)],
            pending: None,
        }
    }

    /// Parses every line of `reader`, returning how many were read.
    ///
    /// Errors are reported as `Parse` errors carrying the 1-based line number.
    pub fn parse(mut self, reader: &mut dyn BufRead) -> ConfigResult<usize> {
        let mut count = 0;
        for (index, line) in reader.lines().enumerate() {
            let number = index + 1;
            let result = line
                .map_err(ConfigError::from)
                .and_then(|line| self.parse_line(&line))
                .at_line(number);
            if let Err(err) = result {
                tracing::debug!(line = number, kind = err.kind(), error = %err, "failed to parse configuration");
                return Err(err);
            }
            count = number;
        }
        Ok(count)
    }

    /// Applies one line to the tree.
    pub fn parse_line(&mut self, line: &str) -> ConfigResult<()> {
        match classify_line(line)? {
            Line::Comment(text) => self.node(self.current()).add_comment(text),
            Line::Section {
                indent,
                key,
                modifier,
            } => {
                self.update_indent(indent)?;
                let section = self.node(self.current()).add_section(key, modifier)?;
                self.pending = Some(section.id());
                Ok(())
            }
            Line::Value { indent, key, value } => {
                self.update_indent(indent)?;
                let value = literal::infer(value)?;
                self.node(self.current()).set(key, value)
            }
        }
    }

    fn update_indent(&mut self, indent: usize) -> ConfigResult<()> {
        let top = self.stack.last().map_or(0, |(level, _)| *level);
        if indent > top {
            let section = self
                .pending
                .take()
                .ok_or_else(|| ConfigError::syntax("Unexpected indentation"))?;
            self.stack.push((indent, section));
        } else {
            self.pending = None;
        }

        while self.stack.last().is_some_and(|(level, _)| *level != indent) {
            self.stack.pop();
        }
        if self.stack.is_empty() {
            return Err(ConfigError::syntax("Unexpected indentation"));
        }
        Ok(())
    }

    /// The pending section if one was just opened, else the innermost open one.
    fn current(&self) -> NodeId {
        self.pending
            .or_else(|| self.stack.last().map(|(_, id)| *id))
            .unwrap_or(self.base)
    }

    fn node(&mut self, id: NodeId) -> NodeMut<'_> {
        NodeMut {
            config: &mut *self.config,
            id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ConfigValue;

    fn parse(text: &str) -> ConfigResult<Config> {
        let mut config = Config::new();
        config.loads(text)?;
        Ok(config)
    }

    #[test]
    fn test_classify_line() {
        assert_eq!(
            classify_line("  name: type").unwrap(),
            Line::Section {
                indent: 2,
                key: "name",
                modifier: Some("type")
            }
        );
        assert_eq!(
            classify_line("section:").unwrap(),
            Line::Section {
                indent: 0,
                key: "section",
                modifier: None
            }
        );
        assert_eq!(
            classify_line("    item = value with spaces  ").unwrap(),
            Line::Value {
                indent: 4,
                key: "item",
                value: "value with spaces"
            }
        );
        assert_eq!(classify_line("   # note").unwrap(), Line::Comment("   # note"));
        assert_eq!(classify_line("").unwrap(), Line::Comment(""));
    }

    #[test]
    fn test_ill_formed_lines() {
        for line in [
            "not a line",
            "key =",
            "1key = 2",
            "\tkey = 1",
            "port: 8080",
            "a: type extra",
            "a: type # note",
        ] {
            let err = classify_line(line).unwrap_err();
            assert!(
                err.to_string().starts_with("Ill formed line"),
                "{line:?} gave {err}"
            );
        }
    }

    #[test]
    fn test_section_with_trailing_text_is_rejected() {
        let err = parse("port: 8080\n").unwrap_err();
        assert_eq!(err.line(), Some(1));
        assert!(err.to_string().contains("Ill formed line"));

        let config = parse("a:   \nb: type  \n").unwrap();
        assert_eq!(config.root().section("b").unwrap().modifier_name(), Some("type"));
    }

    #[test]
    fn test_deeply_nested_value_is_kept_as_text() {
        let token = "[".repeat(3_000);
        let config = parse(&format!("x = {token}\n")).unwrap();
        assert_eq!(config.get("x").unwrap().unwrap(), ConfigValue::from(token.as_str()));
    }

    #[test]
    fn test_is_comment_line() {
        assert!(is_comment_line("# hello"));
        assert!(is_comment_line("    # indented"));
        assert!(is_comment_line(""));
        assert!(!is_comment_line("hello"));
    }

    #[test]
    fn test_nested_sections() {
        let config = parse("a:\n    b:\n        c = 1\n    d = 2\ne = 3\n").unwrap();
        let root = config.root();
        assert_eq!(
            root.lookup_path(["a", "b", "c"]).unwrap().unwrap(),
            ConfigValue::Integer(1)
        );
        assert_eq!(
            root.lookup_path(["a", "d"]).unwrap().unwrap(),
            ConfigValue::Integer(2)
        );
        assert_eq!(root.get("e").unwrap().unwrap(), ConfigValue::Integer(3));
    }

    #[test]
    fn test_section_modifier_is_recorded() {
        let config = parse("obj: custom\n    field = 1\n").unwrap();
        let obj = config.root().section("obj").unwrap();
        assert_eq!(obj.modifier_name(), Some("custom"));
        assert_eq!(obj.get("field").unwrap().unwrap(), ConfigValue::Integer(1));
    }

    #[test]
    fn test_unexpected_indentation() {
        let err = parse("a = 1\n    b = 2\n").unwrap_err();
        assert_eq!(err.line(), Some(2));
        assert_eq!(err.to_string(), "[LINE 2] (Syntax) Unexpected indentation");

        // Dedent to a level that was never opened
        let err = parse("a:\n    b:\n        c = 1\n  d = 2\n").unwrap_err();
        assert_eq!(err.line(), Some(4));
    }

    #[test]
    fn test_comment_does_not_change_indentation() {
        let config = parse("a:\n# comment\n    b = 1\n").unwrap();
        let a = config.root().section("a").unwrap();
        assert_eq!(a.get("b").unwrap().unwrap(), ConfigValue::Integer(1));
        assert_eq!(a.order().len(), 2);
    }

    #[test]
    fn test_errors_from_tree_are_located() {
        let err = parse("a = 1\na = 2\n").unwrap_err();
        assert_eq!(err.line(), Some(2));
        assert!(err.to_string().starts_with("[LINE 2] (KeyCollision)"));

        let err = parse("ok = 1\nowner = 2\n").unwrap_err();
        assert!(err.to_string().contains("(KeyCollision)"));
    }

    #[test]
    fn test_line_count() {
        let mut config = Config::new();
        let count = Parser::new(config.root_mut())
            .parse(&mut "a = 1\n\nb = 2".as_bytes())
            .unwrap();
        assert_eq!(count, 3);
    }
}
