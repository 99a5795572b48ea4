//! Store engines pair a parser with a writer for one text format.

use crate::config::{NodeMut, NodeRef};
use crate::error::ConfigResult;
use crate::parser::Parser;
use crate::writer::{Writer, DEFAULT_INDENT_WIDTH};
use std::io::{BufRead, Write};

/// A text format that trees can be loaded from and dumped to.
pub trait StoreEngine: Send + Sync {
    /// Returns the name of this engine.
    fn name(&self) -> &str;

    /// Parses `reader` into `node`, returning the number of lines read.
    fn parse(&self, reader: &mut dyn BufRead, node: NodeMut<'_>) -> ConfigResult<usize>;

    /// Writes `node` and everything below it.
    fn write(&self, node: NodeRef<'_>, out: &mut dyn Write) -> ConfigResult<()>;
}

/// The indentation-based nested format.
#[derive(Debug, Clone)]
pub struct NestedCfg {
    indent_width: usize,
}

impl Default for NestedCfg {
    fn default() -> Self {
        Self {
            indent_width: DEFAULT_INDENT_WIDTH,
        }
    }
}

impl NestedCfg {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of spaces written per nesting level.
    pub fn with_indent_width(mut self, indent_width: usize) -> Self {
        self.indent_width = indent_width.max(1);
        self
    }

    pub fn indent_width(&self) -> usize {
        self.indent_width
    }
}

impl StoreEngine for NestedCfg {
    fn name(&self) -> &str {
        "nestedcfg"
    }

    fn parse(&self, reader: &mut dyn BufRead, node: NodeMut<'_>) -> ConfigResult<usize> {
        Parser::new(node).parse(reader)
    }

    fn write(&self, node: NodeRef<'_>, out: &mut dyn Write) -> ConfigResult<()> {
        let mut writer = Writer::with_indent_width(out, self.indent_width);
        writer.write_node(node)?;
        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::Arc;

    #[test]
    fn test_custom_indent_width_round_trips() {
        let engine = Arc::new(NestedCfg::new().with_indent_width(2));
        let mut config = Config::new().with_engine(engine);
        config.section("a").unwrap().section("b").unwrap().set("c", 1).unwrap();

        let text = config.dumps().unwrap();
        assert_eq!(text, "a:\n  b:\n    c = 1\n");

        let reloaded: Config = text.parse().unwrap();
        assert_eq!(reloaded.dumps().unwrap(), "a:\n    b:\n        c = 1\n");
    }

    #[test]
    fn test_engine_name() {
        assert_eq!(Config::new().engine().name(), "nestedcfg");
        assert_eq!(NestedCfg::default().indent_width(), 4);
    }
}
