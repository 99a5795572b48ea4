//! Text format writer.

use crate::config::NodeRef;
use crate::error::ConfigResult;
use crate::literal;
use crate::node::{OrderEntry, Slot};
use crate::parser::is_comment_line;
use crate::value::ConfigValue;
use std::collections::HashMap;
use std::io::Write;

/// Default number of spaces per nesting level.
pub const DEFAULT_INDENT_WIDTH: usize = 4;

/// Writes nodes in the indentation-based text format.
pub struct Writer<W: Write> {
    out: W,
    depth: usize,
    indent_width: usize,
}

impl<W: Write> Writer<W> {
    pub fn new(out: W) -> Self {
        Self::with_indent_width(out, DEFAULT_INDENT_WIDTH)
    }

    pub fn with_indent_width(out: W, indent_width: usize) -> Self {
        Self {
            out,
            depth: 0,
            indent_width: indent_width.max(1),
        }
    }

    fn write_indent(&mut self) -> ConfigResult<()> {
        write!(self.out, "{:width$}", "", width = self.depth * self.indent_width)?;
        Ok(())
    }

    /// Writes a section header and nests the following lines under it.
    pub fn start_section(&mut self, key: &str, modifier: Option<&str>) -> ConfigResult<()> {
        self.write_indent()?;
        match modifier {
            Some(modifier) => writeln!(self.out, "{key}: {modifier}")?,
            None => writeln!(self.out, "{key}:")?,
        }
        self.depth += 1;
        Ok(())
    }

    pub fn end_section(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn write_key_value(&mut self, key: &str, value: &ConfigValue) -> ConfigResult<()> {
        self.write_indent()?;
        writeln!(self.out, "{key} = {}", literal::format_value(value))?;
        Ok(())
    }

    /// Writes each line of `comment` unindented, adding `# ` to lines that
    /// would not read back as comments.
    pub fn write_comment(&mut self, comment: &str) -> ConfigResult<()> {
        for line in comment.split('\n') {
            if is_comment_line(line) {
                writeln!(self.out, "{line}")?;
            } else {
                writeln!(self.out, "# {line}")?;
            }
        }
        Ok(())
    }

    /// Writes the entries of `node` in order.
    ///
    /// A key is written at its last order position, and only while bound.
    pub fn write_node(&mut self, node: NodeRef<'_>) -> ConfigResult<()> {
        let data = node.data();
        let last: HashMap<&str, usize> = data
            .order
            .iter()
            .enumerate()
            .filter_map(|(pos, entry)| match entry {
                OrderEntry::Key(key) => Some((key.as_str(), pos)),
                OrderEntry::Comment(_) => None,
            })
            .collect();

        for (pos, entry) in data.order.iter().enumerate() {
            match entry {
                OrderEntry::Comment(comment) => self.write_comment(comment)?,
                OrderEntry::Key(key) => {
                    if last.get(key.as_str()) != Some(&pos) {
                        continue;
                    }
                    match data.data.get(key) {
                        Some(Slot::Value(value)) => self.write_key_value(key, value)?,
                        Some(Slot::Section(id)) => {
                            let child = node.at(*id);
                            self.start_section(key, child.modifier_name())?;
                            self.write_node(child)?;
                            self.end_section();
                        }
                        None => {}
                    }
                }
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> ConfigResult<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn render(config: &Config) -> String {
        let mut writer = Writer::new(Vec::new());
        writer.write_node(config.root()).unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn test_sections_and_values() {
        let mut config = Config::new();
        config.set("top", 1).unwrap();
        config.section("outer").unwrap().set("name", "x y").unwrap();
        config
            .section("outer")
            .unwrap()
            .section("inner")
            .unwrap()
            .set("flag", true)
            .unwrap();

        assert_eq!(
            render(&config),
            "top = 1\nouter:\n    name = x y\n    inner:\n        flag = true\n"
        );
    }

    #[test]
    fn test_comment_prefixing() {
        let mut config = Config::new();
        config.add_comment("plain").unwrap();
        config.add_comment("# already").unwrap();
        config.add_comment("two\n  # lines").unwrap();
        config.add_comment("").unwrap();
        assert_eq!(render(&config), "# plain\n# already\n# two\n  # lines\n\n");
    }

    #[test]
    fn test_comments_are_not_indented() {
        let mut config = Config::new();
        let mut section = config.section("s").unwrap();
        section.add_comment("inside").unwrap();
        section.set("a", 1).unwrap();
        assert_eq!(render(&config), "s:\n# inside\n    a = 1\n");
    }

    #[test]
    fn test_indent_width() {
        let mut config = Config::new();
        config.section("s").unwrap().set("a", 1).unwrap();
        let mut writer = Writer::with_indent_width(Vec::new(), 2);
        writer.write_node(config.root()).unwrap();
        assert_eq!(String::from_utf8(writer.into_inner()).unwrap(), "s:\n  a = 1\n");
    }

    #[test]
    fn test_quotes_ambiguous_strings() {
        let mut config = Config::new();
        config.set("text", "42").unwrap();
        config.set("padded", " x ").unwrap();
        let out = render(&config);
        assert_eq!(out, "text = \"42\"\npadded = \" x \"\n");

        let reloaded: Config = out.parse().unwrap();
        assert_eq!(reloaded.get("text").unwrap().unwrap(), ConfigValue::from("42"));
        assert_eq!(reloaded.get("padded").unwrap().unwrap(), ConfigValue::from(" x "));
    }

    #[test]
    fn test_comment_after_empty_section_moves_into_it() {
        let mut config = Config::new();
        config.add_section("a", None).unwrap();
        config.add_comment("root note").unwrap();

        let text = render(&config);
        assert_eq!(text, "a:\n# root note\n");

        // The reader attaches the comment to the section that was just opened
        let reloaded: Config = text.parse().unwrap();
        assert_eq!(reloaded.root().order(), &[OrderEntry::Key("a".into())]);
        assert_eq!(
            reloaded.root().section("a").unwrap().order(),
            &[OrderEntry::Comment("# root note".into())]
        );
        assert_eq!(reloaded.dumps().unwrap(), text);
    }
}
