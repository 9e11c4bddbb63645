//! Results database output.
//!
//! Check results are written in the XML report-database format read by
//! layout viewers, one item per error.

use std::fmt::Write;
use std::path::Path;

use crate::error::{with_err_context, ErrorContext, Result};

/// One reported violation.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RdbItem {
    pub category: String,
    pub cell: String,
    pub message: String,
}

/// A results database.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ResultsDb {
    pub description: String,
    pub original_file: String,
    pub top_cell: String,
    pub items: Vec<RdbItem>,
}

/// Escapes the XML special characters of `s`.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

impl ResultsDb {
    pub fn new(
        description: impl Into<String>,
        original_file: impl Into<String>,
        top_cell: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            original_file: original_file.into(),
            top_cell: top_cell.into(),
            items: Vec::new(),
        }
    }

    pub fn push(&mut self, category: impl Into<String>, cell: impl Into<String>, message: impl Into<String>) {
        self.items.push(RdbItem {
            category: category.into(),
            cell: cell.into(),
            message: message.into(),
        });
    }

    /// Distinct categories, in order of first use.
    fn categories(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for item in self.items.iter() {
            if !out.contains(&item.category.as_str()) {
                out.push(&item.category);
            }
        }
        out
    }

    /// Renders the database as XML.
    pub fn to_xml(&self) -> String {
        let mut s = String::new();
        // Writing to a String cannot fail.
        let _ = self.write_xml(&mut s);
        s
    }

    fn write_xml(&self, s: &mut String) -> std::fmt::Result {
        writeln!(s, r#"<?xml version="1.0" encoding="utf-8"?>"#)?;
        writeln!(s, "<report-database>")?;
        writeln!(s, " <description>{}</description>", escape(&self.description))?;
        writeln!(s, " <original-file>{}</original-file>", escape(&self.original_file))?;
        writeln!(s, " <generator>checkgds</generator>")?;
        writeln!(s, " <top-cell>{}</top-cell>", escape(&self.top_cell))?;
        writeln!(s, " <tags/>")?;
        writeln!(s, " <categories>")?;
        for category in self.categories() {
            writeln!(s, "  <category>")?;
            writeln!(s, "   <name>{}</name>", escape(category))?;
            writeln!(s, "   <description>{}</description>", escape(category))?;
            writeln!(s, "   <categories/>")?;
            writeln!(s, "  </category>")?;
        }
        writeln!(s, " </categories>")?;
        writeln!(s, " <cells>")?;
        if !self.top_cell.is_empty() {
            writeln!(s, "  <cell>")?;
            writeln!(s, "   <name>{}</name>", escape(&self.top_cell))?;
            writeln!(s, "   <variant/>")?;
            writeln!(s, "   <references/>")?;
            writeln!(s, "  </cell>")?;
        }
        writeln!(s, " </cells>")?;
        writeln!(s, " <items>")?;
        for item in self.items.iter() {
            writeln!(s, "  <item>")?;
            writeln!(s, "   <tags/>")?;
            writeln!(s, "   <category>'{}'</category>", escape(&item.category))?;
            writeln!(s, "   <cell>{}</cell>", escape(&item.cell))?;
            writeln!(s, "   <visited>false</visited>")?;
            writeln!(s, "   <multiplicity>1</multiplicity>")?;
            writeln!(s, "   <values>")?;
            writeln!(s, "    <value>text: '{}'</value>", escape(&item.message))?;
            writeln!(s, "   </values>")?;
            writeln!(s, "  </item>")?;
        }
        writeln!(s, " </items>")?;
        writeln!(s, "</report-database>")?;
        Ok(())
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        with_err_context(std::fs::write(path, self.to_xml()), || {
            ErrorContext::CreateFile(path.to_path_buf())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn special_characters_are_escaped() {
        assert_eq!(escape(r#"a<b & "c">'d'"#), "a&lt;b &amp; &quot;c&quot;&gt;&apos;d&apos;");
    }

    #[test]
    fn items_and_categories() {
        let mut db = ResultsDb::new("Submission check", "EBeam_a.gds", "top");
        db.push("black_box", "top", "unreplaced black box cell my_gc");
        db.push("undeclared_layer", "top", "layer 2/0");
        db.push("black_box", "top", "unreplaced black box cell my_gc$1");
        let xml = db.to_xml();
        assert_eq!(xml.matches("<item>").count(), 3);
        assert_eq!(xml.matches("<category>\n").count(), 2);
        assert!(xml.contains("<value>text: 'unreplaced black box cell my_gc$1'</value>"));
        assert!(xml.starts_with("<?xml"));
    }
}
