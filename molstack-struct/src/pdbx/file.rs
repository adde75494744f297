//! Line-preserving PDBx/mmCIF document.
//!
//! A [`PdbxFile`] keeps the raw lines of the document together with a
//! [`CategoryIndex`]. Categories are tokenized only when requested, and
//! writing a category rewrites just its own line range, so untouched parts
//! of the file are reproduced verbatim.
//!
//! # Example
//!
//! ```
//! use molstack_struct::pdbx::{Category, IndexMap, PdbxFile};
//!
//! let mut file: PdbxFile = "\
//! data_1ABC
//! #
//! _entry.id 1ABC
//! #
//! ".parse().unwrap();
//!
//! let entry = file.get_category("entry", None).unwrap();
//! assert_eq!(entry.value("id"), Some("1ABC"));
//!
//! let mut cell = IndexMap::new();
//! cell.insert("length_a".to_string(), "52.1".to_string());
//! file.set_category("cell", Category::Single(cell), None, true).unwrap();
//! assert_eq!(file.category_names(None).unwrap(), vec!["entry", "cell"]);
//! ```

use core::fmt;
use core::str::FromStr;
use std::path::Path;

use indexmap::IndexMap;
use molstack_core::{MolError, Result, Summarizable};

use super::index::{
    is_empty_line, is_text_field_delimiter, text_field_end, CategoryIndex, CategoryInfo,
};
use super::tokenize;

/// Content of one category.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Category {
    /// One value per key.
    Single(IndexMap<String, String>),
    /// One column per key; all columns have the same length.
    Looped(IndexMap<String, Vec<String>>),
}

impl Category {
    pub fn is_loop(&self) -> bool {
        matches!(self, Category::Looped(_))
    }

    /// Keys in order.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            Category::Single(map) => map.keys().map(String::as_str).collect(),
            Category::Looped(map) => map.keys().map(String::as_str).collect(),
        }
    }

    /// Number of rows (1 for single-valued categories).
    pub fn row_count(&self) -> usize {
        match self {
            Category::Single(_) => 1,
            Category::Looped(map) => map.values().next().map_or(0, Vec::len),
        }
    }

    /// Value of `key` in a single-valued category, or in the first row of a
    /// looped one.
    pub fn value(&self, key: &str) -> Option<&str> {
        match self {
            Category::Single(map) => map.get(key).map(String::as_str),
            Category::Looped(map) => map.get(key)?.first().map(String::as_str),
        }
    }

    /// Looped view of the content; a single-valued category becomes one row.
    pub fn into_looped(self) -> IndexMap<String, Vec<String>> {
        match self {
            Category::Single(map) => map.into_iter().map(|(k, v)| (k, vec![v])).collect(),
            Category::Looped(map) => map,
        }
    }

    /// Column of `key` in a looped category.
    pub fn column(&self, key: &str) -> Option<&[String]> {
        match self {
            Category::Single(_) => None,
            Category::Looped(map) => map.get(key).map(Vec::as_slice),
        }
    }

    fn validate(&self) -> Result<()> {
        let keys = self.keys();
        if keys.is_empty() {
            return Err(MolError::InvalidInput("category has no keys".into()));
        }
        if let Some(bad) = keys.iter().find(|k| !is_valid_name(k)) {
            return Err(MolError::InvalidInput(format!("invalid key '{}'", bad)));
        }
        let text_values: Vec<&String> = match self {
            Category::Single(map) => map.values().filter(|v| v.contains('\n')).collect(),
            Category::Looped(map) => map.values().flatten().filter(|v| v.contains('\n')).collect(),
        };
        for value in text_values {
            check_text_field(value)?;
        }
        if let Category::Looped(map) = self {
            let rows = self.row_count();
            if let Some((key, column)) = map.iter().find(|(_, c)| c.len() != rows) {
                return Err(MolError::InvalidInput(format!(
                    "column '{}' has {} values, expected {}",
                    key,
                    column.len(),
                    rows
                )));
            }
        }
        Ok(())
    }
}

/// A multi-line value is written as a `;` text field. Reading one back drops
/// an empty first line and trailing whitespace, and a line starting with `;`
/// ends the field, so such values cannot be stored.
fn check_text_field(value: &str) -> Result<()> {
    if value.starts_with('\n') {
        return Err(MolError::InvalidInput(
            "multi-line value must not start with a newline".into(),
        ));
    }
    for (i, line) in value.split('\n').enumerate() {
        if i > 0 && line.starts_with(';') {
            return Err(MolError::InvalidInput(format!(
                "line {} of a multi-line value starts with ';'",
                i + 1
            )));
        }
        if line.len() != line.trim_end().len() {
            return Err(MolError::InvalidInput(format!(
                "line {} of a multi-line value ends with whitespace",
                i + 1
            )));
        }
    }
    Ok(())
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(char::is_whitespace)
}

/// A PDBx document: raw lines plus their category index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdbxFile {
    lines: Vec<String>,
    index: CategoryIndex,
}

impl PdbxFile {
    /// An empty document without blocks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a document from text.
    ///
    /// A trailing newline does not produce an empty final line.
    pub fn parse(text: &str) -> Result<Self> {
        let lines: Vec<String> = text.lines().map(String::from).collect();
        let index = CategoryIndex::from_lines(&lines)?;
        Ok(Self { lines, index })
    }

    /// Read and parse a file.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("reading PDBx file {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Write the document, one newline-terminated line each.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_text())?;
        Ok(())
    }

    /// The document as text.
    pub fn to_text(&self) -> String {
        let mut text = String::with_capacity(self.lines.iter().map(|l| l.len() + 1).sum());
        for line in &self.lines {
            text.push_str(line);
            text.push('\n');
        }
        text
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn index(&self) -> &CategoryIndex {
        &self.index
    }

    /// Data block names in file order.
    pub fn block_names(&self) -> Vec<&str> {
        self.index.block_names()
    }

    fn resolve_block<'a>(&'a self, block: Option<&'a str>) -> Result<&'a str> {
        match block {
            Some(name) if self.index.contains_block(name) => Ok(name),
            Some(name) => Err(MolError::NotFound(format!("data block '{}'", name))),
            None => self
                .index
                .blocks()
                .first()
                .map(|b| b.name.as_str())
                .ok_or_else(|| MolError::NotFound("document has no data block".into())),
        }
    }

    /// Category names of `block` (default: first block) in file order.
    pub fn category_names(&self, block: Option<&str>) -> Result<Vec<&str>> {
        let block = self.resolve_block(block)?;
        Ok(self.index.categories_in(block).into_iter().map(|(name, _)| name).collect())
    }

    /// Line range and layout of a category.
    pub fn category_info(&self, category: &str, block: Option<&str>) -> Result<&CategoryInfo> {
        let block = self.resolve_block(block)?;
        self.index.get(block, category).ok_or_else(|| {
            MolError::NotFound(format!("category '{}' in block '{}'", category, block))
        })
    }

    /// Materialize a category of `block` (default: first block).
    ///
    /// # Errors
    ///
    /// [`MolError::NotFound`] for an unknown block or category,
    /// [`MolError::Parse`] if the category text is malformed.
    pub fn get_category(&self, category: &str, block: Option<&str>) -> Result<Category> {
        let info = *self.category_info(category, block)?;
        let logical = logical_lines(&self.lines, &info)?;
        if info.is_loop {
            process_looped(logical)
        } else {
            process_single(logical)
        }
    }

    /// Write a category into `block` (default: first block).
    ///
    /// An existing category is replaced in place. A new category is appended
    /// to the end of an existing block, or, if the block does not exist, a
    /// new block is appended to the document. With `quote`, values are
    /// shell-quoted where needed; without it, values are written verbatim
    /// and must already be valid tokens. Values containing newlines are
    /// always written as text fields.
    ///
    /// # Errors
    ///
    /// [`MolError::InvalidInput`] for an empty or ragged category, invalid
    /// names, or a multi-line value that a text field cannot hold (leading
    /// newline, trailing whitespace on a line, a later line starting with
    /// `;`); the document is unchanged in that case.
    pub fn set_category(
        &mut self,
        category: &str,
        content: Category,
        block: Option<&str>,
        quote: bool,
    ) -> Result<()> {
        if !is_valid_name(category) || category.contains('.') {
            return Err(MolError::InvalidInput(format!(
                "invalid category name '{}'",
                category
            )));
        }
        if let Some(name) = block {
            if name.chars().any(char::is_whitespace) {
                return Err(MolError::InvalidInput(format!("invalid block name '{}'", name)));
            }
        }
        content.validate()?;

        let block = match block {
            Some(name) => name.to_string(),
            None => self.resolve_block(None)?.to_string(),
        };
        let has_multiline = match &content {
            Category::Single(map) => map.values().any(|v| v.contains('\n')),
            Category::Looped(map) => map.values().flatten().any(|v| v.contains('\n')),
        };
        let new_lines = render(category, &content, quote);
        let len = new_lines.len();
        let mut info = CategoryInfo {
            start: 0,
            stop: 0,
            is_loop: content.is_loop(),
            has_multiline,
        };

        if let Some(old) = self.index.remove(&block, category) {
            let delta = len as isize - old.len() as isize;
            self.lines.splice(old.start..old.stop, new_lines);
            self.index.shift_from(old.stop, delta);
            info.start = old.start;
            log::debug!("replaced category {}/{} ({} line delta)", block, category, delta);
        } else if let Some(at) = self.index.block_end(&block, self.lines.len()) {
            self.lines.splice(at..at, new_lines);
            self.index.shift_from(at, len as isize);
            info.start = at;
            log::debug!("inserted category {}/{} at line {}", block, category, at);
        } else {
            let header = self.lines.len();
            self.lines.push(format!("data_{}", block));
            self.lines.push("#".to_string());
            self.lines.extend(new_lines);
            self.index.push_block(&block, header);
            info.start = header + 2;
            log::debug!("appended block {} with category {}", block, category);
        }
        info.stop = info.start + len;
        self.index.insert(&block, category, info);
        Ok(())
    }

    /// Delete a category and its lines.
    pub fn remove_category(&mut self, category: &str, block: Option<&str>) -> Result<()> {
        let block = self.resolve_block(block)?.to_string();
        let info = self.index.remove(&block, category).ok_or_else(|| {
            MolError::NotFound(format!("category '{}' in block '{}'", category, block))
        })?;
        self.index.prune_unnamed();
        self.lines.drain(info.start..info.stop);
        self.index.shift_from(info.stop, -(info.len() as isize));
        log::debug!("removed category {}/{}", block, category);
        Ok(())
    }
}

impl Summarizable for PdbxFile {
    fn summary(&self) -> String {
        format!(
            "PdbxFile: {} line(s), {} block(s), {} category(ies)",
            self.lines.len(),
            self.index.blocks().len(),
            self.index.iter().count()
        )
    }
}

impl FromStr for PdbxFile {
    type Err = MolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PdbxFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Materialization
// ---------------------------------------------------------------------------

/// A key line or value line after merging continuations, already tokenized.
struct LogicalLine {
    line_no: usize,
    is_key: bool,
    tokens: Vec<String>,
}

/// Tokenize the lines of a category, merging text fields (and, outside
/// loops, values on the line after their key) into the preceding line.
fn logical_lines(lines: &[String], info: &CategoryInfo) -> Result<Vec<LogicalLine>> {
    let range = &lines[info.start..info.stop];
    let mut logical: Vec<LogicalLine> = Vec::new();

    let mut i = 0;
    while i < range.len() {
        let line = range[i].as_str();
        let line_no = info.start + i + 1;

        if is_text_field_delimiter(line) {
            let end = text_field_end(range, i, info.start)?;
            let mut parts: Vec<&str> = Vec::with_capacity(end - i);
            let first = line[1..].trim_end();
            if !first.is_empty() {
                parts.push(first);
            }
            parts.extend(range[i + 1..end].iter().map(|l| l.trim_end()));
            let value = parts.join("\n");
            match logical.last_mut() {
                Some(prev) => prev.tokens.push(value),
                None => {
                    return Err(MolError::parse_at(line_no, "text field without a key"));
                }
            }
            i = end + 1;
            continue;
        }

        i += 1;
        if is_empty_line(line) || line.starts_with("loop_") {
            continue;
        }

        let tokens = tokenize::split(line.trim()).map_err(|e| MolError::parse_at(line_no, e))?;
        let is_key = line.starts_with('_');
        if !info.is_loop && !is_key {
            if let Some(prev) = logical.last_mut() {
                prev.tokens.extend(tokens);
                continue;
            }
        }
        logical.push(LogicalLine {
            line_no,
            is_key,
            tokens,
        });
    }
    Ok(logical)
}

/// `_category.key` -> `key`.
fn key_of(token: &str, line_no: usize) -> Result<String> {
    token
        .split_once('.')
        .map(|(_, key)| key.to_string())
        .ok_or_else(|| MolError::parse_at(line_no, format!("malformed key '{}'", token)))
}

fn process_single(lines: Vec<LogicalLine>) -> Result<Category> {
    let mut map = IndexMap::with_capacity(lines.len());
    for line in lines {
        let mut tokens = line.tokens.into_iter();
        let (Some(first), true) = (tokens.next(), line.is_key) else {
            return Err(MolError::parse_at(line.line_no, "value without a key"));
        };
        let key = key_of(&first, line.line_no)?;
        let value = tokens
            .next()
            .ok_or_else(|| MolError::parse_at(line.line_no, format!("key '{}' has no value", key)))?;
        if tokens.next().is_some() {
            return Err(MolError::parse_at(
                line.line_no,
                format!("key '{}' has more than one value", key),
            ));
        }
        map.insert(key, value);
    }
    Ok(Category::Single(map))
}

fn process_looped(lines: Vec<LogicalLine>) -> Result<Category> {
    let mut columns: IndexMap<String, Vec<String>> = IndexMap::new();
    let mut values: Vec<String> = Vec::new();
    let mut last_line = 0;

    for line in lines {
        last_line = line.line_no;
        let mut tokens = line.tokens.into_iter();
        if line.is_key {
            if !values.is_empty() {
                return Err(MolError::parse_at(line.line_no, "key line after loop values"));
            }
            let Some(first) = tokens.next() else {
                continue;
            };
            let key = key_of(&first, line.line_no)?;
            if columns.insert(key, Vec::new()).is_some() {
                return Err(MolError::parse_at(line.line_no, "duplicate key in loop"));
            }
        }
        values.extend(tokens);
    }

    let n_keys = columns.len();
    if n_keys == 0 {
        return Err(MolError::parse_at(last_line, "loop without keys"));
    }
    if values.len() % n_keys != 0 {
        return Err(MolError::parse_at(
            last_line,
            format!("{} loop values do not fill {} columns", values.len(), n_keys),
        ));
    }

    // Tokens fill one row at a time, wrapping after the last key
    for (i, value) in values.into_iter().enumerate() {
        if let Some((_, column)) = columns.get_index_mut(i % n_keys) {
            column.push(value);
        }
    }
    Ok(Category::Looped(columns))
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn prepare(value: &str, quote: bool) -> String {
    if quote {
        tokenize::quote(value)
    } else {
        value.to_string()
    }
}

fn text_field(value: &str) -> Vec<String> {
    let mut lines: Vec<String> = value.split('\n').map(String::from).collect();
    if let Some(first) = lines.first_mut() {
        first.insert(0, ';');
    }
    lines.push(";".to_string());
    lines
}

fn render(category: &str, content: &Category, quote: bool) -> Vec<String> {
    let mut lines = Vec::new();
    match content {
        Category::Single(map) => {
            let width = map.keys().map(|k| k.chars().count()).max().unwrap_or(0) + 3;
            for (key, value) in map {
                if value.contains('\n') {
                    lines.push(format!("_{}.{}", category, key));
                    lines.extend(text_field(value));
                } else {
                    lines.push(format!(
                        "_{}.{:<width$}{}",
                        category,
                        key,
                        prepare(value, quote),
                        width = width
                    ));
                }
            }
        }
        Category::Looped(map) => {
            lines.push("loop_".to_string());
            lines.extend(map.keys().map(|k| format!("_{}.{}", category, k)));

            let columns: Vec<Vec<String>> = map
                .values()
                .map(|column| {
                    column
                        .iter()
                        .map(|v| {
                            if v.contains('\n') {
                                v.clone()
                            } else {
                                prepare(v, quote)
                            }
                        })
                        .collect()
                })
                .collect();
            let widths: Vec<usize> = columns
                .iter()
                .map(|c| c.iter().map(|v| v.chars().count()).max().unwrap_or(0) + 1)
                .collect();

            for row in 0..content.row_count() {
                let mut line = String::new();
                for (column, &width) in columns.iter().zip(&widths) {
                    let value = &column[row];
                    if value.contains('\n') {
                        if !line.is_empty() {
                            lines.push(std::mem::take(&mut line));
                        }
                        lines.extend(text_field(value));
                    } else {
                        line.push_str(&format!("{:<width$}", value, width = width));
                    }
                }
                if !line.is_empty() {
                    lines.push(line);
                }
            }
        }
    }
    lines.push("#".to_string());
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "\
data_1ABC
#
_entry.id   1ABC
#
_struct.title
;Crystal structure of
a test protein
;
_struct.pdbx_descriptor
'Test protein'
#
loop_
_atom_type.symbol
_atom_type.radius
C 1.7
N 1.55
O 1.52
#
data_2XYZ
#
_cell.length_a   10.0
_cell.length_b   'eleven point zero'
#
";

    fn single(pairs: &[(&str, &str)]) -> Category {
        Category::Single(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn looped(columns: &[(&str, &[&str])]) -> Category {
        Category::Looped(
            columns
                .iter()
                .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
                .collect(),
        )
    }

    fn assert_index_consistent(file: &PdbxFile) {
        let reparsed = PdbxFile::parse(&file.to_text()).unwrap();
        assert_eq!(reparsed.index(), file.index());
    }

    #[test]
    fn parse_blocks_and_categories() {
        let file = PdbxFile::parse(DOC).unwrap();
        assert_eq!(file.block_names(), vec!["1ABC", "2XYZ"]);
        assert_eq!(
            file.category_names(None).unwrap(),
            vec!["entry", "struct", "atom_type"]
        );
        assert_eq!(file.category_names(Some("2XYZ")).unwrap(), vec!["cell"]);
        assert!(file.category_info("struct", None).unwrap().has_multiline);
        assert_eq!(file.lines().len(), 23);
        assert_eq!(
            file.summary(),
            "PdbxFile: 23 line(s), 2 block(s), 4 category(ies)"
        );
    }

    #[test]
    fn get_single_valued() {
        let file = PdbxFile::parse(DOC).unwrap();
        let entry = file.get_category("entry", None).unwrap();
        assert_eq!(entry, single(&[("id", "1ABC")]));

        let cell = file.get_category("cell", Some("2XYZ")).unwrap();
        assert_eq!(cell.value("length_b"), Some("eleven point zero"));
    }

    #[test]
    fn get_multiline_values() {
        let file = PdbxFile::parse(DOC).unwrap();
        let s = file.get_category("struct", None).unwrap();
        assert_eq!(
            s.value("title"),
            Some("Crystal structure of\na test protein")
        );
        assert_eq!(s.value("pdbx_descriptor"), Some("Test protein"));
    }

    #[test]
    fn get_looped_fills_rows_in_order() {
        let file = PdbxFile::parse("data_x\nloop_\n_t.a\n_t.b\na1 b1 a2\nb2\na3 b3\n").unwrap();
        let t = file.get_category("t", None).unwrap();
        assert!(t.is_loop());
        assert_eq!(t.row_count(), 3);
        assert_eq!(t.column("a").unwrap(), ["a1", "a2", "a3"]);
        assert_eq!(t.column("b").unwrap(), ["b1", "b2", "b3"]);
    }

    #[test]
    fn get_looped_text_field() {
        let text = "data_x\nloop_\n_t.a\n_t.b\n1\n;first\nsecond\n;\n2 plain\n";
        let file = PdbxFile::parse(text).unwrap();
        let t = file.get_category("t", None).unwrap();
        assert_eq!(t.column("a").unwrap(), ["1", "2"]);
        assert_eq!(t.column("b").unwrap(), ["first\nsecond", "plain"]);
    }

    #[test]
    fn get_missing() {
        let file = PdbxFile::parse(DOC).unwrap();
        assert!(matches!(
            file.get_category("cell", None),
            Err(MolError::NotFound(_))
        ));
        assert!(matches!(
            file.get_category("entry", Some("nope")),
            Err(MolError::NotFound(_))
        ));
        assert!(matches!(
            PdbxFile::new().get_category("entry", None),
            Err(MolError::NotFound(_))
        ));
    }

    #[test]
    fn malformed_categories() {
        let ragged = PdbxFile::parse("data_x\nloop_\n_t.a\n_t.b\n1 2 3\n").unwrap();
        assert!(matches!(
            ragged.get_category("t", None),
            Err(MolError::Parse(_))
        ));
        let no_value = PdbxFile::parse("data_x\n_t.a\n").unwrap();
        assert!(matches!(
            no_value.get_category("t", None),
            Err(MolError::Parse(_))
        ));
        let open_quote = PdbxFile::parse("data_x\n_t.a 'open\n").unwrap();
        assert!(open_quote.get_category("t", None).is_err());
    }

    #[test]
    fn render_formats() {
        let lines = render("cell", &single(&[("a", "1"), ("length", "two words")]), true);
        assert_eq!(
            lines,
            vec!["_cell.a        1", "_cell.length   'two words'", "#"]
        );

        let lines = render("t", &looped(&[("x", &["1", "22"]), ("y", &["a", "b"])]), true);
        assert_eq!(lines, vec!["loop_", "_t.x", "_t.y", "1  a ", "22 b ", "#"]);
    }

    #[test]
    fn roundtrip_every_category() {
        let mut file = PdbxFile::parse(DOC).unwrap();
        for block in ["1ABC", "2XYZ"] {
            let names: Vec<String> = file
                .category_names(Some(block))
                .unwrap()
                .into_iter()
                .map(String::from)
                .collect();
            for name in names {
                let before = file.get_category(&name, Some(block)).unwrap();
                file.set_category(&name, before.clone(), Some(block), true)
                    .unwrap();
                let reparsed = PdbxFile::parse(&file.to_text()).unwrap();
                assert_eq!(reparsed.get_category(&name, Some(block)).unwrap(), before);
                assert_index_consistent(&file);
            }
        }
    }

    #[test]
    fn insert_shifts_later_categories_only() {
        let mut file = PdbxFile::parse(DOC).unwrap();
        let entry_before = *file.category_info("entry", None).unwrap();
        let atom_type_before = *file.category_info("atom_type", None).unwrap();
        let cell_before = *file.category_info("cell", Some("2XYZ")).unwrap();

        let new = single(&[("name", "x"), ("value", "y")]);
        file.set_category("extra", new.clone(), Some("1ABC"), true)
            .unwrap();

        // Two key lines plus the terminator
        let added = 3;
        assert_eq!(*file.category_info("entry", None).unwrap(), entry_before);
        assert_eq!(*file.category_info("atom_type", None).unwrap(), atom_type_before);
        let cell_after = file.category_info("cell", Some("2XYZ")).unwrap();
        assert_eq!(cell_after.start, cell_before.start + added);
        assert_eq!(cell_after.stop, cell_before.stop + added);

        let extra = file.category_info("extra", None).unwrap();
        assert_eq!(extra.start, atom_type_before.stop);
        assert_eq!(file.get_category("extra", None).unwrap(), new);
        assert_eq!(
            file.category_names(None).unwrap(),
            vec!["entry", "struct", "atom_type", "extra"]
        );
        assert_index_consistent(&file);
    }

    #[test]
    fn replace_with_different_length() {
        let mut file = PdbxFile::parse(DOC).unwrap();
        let cell_before = *file.category_info("cell", Some("2XYZ")).unwrap();
        let atoms = looped(&[("symbol", &["C", "N", "O", "S", "P"])]);
        file.set_category("atom_type", atoms.clone(), None, true)
            .unwrap();

        let info = file.category_info("atom_type", None).unwrap();
        assert_eq!(info.len(), 1 + 1 + 5 + 1);
        assert!(info.is_loop);
        // Old range was 7 lines long
        let cell_after = file.category_info("cell", Some("2XYZ")).unwrap();
        assert_eq!(cell_after.start, cell_before.start + 1);
        assert_eq!(file.get_category("atom_type", None).unwrap(), atoms);
        assert_index_consistent(&file);
    }

    #[test]
    fn set_into_new_block() {
        let mut file = PdbxFile::parse(DOC).unwrap();
        let n_lines = file.lines().len();
        file.set_category("entry", single(&[("id", "3NEW")]), Some("3NEW"), true)
            .unwrap();
        assert_eq!(file.block_names(), vec!["1ABC", "2XYZ", "3NEW"]);
        assert_eq!(file.lines()[n_lines], "data_3NEW");
        assert_eq!(file.category_info("entry", Some("3NEW")).unwrap().start, n_lines + 2);
        assert_index_consistent(&file);
    }

    #[test]
    fn set_into_empty_block() {
        let mut file = PdbxFile::parse("data_a\n#\ndata_b\n_x.y 1\n").unwrap();
        file.set_category("z", single(&[("k", "v")]), Some("a"), true)
            .unwrap();
        assert_eq!(file.category_names(Some("a")).unwrap(), vec!["z"]);
        assert_eq!(file.get_category("x", Some("b")).unwrap().value("y"), Some("1"));
        assert_index_consistent(&file);
    }

    #[test]
    fn multiline_values_are_written_as_text_fields() {
        let mut file = PdbxFile::parse("data_a\n").unwrap();
        let note = single(&[("text", "line one\nline 'two'")]);
        file.set_category("note", note.clone(), None, true).unwrap();
        assert!(file.category_info("note", None).unwrap().has_multiline);
        let reparsed = PdbxFile::parse(&file.to_text()).unwrap();
        assert_eq!(reparsed.get_category("note", None).unwrap(), note);

        let rows = looped(&[("id", &["1", "2"]), ("text", &["a\nb", "c"])]);
        file.set_category("rows", rows.clone(), None, true).unwrap();
        let reparsed = PdbxFile::parse(&file.to_text()).unwrap();
        assert_eq!(reparsed.get_category("rows", None).unwrap(), rows);
        assert_index_consistent(&file);
    }

    #[test]
    fn unencodable_text_fields_are_rejected() {
        let mut file = PdbxFile::parse(DOC).unwrap();
        let before = file.clone();
        for value in ["a\n;b", "\nleading", "trailing \nx", "x\ny\t"] {
            let result = file.set_category("note", single(&[("text", value)]), None, true);
            assert!(matches!(result, Err(MolError::InvalidInput(_))), "{:?}", value);
            let rows = looped(&[("text", &[value])]);
            assert!(file.set_category("note", rows, None, false).is_err());
        }
        assert_eq!(file, before);

        // The opening delimiter keeps a leading ';' on the first line
        let note = single(&[("text", ";a\nb")]);
        file.set_category("note", note.clone(), None, true).unwrap();
        let reparsed = PdbxFile::parse(&file.to_text()).unwrap();
        assert_eq!(reparsed.get_category("note", None).unwrap(), note);
        assert_index_consistent(&file);
    }

    #[test]
    fn reserved_looking_values_survive_rewrite() {
        let mut file = PdbxFile::parse("data_a\n#\n").unwrap();
        for value in ["_x.y", "_nodot", "data_foo", "loop_", "save_x", "#note", ";semi"] {
            let rows = looped(&[("k", &[value, "z"]), ("j", &["1", "2"])]);
            file.set_category("t", rows.clone(), None, true).unwrap();
            assert_index_consistent(&file);
            let reparsed = PdbxFile::parse(&file.to_text()).unwrap();
            assert_eq!(reparsed.get_category("t", None).unwrap(), rows, "{:?}", value);
        }

        let source = "data_a\nloop_\n_t.k\n_t.j\n'_x.y' 1\n'data_b' 2\n#\n";
        let mut file = PdbxFile::parse(source).unwrap();
        let t = file.get_category("t", None).unwrap();
        assert_eq!(t.column("k").unwrap(), ["_x.y", "data_b"]);
        file.set_category("t", t.clone(), None, true).unwrap();
        let reparsed = PdbxFile::parse(&file.to_text()).unwrap();
        assert_eq!(reparsed.get_category("t", None).unwrap(), t);
    }

    #[test]
    fn replace_keeps_headerless_block() {
        let mut file = PdbxFile::parse("_a.x 1\n").unwrap();
        file.set_category("a", single(&[("x", "2")]), None, true)
            .unwrap();
        assert_eq!(file.block_names(), vec![""]);
        assert_eq!(file.get_category("a", None).unwrap().value("x"), Some("2"));
        assert_index_consistent(&file);

        file.remove_category("a", None).unwrap();
        assert!(file.block_names().is_empty());
        assert_index_consistent(&file);
    }

    #[test]
    fn invalid_content_leaves_document_unchanged() {
        let mut file = PdbxFile::parse(DOC).unwrap();
        let before = file.clone();
        let empty = Category::Single(IndexMap::new());
        assert!(matches!(
            file.set_category("x", empty, None, true),
            Err(MolError::InvalidInput(_))
        ));
        let ragged = looped(&[("a", &["1", "2"]), ("b", &["1"])]);
        assert!(file.set_category("x", ragged, None, true).is_err());
        assert!(file
            .set_category("bad name", single(&[("k", "v")]), None, true)
            .is_err());
        assert!(file
            .set_category("x", single(&[("k k", "v")]), None, true)
            .is_err());
        assert_eq!(file, before);
    }

    #[test]
    fn remove_category_shifts_back() {
        let mut file = PdbxFile::parse(DOC).unwrap();
        let struct_info = *file.category_info("struct", None).unwrap();
        let cell_before = *file.category_info("cell", Some("2XYZ")).unwrap();

        file.remove_category("struct", None).unwrap();
        assert_eq!(
            file.category_names(None).unwrap(),
            vec!["entry", "atom_type"]
        );
        let cell_after = file.category_info("cell", Some("2XYZ")).unwrap();
        assert_eq!(cell_after.start, cell_before.start - struct_info.len());
        assert!(file.remove_category("struct", None).is_err());
        assert_index_consistent(&file);

        let atom_type = file.get_category("atom_type", None).unwrap();
        assert_eq!(atom_type.column("radius").unwrap(), ["1.7", "1.55", "1.52"]);
    }

    #[test]
    fn read_write_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.cif");
        std::fs::write(&path, DOC).unwrap();

        let mut file = PdbxFile::read(&path).unwrap();
        assert_eq!(file.to_text(), DOC);

        file.set_category("entry", single(&[("id", "9ZZZ")]), None, true)
            .unwrap();
        file.write(&path).unwrap();

        let reread = PdbxFile::read(&path).unwrap();
        assert_eq!(reread.get_category("entry", None).unwrap().value("id"), Some("9ZZZ"));
        assert_eq!(reread, file);
        assert_eq!(reread.to_string(), file.to_text());
    }

    #[test]
    fn read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = PdbxFile::read(dir.path().join("missing.cif")).unwrap_err();
        assert!(matches!(err, MolError::Io(_)));
    }
}
