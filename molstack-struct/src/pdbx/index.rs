//! Line-range index of data blocks and categories.
//!
//! The index is built by a single pass over the raw lines and records, for
//! every `(block, category)` pair, the half-open line range `[start, stop)`
//! the category occupies. Edits to the line buffer keep the index valid
//! through [`CategoryIndex::shift_from`].

use indexmap::IndexMap;
use molstack_core::{Annotated, MolError, Result};

/// Location and layout of one category in the line buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CategoryInfo {
    /// First line (the `loop_` line or the first key line).
    pub start: usize,
    /// One past the last line.
    pub stop: usize,
    /// Tabular (`loop_`) category.
    pub is_loop: bool,
    /// Contains a text field or a value on the line after its key.
    pub has_multiline: bool,
}

impl CategoryInfo {
    pub fn len(&self) -> usize {
        self.stop - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.stop == self.start
    }
}

/// A data block and the line of its `data_` header.
///
/// Categories that precede every `data_` line belong to the unnamed block
/// `""`, which has no header.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockInfo {
    pub name: String,
    pub header: Option<usize>,
}

impl Annotated for BlockInfo {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        if self.header.is_none() {
            Some("categories preceding the first data_ line")
        } else {
            None
        }
    }
}

/// Blocks and categories of a PDBx document, both in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryIndex {
    blocks: Vec<BlockInfo>,
    categories: IndexMap<(String, String), CategoryInfo>,
}

fn key(block: &str, category: &str) -> (String, String) {
    (block.to_string(), category.to_string())
}

fn shifted(pos: usize, delta: isize) -> usize {
    pos.saturating_add_signed(delta)
}

pub(crate) fn is_empty_line(line: &str) -> bool {
    line.is_empty() || line.starts_with('#')
}

pub(crate) fn is_text_field_delimiter(line: &str) -> bool {
    line.starts_with(';')
}

/// Category name of a key line (`_name.key`), `None` for other lines.
pub(crate) fn category_name(line: &str, line_no: usize) -> Result<Option<&str>> {
    let Some(rest) = line.strip_prefix('_') else {
        return Ok(None);
    };
    match rest.find('.') {
        Some(0) => Err(MolError::parse_at(line_no, "empty category name")),
        Some(dot) => Ok(Some(&rest[..dot])),
        None => Err(MolError::parse_at(
            line_no,
            format!("key '{}' lacks a '.' separator", line.trim_end()),
        )),
    }
}

/// Index of the line that closes the text field opened at `open`.
pub(crate) fn text_field_end(lines: &[String], open: usize, offset: usize) -> Result<usize> {
    (open + 1..lines.len())
        .find(|&j| is_text_field_delimiter(&lines[j]))
        .ok_or_else(|| MolError::parse_at(offset + open + 1, "unterminated text field"))
}

struct OpenCategory {
    name: String,
    start: usize,
    is_loop: bool,
    has_multiline: bool,
}

impl CategoryIndex {
    /// Build the index from raw lines.
    ///
    /// # Errors
    ///
    /// Returns [`MolError::Parse`] with a 1-based line number for a key
    /// without `.`, a `loop_` not followed by a key line, an unterminated
    /// text field, values outside any category, and repeated blocks or
    /// categories.
    pub fn from_lines(lines: &[String]) -> Result<Self> {
        let mut index = CategoryIndex::default();
        let mut block = String::new();
        let mut current: Option<OpenCategory> = None;

        let mut i = 0;
        while i < lines.len() {
            let line = lines[i].as_str();
            if is_empty_line(line) {
                i += 1;
                continue;
            }

            if let Some(name) = line.strip_prefix("data_") {
                if let Some(open) = current.take() {
                    index.close(&block, open, i)?;
                }
                let name = name.trim_end();
                if index.block_position(name).is_some() {
                    return Err(MolError::parse_at(
                        i + 1,
                        format!("data block '{}' appears twice", name),
                    ));
                }
                block = name.to_string();
                index.blocks.push(BlockInfo {
                    name: block.clone(),
                    header: Some(i),
                });
                i += 1;
                continue;
            }

            if is_text_field_delimiter(line) {
                let Some(open) = current.as_mut() else {
                    return Err(MolError::parse_at(i + 1, "text field outside of a category"));
                };
                open.has_multiline = true;
                i = text_field_end(lines, i, 0)? + 1;
                continue;
            }

            let is_loop = line.starts_with("loop_");
            let name = if is_loop {
                let next = lines.get(i + 1).map(String::as_str).unwrap_or("");
                match category_name(next, i + 2)? {
                    Some(name) => Some(name),
                    None => {
                        return Err(MolError::parse_at(i + 1, "loop_ is not followed by a key line"))
                    }
                }
            } else {
                category_name(line, i + 1)?
            };

            let opens_category = match (name, current.as_ref()) {
                _ if is_loop => true,
                (Some(name), Some(open)) => name != open.name,
                (Some(_), None) => true,
                (None, _) => false,
            };

            if opens_category {
                if let Some(open) = current.take() {
                    index.close(&block, open, i)?;
                }
                current = Some(OpenCategory {
                    name: name.unwrap_or_default().to_string(),
                    start: i,
                    is_loop,
                    has_multiline: false,
                });
            } else {
                match current.as_mut() {
                    None => {
                        return Err(MolError::parse_at(i + 1, "value outside of a category"));
                    }
                    Some(open) => {
                        if !open.is_loop && (line.starts_with('\'') || line.starts_with('"')) {
                            open.has_multiline = true;
                        }
                    }
                }
            }
            i += 1;
        }

        if let Some(open) = current.take() {
            index.close(&block, open, lines.len())?;
        }

        log::debug!(
            "indexed {} categories in {} data block(s)",
            index.categories.len(),
            index.blocks.len()
        );
        Ok(index)
    }

    fn close(&mut self, block: &str, open: OpenCategory, stop: usize) -> Result<()> {
        if self.block_position(block).is_none() {
            self.blocks.push(BlockInfo {
                name: block.to_string(),
                header: None,
            });
        }
        let key = key(block, &open.name);
        if self.categories.contains_key(&key) {
            return Err(MolError::parse_at(
                open.start + 1,
                format!("category '{}' appears twice in block '{}'", open.name, block),
            ));
        }
        log::trace!(
            "category {}/{}: lines {}..{}",
            block,
            open.name,
            open.start,
            stop
        );
        self.categories.insert(
            key,
            CategoryInfo {
                start: open.start,
                stop,
                is_loop: open.is_loop,
                has_multiline: open.has_multiline,
            },
        );
        Ok(())
    }

    /// Data blocks in file order.
    pub fn blocks(&self) -> &[BlockInfo] {
        &self.blocks
    }

    pub fn block_names(&self) -> Vec<&str> {
        self.blocks.iter().map(|b| b.name.as_str()).collect()
    }

    pub(crate) fn block_position(&self, block: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.name == block)
    }

    pub fn contains_block(&self, block: &str) -> bool {
        self.block_position(block).is_some()
    }

    pub fn get(&self, block: &str, category: &str) -> Option<&CategoryInfo> {
        self.categories.get(&key(block, category))
    }

    /// All `(block, category, info)` entries in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &CategoryInfo)> {
        self.categories
            .iter()
            .map(|((block, name), info)| (block.as_str(), name.as_str(), info))
    }

    /// Categories of `block` in file order.
    pub fn categories_in(&self, block: &str) -> Vec<(&str, &CategoryInfo)> {
        self.categories
            .iter()
            .filter(|((b, _), _)| b == block)
            .map(|((_, name), info)| (name.as_str(), info))
            .collect()
    }

    /// First line after the block: the next block's header or `n_lines`.
    pub(crate) fn block_end(&self, block: &str, n_lines: usize) -> Option<usize> {
        let pos = self.block_position(block)?;
        Some(
            self.blocks[pos + 1..]
                .iter()
                .find_map(|b| b.header)
                .unwrap_or(n_lines),
        )
    }

    /// Shift every category and block header starting at or after `line`.
    pub fn shift_from(&mut self, line: usize, delta: isize) {
        if delta == 0 {
            return;
        }
        for info in self.categories.values_mut() {
            if info.start >= line {
                info.start = shifted(info.start, delta);
                info.stop = shifted(info.stop, delta);
            }
        }
        for block in &mut self.blocks {
            if let Some(header) = block.header.as_mut() {
                if *header >= line {
                    *header = shifted(*header, delta);
                }
            }
        }
    }

    pub(crate) fn push_block(&mut self, name: &str, header: usize) {
        self.blocks.push(BlockInfo {
            name: name.to_string(),
            header: Some(header),
        });
    }

    pub(crate) fn insert(&mut self, block: &str, category: &str, info: CategoryInfo) {
        self.categories.insert(key(block, category), info);
        self.categories.sort_by(|_, a, _, b| a.start.cmp(&b.start));
    }

    /// Drop a category entry; blocks are left alone.
    pub(crate) fn remove(&mut self, block: &str, category: &str) -> Option<CategoryInfo> {
        self.categories.shift_remove(&key(block, category))
    }

    /// Drop the header-less block `""` once it has no categories left.
    pub(crate) fn prune_unnamed(&mut self) {
        if !self.categories_in("").is_empty() {
            return;
        }
        if let Some(pos) = self.block_position("") {
            if self.blocks[pos].header.is_none() {
                self.blocks.remove(pos);
            }
        }
    }
}
