//! Puzzle input loading.
//!
//! Two formats are accepted: the JSON form of [`PuzzleDefinition`], and raw
//! text where every non-whitespace character is one unit and stacks are
//! consecutive groups of `capacity` units. Raw text carries no layout, so the
//! capacity and buffer count come from the caller.

use std::fs;
use std::io::Read;
use std::path::Path;

use crate::error::InputError;
use crate::puzzle::PuzzleDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Json,
    Text,
}

impl InputFormat {
    /// Guess the format from a file extension; anything but `.json` is text.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => InputFormat::Json,
            _ => InputFormat::Text,
        }
    }
}

/// Layout for raw text input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextLayout {
    pub capacity: usize,
    pub empty_stacks: usize,
}

impl Default for TextLayout {
    fn default() -> Self {
        Self {
            capacity: 4,
            empty_stacks: 2,
        }
    }
}

pub fn parse_definition(
    content: &str,
    format: InputFormat,
    layout: TextLayout,
) -> Result<PuzzleDefinition, InputError> {
    match format {
        InputFormat::Json => Ok(serde_json::from_str(content)?),
        InputFormat::Text => Ok(PuzzleDefinition {
            capacity: layout.capacity,
            empty_stacks: layout.empty_stacks,
            units: content.chars().filter(|c| !c.is_whitespace()).collect(),
            stack_count: None,
        }),
    }
}

pub fn load_definition(
    path: &Path,
    format: Option<InputFormat>,
    layout: TextLayout,
) -> Result<PuzzleDefinition, InputError> {
    let content = fs::read_to_string(path)?;
    let format = format.unwrap_or_else(|| InputFormat::from_path(path));
    parse_definition(&content, format, layout)
}

pub fn read_definition<R: Read>(
    mut reader: R,
    format: InputFormat,
    layout: TextLayout,
) -> Result<PuzzleDefinition, InputError> {
    let mut content = String::new();
    reader.read_to_string(&mut content)?;
    parse_definition(&content, format, layout)
}
