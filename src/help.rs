//! Extra help text attached to the root command

use serde::Deserialize;

/// Where a block of help text is shown, relative to the generated help.
///
/// The `*All` variants also apply to every subcommand's help.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HelpPosition {
    BeforeAll,
    Before,
    After,
    AfterAll,
}

impl HelpPosition {
    #[must_use]
    pub fn is_inherited(self) -> bool {
        matches!(self, HelpPosition::BeforeAll | HelpPosition::AfterAll)
    }

    #[must_use]
    pub fn is_before(self) -> bool {
        matches!(self, HelpPosition::BeforeAll | HelpPosition::Before)
    }
}

/// How [`fix_indent`] treats leading whitespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Indent {
    /// Keep the text as written.
    Keep,
    /// Strip the indentation common to all non-blank lines.
    #[default]
    Align,
    /// Strip common indentation, then indent every line by this many spaces.
    Spaces(usize),
}

impl From<bool> for Indent {
    fn from(align: bool) -> Self {
        if align { Indent::Align } else { Indent::Keep }
    }
}

impl From<usize> for Indent {
    fn from(spaces: usize) -> Self {
        Indent::Spaces(spaces)
    }
}

/// Normalize the indentation of a multi-line block.
///
/// Leading and trailing blank lines are dropped when aligning, so text written
/// inline in a raw string literal lines up with the generated help.
#[must_use]
pub fn fix_indent(text: &str, indent: Indent) -> String {
    let spaces = match indent {
        Indent::Keep => return text.to_string(),
        Indent::Align => 0,
        Indent::Spaces(n) => n,
    };

    let lines: Vec<&str> = text.lines().collect();
    let first = lines.iter().position(|l| !l.trim().is_empty());
    let last = lines.iter().rposition(|l| !l.trim().is_empty());
    let (Some(first), Some(last)) = (first, last) else {
        return String::new();
    };
    let lines = &lines[first..=last];

    let common = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    let pad = " ".repeat(spaces);

    lines
        .iter()
        .map(|l| {
            if l.trim().is_empty() {
                String::new()
            } else {
                format!("{pad}{}", l.get(common..).unwrap_or_else(|| l.trim_start()))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Help text blocks collected for the root command.
#[derive(Debug, Clone, Default)]
pub struct HelpTexts {
    blocks: Vec<(HelpPosition, String)>,
}

impl HelpTexts {
    pub fn add(&mut self, position: HelpPosition, text: String) {
        self.blocks.push((position, text));
    }

    /// Text shown above or below the help of the root command.
    #[must_use]
    pub fn for_root(&self, before: bool) -> Option<String> {
        self.join(|pos| pos.is_before() == before)
    }

    /// Text shown above or below the help of any subcommand.
    #[must_use]
    pub fn for_subcommand(&self, before: bool) -> Option<String> {
        self.join(|pos| pos.is_inherited() && pos.is_before() == before)
    }

    fn join(&self, keep: impl Fn(HelpPosition) -> bool) -> Option<String> {
        let parts: Vec<&str> = self
            .blocks
            .iter()
            .filter(|(pos, _)| keep(*pos))
            .map(|(_, text)| text.as_str())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }
}
