// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Typed, styled screenplay block model.
//!
//! A [`Block`] holds an ordered sequence of [`ContentItem`]s — UTF-8 text
//! runs interleaved with toggled style markers. This is the leaf data type
//! the patch algebra (`screenplay-patch`) and wire codec (`screenplay-wire`)
//! build on; it owns no concept of documents, patches, or the network.

use std::io::{self, Read, Write};
use std::ops::Range;

use thiserror::Error;

/// Errors raised while decoding a [`Block`] from its binary form.
#[derive(Debug, Error)]
pub enum BlockError {
    /// The byte stream ended before a complete block could be read.
    #[error("truncated block: {0}")]
    Truncated(#[from] io::Error),
    /// The `block_type` byte did not correspond to a known [`BlockType`].
    #[error("unknown block type tag: {0}")]
    UnknownBlockType(u8),
    /// An item tag was neither a style code (0-3) nor the text tag (4).
    #[error("unknown content item tag: {0}")]
    UnknownItemTag(u8),
    /// A text item's declared byte length was not valid UTF-8.
    #[error("text item is not valid utf-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// The closed set of screenplay element types.
///
/// `repr(u8)` values are the wire tag order; do not reorder variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlockType {
    /// Action / scene description.
    Action = 0,
    /// Scene heading ("INT. KITCHEN - DAY").
    SceneHeading = 1,
    /// Character cue above dialogue.
    Character = 2,
    /// Spoken dialogue.
    Dialogue = 3,
    /// Parenthetical direction within dialogue.
    Parenthetical = 4,
    /// Transition ("CUT TO:").
    Transition = 5,
    /// Centered text.
    Centered = 6,
    /// A visual separator between sections.
    Separator = 7,
    /// An out-of-story production note.
    Note = 8,
    /// One column of dual (side-by-side) dialogue.
    DualDialogue = 9,
}

impl BlockType {
    /// Decode a wire tag byte into a `BlockType`.
    pub fn from_tag(tag: u8) -> Result<Self, BlockError> {
        match tag {
            0 => Ok(Self::Action),
            1 => Ok(Self::SceneHeading),
            2 => Ok(Self::Character),
            3 => Ok(Self::Dialogue),
            4 => Ok(Self::Parenthetical),
            5 => Ok(Self::Transition),
            6 => Ok(Self::Centered),
            7 => Ok(Self::Separator),
            8 => Ok(Self::Note),
            9 => Ok(Self::DualDialogue),
            other => Err(BlockError::UnknownBlockType(other)),
        }
    }

    /// The wire tag byte for this type.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }
}

/// A toggled style marker. An occurrence opens the style if it was closed,
/// and closes it if it was open — the marker carries no "on"/"off" state of
/// its own, matching the original Fountain-adjacent renderer's toggle rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StyleMarker {
    /// Italic toggle.
    Italics = 0,
    /// Bold toggle.
    Bold = 1,
    /// Underline toggle.
    Underline = 2,
    /// Hard line break.
    LineBreak = 3,
}

impl StyleMarker {
    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Italics),
            1 => Some(Self::Bold),
            2 => Some(Self::Underline),
            3 => Some(Self::LineBreak),
            _ => None,
        }
    }

    const fn tag(self) -> u8 {
        self as u8
    }
}

/// Wire tag marking a text run (as opposed to a style marker).
const TEXT_TAG: u8 = 4;

/// One element of a block's contents: a run of text, or a style toggle.
///
/// Text and style markers share one ordered sequence rather than living in
/// parallel lists, so a tagged union is the natural representation.
/// Normalization (coalescing adjacent `Text` items, dropping empty ones) is
/// an explicit postcondition, not something the type system can enforce
/// structurally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentItem {
    /// A run of UTF-8 text. Never empty in a normalized block.
    Text(String),
    /// A style toggle.
    Style(StyleMarker),
}

impl ContentItem {
    /// Length contribution of this item: character count for text, 1 for a
    /// style marker.
    #[must_use]
    pub fn weight(&self) -> usize {
        match self {
            Self::Text(s) => s.chars().count(),
            Self::Style(_) => 1,
        }
    }
}

/// A typed, styled unit of screenplay content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// The element type (action, dialogue, …).
    pub block_type: BlockType,
    /// Ordered text runs and style markers.
    pub contents: Vec<ContentItem>,
    /// Transient flag renderers use to invalidate cached layout; reset to
    /// `false` at the start of every patch application pass and set by any
    /// change that touched this block.
    pub contents_modified: bool,
}

impl Block {
    /// Create an empty block of the given type.
    #[must_use]
    pub const fn new(block_type: BlockType) -> Self {
        Self {
            block_type,
            contents: Vec::new(),
            contents_modified: false,
        }
    }

    /// The block's length: sum of text-run character counts plus one per
    /// style marker. Positions within the block are integers in `[0,
    /// length()]`.
    #[must_use]
    pub fn length(&self) -> usize {
        self.contents.iter().map(ContentItem::weight).sum()
    }

    /// Splice `items` into `contents` at intra-block position `start`.
    ///
    /// `start == length()` appends. Does not normalize; callers run
    /// [`Block::normalize`] once per patch-application pass.
    pub fn apply_add(&mut self, start: usize, items: Vec<ContentItem>) {
        self.contents_modified = true;
        if start == 0 {
            let mut new_contents = items;
            new_contents.append(&mut self.contents);
            self.contents = new_contents;
            return;
        }
        let mut pos = start;
        for i in 0..self.contents.len() {
            let item_len = self.contents[i].weight();
            match &self.contents[i] {
                ContentItem::Text(s) => {
                    if pos == item_len {
                        let mut tail = self.contents.split_off(i + 1);
                        self.contents.extend(items);
                        self.contents.append(&mut tail);
                        return;
                    } else if pos < item_len {
                        let char_boundary = s
                            .char_indices()
                            .nth(pos)
                            .map_or(s.len(), |(byte_idx, _)| byte_idx);
                        let (head, tail_str) = s.split_at(char_boundary);
                        let head = head.to_string();
                        let tail_str = tail_str.to_string();
                        let mut tail = self.contents.split_off(i + 1);
                        self.contents.truncate(i);
                        self.contents.push(ContentItem::Text(head));
                        self.contents.extend(items);
                        self.contents.push(ContentItem::Text(tail_str));
                        self.contents.append(&mut tail);
                        return;
                    }
                    pos -= item_len;
                }
                ContentItem::Style(_) => {
                    if pos == 0 {
                        let mut tail = self.contents.split_off(i);
                        self.contents.extend(items);
                        self.contents.append(&mut tail);
                        return;
                    }
                    pos -= 1;
                }
            }
        }
        // start fell exactly on the end: append.
        self.contents.extend(items);
    }

    /// Excise `length` positions starting at `start`.
    ///
    /// Tolerates `start + length` running past the end of the block's
    /// contents — it truncates rather than erroring, matching the original
    /// implementation's "stop when content is exhausted" behavior, which
    /// concurrent deletes can legitimately trigger.
    pub fn apply_remove(&mut self, start: usize, length: usize) {
        self.contents_modified = true;
        let old = std::mem::take(&mut self.contents);
        let mut new_contents = Vec::with_capacity(old.len());
        let mut pos = 0usize;
        let mut remaining = length;
        for item in old {
            if pos >= start && remaining == 0 {
                pos += item.weight();
                new_contents.push(item);
                continue;
            }
            match item {
                ContentItem::Text(s) => {
                    let item_len = s.chars().count();
                    let item_start = pos;
                    let item_end = pos + item_len;
                    pos = item_end;

                    // Portion of this run before `start` survives untouched.
                    let keep_before = start.saturating_sub(item_start).min(item_len);
                    // Where does the deletion window end within this run?
                    let delete_from = keep_before;
                    let window_end_global = start + length;
                    let delete_until = if window_end_global >= item_end {
                        item_len
                    } else {
                        window_end_global.saturating_sub(item_start).min(item_len)
                    };
                    let deleted_here = delete_until.saturating_sub(delete_from);
                    if keep_before > 0 {
                        let boundary = s
                            .char_indices()
                            .nth(keep_before)
                            .map_or(s.len(), |(b, _)| b);
                        new_contents.push(ContentItem::Text(s[..boundary].to_string()));
                    }
                    let kept_after_start = s
                        .char_indices()
                        .nth(delete_until)
                        .map(|(b, _)| b)
                        .unwrap_or(s.len());
                    if delete_until < item_len {
                        new_contents.push(ContentItem::Text(s[kept_after_start..].to_string()));
                    }
                    remaining = remaining.saturating_sub(deleted_here);
                }
                ContentItem::Style(marker) => {
                    let item_start = pos;
                    pos += 1;
                    let in_window = item_start >= start && remaining > 0;
                    if in_window {
                        remaining = remaining.saturating_sub(1);
                    } else {
                        new_contents.push(ContentItem::Style(marker));
                    }
                }
            }
        }
        self.contents = new_contents;
    }

    /// Split `[start, end)` into sub-ranges containing only text (no style
    /// markers), for turning a visual selection into deletable text ranges.
    #[must_use]
    pub fn exclude_styles(&self, start: usize, end: usize) -> Vec<Range<usize>> {
        let mut ranges = Vec::new();
        let mut pos = 0usize;
        for item in &self.contents {
            let item_len = item.weight();
            let item_start = pos;
            let item_end = pos + item_len;
            pos = item_end;
            if item_end <= start || item_start >= end {
                continue;
            }
            if let ContentItem::Text(_) = item {
                let lo = item_start.max(start);
                let hi = item_end.min(end);
                let merged = match ranges.last_mut() {
                    Some(last) if last.end == lo => {
                        last.end = hi;
                        true
                    }
                    _ => false,
                };
                if !merged {
                    ranges.push(lo..hi);
                }
            }
        }
        ranges
    }

    /// Coalesce adjacent text runs and drop empty ones. Called once per
    /// [`Patch::apply_on_blocks`](../screenplay_patch/struct.Patch.html)
    /// pass, never after an individual change.
    pub fn normalize(&mut self) {
        let old = std::mem::take(&mut self.contents);
        let mut normalized: Vec<ContentItem> = Vec::with_capacity(old.len());
        for item in old {
            if let ContentItem::Text(s) = &item {
                if s.is_empty() {
                    continue;
                }
            }
            if let (Some(ContentItem::Text(last)), ContentItem::Text(new_s)) =
                (normalized.last_mut(), &item)
            {
                last.push_str(new_s);
                continue;
            }
            normalized.push(item);
        }
        self.contents = normalized;
    }

    /// Encode to the wire form: `u8 block_type`, then [`encode_items`] of
    /// `contents`. Network byte order throughout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(3 + self.contents.len() * 2);
        out.push(self.block_type.tag());
        out.extend_from_slice(&encode_items(&self.contents));
        out
    }

    /// Decode from the wire form produced by [`Block::to_bytes`].
    pub fn from_bytes<R: Read>(rdr: &mut R) -> Result<Self, BlockError> {
        let mut tag_buf = [0u8; 1];
        rdr.read_exact(&mut tag_buf)?;
        let block_type = BlockType::from_tag(tag_buf[0])?;
        let contents = decode_items(rdr)?;
        Ok(Self {
            block_type,
            contents,
            contents_modified: false,
        })
    }

    /// Write [`Block::to_bytes`] directly to a writer.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.to_bytes())
    }
}

/// Encode a `styled_items` run: `u16 count`, then each item as a one-byte
/// style tag or `(4, u16 len, utf8 bytes)`. Shared by [`Block`]'s codec and
/// `screenplay-patch`'s `AddData` change, which carries the same item list
/// without a leading `block_type` byte.
pub fn encode_items(items: &[ContentItem]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + items.len() * 2);
    #[allow(clippy::cast_possible_truncation)]
    out.extend_from_slice(&(items.len() as u16).to_be_bytes());
    for item in items {
        match item {
            ContentItem::Text(s) => {
                out.push(TEXT_TAG);
                let bytes = s.as_bytes();
                #[allow(clippy::cast_possible_truncation)]
                out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
                out.extend_from_slice(bytes);
            }
            ContentItem::Style(marker) => out.push(marker.tag()),
        }
    }
    out
}

/// Decode a `styled_items` run produced by [`encode_items`].
pub fn decode_items<R: Read>(rdr: &mut R) -> Result<Vec<ContentItem>, BlockError> {
    let mut count_buf = [0u8; 2];
    rdr.read_exact(&mut count_buf)?;
    let count = u16::from_be_bytes(count_buf);

    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let mut item_tag = [0u8; 1];
        rdr.read_exact(&mut item_tag)?;
        if item_tag[0] == TEXT_TAG {
            let mut len_buf = [0u8; 2];
            rdr.read_exact(&mut len_buf)?;
            let len = u16::from_be_bytes(len_buf) as usize;
            let mut bytes = vec![0u8; len];
            rdr.read_exact(&mut bytes)?;
            items.push(ContentItem::Text(String::from_utf8(bytes)?));
        } else {
            let marker =
                StyleMarker::from_tag(item_tag[0]).ok_or(BlockError::UnknownItemTag(item_tag[0]))?;
            items.push(ContentItem::Style(marker));
        }
    }
    Ok(items)
}

/// Sum of item lengths (see [`Block::length`]) for a standalone item list,
/// used by the patch algebra's `AddData` to compute its insertion size
/// without constructing a full `Block`.
#[must_use]
pub fn items_len(items: &[ContentItem]) -> usize {
    items.iter().map(ContentItem::weight).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn text(s: &str) -> ContentItem {
        ContentItem::Text(s.to_string())
    }

    #[test]
    fn length_counts_text_chars_and_one_per_marker() {
        let block = Block {
            block_type: BlockType::Action,
            contents: vec![
                text("Hello"),
                ContentItem::Style(StyleMarker::Italics),
                text("!"),
            ],
            contents_modified: false,
        };
        assert_eq!(block.length(), 5 + 1 + 1);
    }

    #[test]
    fn apply_add_at_start_prepends() {
        let mut block = Block::new(BlockType::Action);
        block.contents = vec![text("World")];
        block.apply_add(0, vec![text("Hello ")]);
        assert_eq!(block.contents, vec![text("Hello "), text("World")]);
    }

    #[test]
    fn apply_add_at_end_appends() {
        let mut block = Block::new(BlockType::Action);
        block.contents = vec![text("Hello")];
        block.apply_add(5, vec![text("!")]);
        assert_eq!(block.contents, vec![text("Hello"), text("!")]);
    }

    #[test]
    fn apply_add_splits_a_text_run() {
        let mut block = Block::new(BlockType::Action);
        block.contents = vec![text("AB")];
        block.apply_add(1, vec![text("X")]);
        block.normalize();
        assert_eq!(block.contents, vec![text("AXB")]);
    }

    #[test]
    fn apply_remove_excises_middle() {
        let mut block = Block::new(BlockType::Action);
        block.contents = vec![text("ABCDE")];
        block.apply_remove(1, 3);
        block.normalize();
        assert_eq!(block.contents, vec![text("AE")]);
    }

    #[test]
    fn apply_remove_tolerates_truncation() {
        let mut block = Block::new(BlockType::Action);
        block.contents = vec![text("AB")];
        block.apply_remove(0, 100);
        block.normalize();
        assert!(block.contents.is_empty());
    }

    #[test]
    fn normalize_coalesces_and_drops_empty() {
        let mut block = Block::new(BlockType::Action);
        block.contents = vec![text("A"), text(""), text("B")];
        block.normalize();
        assert_eq!(block.contents, vec![text("AB")]);
    }

    #[test]
    fn exclude_styles_splits_around_markers() {
        let mut block = Block::new(BlockType::Action);
        block.contents = vec![
            text("AB"),
            ContentItem::Style(StyleMarker::Bold),
            text("CD"),
        ];
        // length is 2 + 1 + 2 = 5; select the whole block.
        let ranges = block.exclude_styles(0, 5);
        assert_eq!(ranges, vec![0..2, 3..5]);
    }

    #[test]
    fn block_round_trips_through_bytes() {
        let block = Block {
            block_type: BlockType::Dialogue,
            contents: vec![
                text("Hello"),
                ContentItem::Style(StyleMarker::Italics),
                text("world"),
                ContentItem::Style(StyleMarker::LineBreak),
            ],
            contents_modified: true,
        };
        let bytes = block.to_bytes();
        let mut cursor = io::Cursor::new(bytes);
        let decoded = Block::from_bytes(&mut cursor).expect("decode");
        assert_eq!(decoded.block_type, block.block_type);
        assert_eq!(decoded.contents, block.contents);
        // contents_modified is transient, not part of the wire form.
        assert!(!decoded.contents_modified);
    }

    #[test]
    fn unknown_block_type_tag_errors() {
        let bytes = [255u8, 0, 0];
        let mut cursor = io::Cursor::new(bytes);
        assert!(matches!(
            Block::from_bytes(&mut cursor),
            Err(BlockError::UnknownBlockType(255))
        ));
    }

    proptest::proptest! {
        #[test]
        fn add_then_remove_same_range_is_identity(s in "[a-zA-Z]{0,8}", insert in "[a-zA-Z]{1,5}") {
            let mut block = Block::new(BlockType::Action);
            block.contents = vec![ContentItem::Text(s.clone())];
            let start = s.chars().count();
            block.apply_add(start, vec![ContentItem::Text(insert.clone())]);
            block.apply_remove(start, insert.chars().count());
            block.normalize();
            let expected_len: usize = s.chars().count();
            prop_assert_eq!(block.length(), expected_len);
        }
    }
}
