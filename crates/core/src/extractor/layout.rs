//! Positioned words rebuilt from a page's content stream.
//!
//! Only the text-state operators are interpreted. Glyph advances are
//! approximated from the font size, which is enough to cluster words into
//! lines and to rank text by size.

use crate::error::IngestError;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId};

const DEFAULT_PAGE_HEIGHT: f32 = 792.0;
/// Average glyph advance as a fraction of the font size.
const GLYPH_WIDTH_RATIO: f32 = 0.5;
/// Two runs closer than this vertically continue the same word.
const SAME_BASELINE: f32 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutWord {
    pub text: String,
    pub size: f32,
    pub x0: f32,
    pub x1: f32,
    /// Distance from the top edge of the page to the top of the glyphs.
    pub top: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutLine {
    pub top: f32,
    pub text: String,
}

pub fn page_words(
    document: &Document,
    page_id: ObjectId,
    x_tolerance: f32,
) -> Result<Vec<LayoutWord>, IngestError> {
    let data = document
        .get_page_content(page_id)
        .map_err(|error| IngestError::Extraction(error.to_string()))?;
    let content =
        Content::decode(&data).map_err(|error| IngestError::Extraction(error.to_string()))?;
    let height = page_height(document, page_id);
    Ok(words_from_operations(&content.operations, height, x_tolerance))
}

fn page_height(document: &Document, page_id: ObjectId) -> f32 {
    let mut current = Some(page_id);
    // MediaBox is inheritable from the page tree.
    for _ in 0..16 {
        let Some(id) = current else { break };
        let Ok(dictionary) = document.get_dictionary(id) else {
            break;
        };
        if let Ok(media_box) = dictionary.get(b"MediaBox") {
            let resolved = match media_box {
                Object::Reference(reference) => document.get_object(*reference).ok(),
                other => Some(other),
            };
            if let Some(Object::Array(values)) = resolved {
                let numbers = values.iter().filter_map(as_number).collect::<Vec<_>>();
                if numbers.len() == 4 {
                    return (numbers[3] - numbers[1]).abs();
                }
            }
        }
        current = dictionary
            .get(b"Parent")
            .and_then(Object::as_reference)
            .ok();
    }
    DEFAULT_PAGE_HEIGHT
}

fn as_number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn translated(self, tx: f32, ty: f32) -> Matrix {
        Matrix {
            e: self.e + tx * self.a + ty * self.c,
            f: self.f + tx * self.b + ty * self.d,
            ..self
        }
    }

    fn horizontal_scale(&self) -> f32 {
        let scale = (self.a * self.a + self.b * self.b).sqrt();
        if scale > f32::EPSILON {
            scale
        } else {
            1.0
        }
    }

    fn vertical_scale(&self) -> f32 {
        let scale = (self.c * self.c + self.d * self.d).sqrt();
        if scale > f32::EPSILON {
            scale
        } else {
            1.0
        }
    }
}

struct TextState {
    font_size: f32,
    leading: f32,
    line_matrix: Matrix,
    text_matrix: Matrix,
    page_height: f32,
    x_tolerance: f32,
    pending: Option<LayoutWord>,
    words: Vec<LayoutWord>,
}

impl TextState {
    fn new(page_height: f32, x_tolerance: f32) -> Self {
        Self {
            font_size: 0.0,
            leading: 0.0,
            line_matrix: Matrix::IDENTITY,
            text_matrix: Matrix::IDENTITY,
            page_height,
            x_tolerance,
            pending: None,
            words: Vec::new(),
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = self.line_matrix.translated(tx, ty);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }

    fn effective_size(&self) -> f32 {
        self.font_size.abs() * self.text_matrix.vertical_scale()
    }

    fn glyph_width(&self) -> f32 {
        self.font_size.abs() * self.text_matrix.horizontal_scale() * GLYPH_WIDTH_RATIO
    }

    fn shift(&mut self, thousandths: f32) {
        let advance = -thousandths / 1_000.0 * self.font_size * self.text_matrix.horizontal_scale();
        self.text_matrix.e += advance;
    }

    fn show(&mut self, bytes: &[u8]) {
        let size = self.effective_size();
        let width = self.glyph_width();
        let top = self.page_height - self.text_matrix.f - size;
        let mut x = self.text_matrix.e;

        for ch in decode_bytes(bytes).chars() {
            if ch.is_whitespace() {
                self.flush();
                x += width;
                continue;
            }
            if ch.is_control() {
                continue;
            }

            let continues = self.pending.as_ref().is_some_and(|word| {
                (word.top - top).abs() <= SAME_BASELINE
                    && (x - word.x1).abs() <= self.x_tolerance
            });
            if continues {
                if let Some(word) = self.pending.as_mut() {
                    word.text.push(ch);
                    word.x1 = x + width;
                }
            } else {
                self.flush();
                self.pending = Some(LayoutWord {
                    text: ch.to_string(),
                    size,
                    x0: x,
                    x1: x + width,
                    top,
                });
            }
            x += width;
        }

        self.text_matrix.e = x;
    }

    fn flush(&mut self) {
        if let Some(word) = self.pending.take() {
            self.words.push(word);
        }
    }

    fn apply(&mut self, operation: &Operation) {
        let operands = &operation.operands;
        let number = |index: usize| operands.get(index).and_then(as_number);

        match operation.operator.as_str() {
            "BT" => {
                self.line_matrix = Matrix::IDENTITY;
                self.text_matrix = Matrix::IDENTITY;
            }
            "ET" => self.flush(),
            "Tf" => {
                if let Some(size) = number(1) {
                    self.font_size = size;
                }
            }
            "TL" => {
                if let Some(leading) = number(0) {
                    self.leading = leading;
                }
            }
            "Td" => {
                if let (Some(tx), Some(ty)) = (number(0), number(1)) {
                    self.move_line(tx, ty);
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) = (number(0), number(1)) {
                    self.leading = -ty;
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                let values = (0..6).filter_map(number).collect::<Vec<_>>();
                if let [a, b, c, d, e, f] = values[..] {
                    self.line_matrix = Matrix { a, b, c, d, e, f };
                    self.text_matrix = self.line_matrix;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(bytes);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(bytes);
                }
            }
            "\"" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    self.show(bytes);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    for item in items {
                        match item {
                            Object::String(bytes, _) => self.show(bytes),
                            other => {
                                if let Some(adjustment) = as_number(other) {
                                    self.shift(adjustment);
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

/// UTF-16BE when the string carries a byte-order mark, otherwise one char per byte.
fn decode_bytes(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect::<Vec<_>>();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&byte| byte as char).collect()
}

pub fn words_from_operations(
    operations: &[Operation],
    page_height: f32,
    x_tolerance: f32,
) -> Vec<LayoutWord> {
    let mut state = TextState::new(page_height, x_tolerance);
    for operation in operations {
        state.apply(operation);
    }
    state.flush();
    state.words
}

/// Clusters words into lines: a word joins the current line while its top is
/// within `y_tolerance` of the line's first word. Lines come out top to bottom.
pub fn group_lines(words: &[&LayoutWord], y_tolerance: f32) -> Vec<LayoutLine> {
    let mut sorted = words.to_vec();
    sorted.sort_by(|left, right| {
        left.top
            .total_cmp(&right.top)
            .then(left.x0.total_cmp(&right.x0))
    });

    let mut grouped: Vec<(f32, Vec<&LayoutWord>)> = Vec::new();
    for word in sorted {
        match grouped.last_mut() {
            Some((top, members)) if (word.top - *top).abs() <= y_tolerance => members.push(word),
            _ => grouped.push((word.top, vec![word])),
        }
    }

    grouped
        .into_iter()
        .map(|(top, mut members)| {
            members.sort_by(|left, right| left.x0.total_cmp(&right.x0));
            LayoutLine {
                top,
                text: members
                    .iter()
                    .map(|word| word.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" "),
            }
        })
        .collect()
}

/// Page text rebuilt from positioned words, one output line per layout line.
pub fn layout_text(words: &[LayoutWord], y_tolerance: f32) -> String {
    let refs = words.iter().collect::<Vec<_>>();
    group_lines(&refs, y_tolerance)
        .into_iter()
        .map(|line| line.text)
        .collect::<Vec<_>>()
        .join("\n")
}
