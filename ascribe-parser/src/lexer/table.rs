use std::{collections::VecDeque, sync::LazyLock};

use regex::{Captures, Regex};

use super::{Lexer, Scope};
use crate::{
    error::SourceLocation,
    model::{
        BlockMetadata, Cell, CellContent, CellSpec, CellStyle, Column, Context, HorizontalAlignment,
        Row, Table, TableFormat, VerticalAlignment,
    },
    pattern::compile,
    reader::Line,
    substitution::{NORMAL, VERBATIM},
};

/// `3*^.>2%m`: multiplier, alignment, width, style.
static COLSPEC: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^(?:(\d+)\*)?([<^>])?(?:\.([<^>]))?(\d+%?)?([a-z])?$"));

/// Span or duplication, alignments and style: `2.3+^.>a`.
const CELLSPEC: &str = r"(?:(\d+)?(?:\.(\d+))?([*+]))?([<^>])?(?:\.([<^>]))?([adehlmsv])?";

/// A cellspec closing the text of the previous cell. It must follow a blank, so a
/// one-letter cell such as `|a|b` is text, not a style.
static TRAILING_CELLSPEC: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"[ \t\n]{CELLSPEC}$")));

/// The whole text in front of a table's first separator.
static LEADING_CELLSPEC: LazyLock<Regex> = LazyLock::new(|| compile(&format!(r"^{CELLSPEC}$")));

static PARAGRAPH_BREAK: LazyLock<Regex> = LazyLock::new(|| compile(r"\n[ \t]*\n"));

/// Upper bound on `N*` cell duplication, on spans and on the column count.
const MAX_REPEAT: usize = 1024;

/// A cell as scanned, before it is placed in a row.
#[derive(Debug, Clone, PartialEq)]
struct RawCell {
    spec: CellSpec,
    text: String,
    /// Index of the body line the cell starts on.
    line: usize,
}

fn horizontal(marker: &str) -> HorizontalAlignment {
    match marker {
        "^" => HorizontalAlignment::Center,
        ">" => HorizontalAlignment::Right,
        _ => HorizontalAlignment::Left,
    }
}

fn vertical(marker: &str) -> VerticalAlignment {
    match marker {
        "^" => VerticalAlignment::Middle,
        ">" => VerticalAlignment::Bottom,
        _ => VerticalAlignment::Top,
    }
}

fn number(captures: &Captures<'_>, group: usize) -> Option<usize> {
    captures.get(group).and_then(|m| m.as_str().parse().ok())
}

/// The cellspec a [`CELLSPEC`] match describes, with its duplication count. `None` when
/// the match is empty or a span operator has no number.
fn cellspec_from(captures: &Captures<'_>) -> Option<(CellSpec, usize)> {
    if (4..=6).all(|group| captures.get(group).is_none()) && captures.get(3).is_none() {
        return None;
    }
    let mut spec = CellSpec::default();
    let mut repeat = 1;
    if let Some(operator) = captures.get(3) {
        let (first, second) = (number(captures, 1), number(captures, 2));
        if first.is_none() && second.is_none() {
            return None;
        }
        if operator.as_str() == "*" {
            repeat = first.unwrap_or(1).clamp(1, MAX_REPEAT);
        } else {
            spec.colspan = first.unwrap_or(1).clamp(1, MAX_REPEAT);
            spec.rowspan = second.unwrap_or(1).clamp(1, MAX_REPEAT);
        }
    }
    spec.halign = captures.get(4).map(|m| horizontal(m.as_str()));
    spec.valign = captures.get(5).map(|m| vertical(m.as_str()));
    spec.style = captures
        .get(6)
        .and_then(|m| m.as_str().chars().next())
        .and_then(CellStyle::from_letter);
    Some((spec, repeat))
}

/// Split the text in front of a separator into the content of the cell it closes and
/// the cellspec of the cell it opens.
fn split_cellspec(buffer: &str) -> (&str, Option<(CellSpec, usize)>) {
    let Some(captures) = TRAILING_CELLSPEC.captures(buffer) else {
        return (buffer, None);
    };
    let (Some(whole), Some(spec)) = (captures.get(0), cellspec_from(&captures)) else {
        return (buffer, None);
    };
    (buffer.get(..whole.start()).unwrap_or(""), Some(spec))
}

fn leading_spec(lead: &str) -> Option<(CellSpec, usize)> {
    cellspec_from(&LEADING_CELLSPEC.captures(lead)?)
}

fn push_cells(cells: &mut Vec<RawCell>, (spec, repeat): (CellSpec, usize), text: &str, line: usize) {
    for _ in 0..repeat {
        cells.push(RawCell {
            spec: spec.clone(),
            text: text.trim().to_string(),
            line,
        });
    }
}

/// Delimiter-separated values: one row per line, `\` escapes the separator.
fn scan_dsv(body: &[Line], separator: char) -> Vec<RawCell> {
    let mut cells = Vec::new();
    for (index, line) in body.iter().enumerate() {
        if line.is_blank() {
            continue;
        }
        let mut field = String::new();
        let mut chars = line.text.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\\' && chars.peek() == Some(&separator) {
                field.push(separator);
                chars.next();
            } else if c == separator {
                push_cells(&mut cells, (CellSpec::default(), 1), &field, index);
                field.clear();
            } else {
                field.push(c);
            }
        }
        push_cells(&mut cells, (CellSpec::default(), 1), &field, index);
    }
    cells
}

impl Lexer<'_, '_> {
    /// Build a table from the lines between its delimiters.
    ///
    /// `format` and `separator` come from the delimiter and may be overridden by the
    /// `format` and `separator` attributes. Rows are formed by filling the column count,
    /// taken from `cols` or else from the cells on the first line.
    #[tracing::instrument(level = "trace", skip(self, metadata, body))]
    pub(super) fn parse_table(
        &mut self,
        metadata: BlockMetadata,
        format: TableFormat,
        separator: char,
        body: &[Line],
        location: SourceLocation,
    ) -> Table {
        let (format, separator) = table_dialect(&metadata, format, separator);
        let mut columns = metadata
            .attribute("cols")
            .map(|cols| self.parse_columns(cols, &location))
            .unwrap_or_default();
        let cells = match format {
            TableFormat::Psv => self.scan_psv(body, separator, &location),
            TableFormat::Csv => self.scan_csv(body, separator, &location),
            TableFormat::Dsv => scan_dsv(body, separator),
        };
        if columns.is_empty() {
            let first_line = cells.first().map(|cell| cell.line);
            let count = cells
                .iter()
                .filter(|cell| Some(cell.line) == first_line)
                .fold(0, |total: usize, cell| total.saturating_add(cell.spec.colspan))
                .clamp(1, MAX_REPEAT);
            columns = vec![
                Column {
                    width: 1,
                    ..Column::default()
                };
                count
            ];
        }

        let implicit_header = body.first().is_some_and(|line| !line.is_blank())
            && body.get(1).is_some_and(Line::is_blank);
        let has_header = metadata.has_option("header")
            || (implicit_header && !metadata.has_option("noheader"));
        let mut rows = self.layout_rows(cells, columns.len(), &location);
        tracing::trace!(columns = columns.len(), rows = rows.len(), ?format, "table scanned");

        let head_row = if has_header && !rows.is_empty() {
            Some(rows.remove(0))
        } else {
            None
        };
        let foot_row = if metadata.has_option("footer") {
            rows.pop()
        } else {
            None
        };
        let head = head_row
            .into_iter()
            .map(|row| self.build_row(row, &columns, true, &location))
            .collect();
        let foot = foot_row
            .into_iter()
            .map(|row| self.build_row(row, &columns, false, &location))
            .collect();
        let body = rows
            .into_iter()
            .map(|row| self.build_row(row, &columns, false, &location))
            .collect();
        Table {
            context: Context::Table,
            format,
            metadata,
            columns,
            head,
            body,
            foot,
            location,
        }
    }

    fn parse_columns(&mut self, cols: &str, location: &SourceLocation) -> Vec<Column> {
        let cols = cols.trim();
        let plain = Column {
            width: 1,
            ..Column::default()
        };
        if let Ok(count) = cols.parse::<usize>() {
            return vec![plain; count.min(MAX_REPEAT)];
        }
        let mut columns = Vec::new();
        for colspec in cols.split([',', ';']).map(str::trim) {
            let Some(captures) = COLSPEC.captures(colspec) else {
                self.warn(location.clone(), format!("malformed column spec: {colspec}"));
                columns.push(plain.clone());
                continue;
            };
            let repeat = number(&captures, 1).unwrap_or(1).clamp(1, MAX_REPEAT);
            let column = Column {
                width: captures
                    .get(4)
                    .and_then(|m| m.as_str().trim_end_matches('%').parse().ok())
                    .unwrap_or(1),
                halign: captures
                    .get(2)
                    .map_or(HorizontalAlignment::Left, |m| horizontal(m.as_str())),
                valign: captures
                    .get(3)
                    .map_or(VerticalAlignment::Top, |m| vertical(m.as_str())),
                style: captures
                    .get(5)
                    .and_then(|m| m.as_str().chars().next())
                    .and_then(CellStyle::from_letter)
                    .unwrap_or_default(),
            };
            columns.extend(std::iter::repeat_n(column, repeat));
        }
        columns
    }

    /// Prefix-separated values. Each separator closes the cell in front of it; text
    /// between the last blank and a separator is the cellspec of the next cell.
    fn scan_psv(&mut self, body: &[Line], separator: char, location: &SourceLocation) -> Vec<RawCell> {
        let mut cells = Vec::new();
        let mut buffer = String::new();
        let mut open: Option<((CellSpec, usize), usize)> = None;
        for (index, line) in body.iter().enumerate() {
            let mut chars = line.text.chars().peekable();
            while let Some(c) = chars.next() {
                if c == '\\' && chars.peek() == Some(&separator) {
                    buffer.push(separator);
                    chars.next();
                    continue;
                }
                if c != separator {
                    buffer.push(c);
                    continue;
                }
                let next = match open.take() {
                    Some((spec, start)) => {
                        let (text, next) = split_cellspec(&buffer);
                        push_cells(&mut cells, spec, text, start);
                        next
                    }
                    None => self.leading_cellspec(&mut cells, buffer.trim(), index, location),
                };
                buffer.clear();
                open = Some((next.unwrap_or((CellSpec::default(), 1)), index));
            }
            buffer.push('\n');
        }
        if let Some((spec, start)) = open {
            push_cells(&mut cells, spec, &buffer, start);
        }
        cells
    }

    /// The text in front of a table's first separator, which may only be a cellspec.
    /// Anything else is reported and kept as a cell of its own.
    fn leading_cellspec(
        &mut self,
        cells: &mut Vec<RawCell>,
        lead: &str,
        line: usize,
        location: &SourceLocation,
    ) -> Option<(CellSpec, usize)> {
        if lead.is_empty() {
            return None;
        }
        if let Some(spec) = leading_spec(lead) {
            return Some(spec);
        }
        self.warn(location.clone(), format!("malformed cellspec: {lead}"));
        push_cells(cells, (CellSpec::default(), 1), lead, line);
        None
    }

    fn scan_csv(&mut self, body: &[Line], separator: char, location: &SourceLocation) -> Vec<RawCell> {
        let text = body
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let delimiter = u8::try_from(separator).unwrap_or(b',');
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(text.as_bytes());
        let mut cells = Vec::new();
        for record in reader.records() {
            let record = match record {
                Ok(record) => record,
                Err(error) => {
                    self.warn(location.clone(), format!("malformed CSV table data: {error}"));
                    break;
                }
            };
            let line = record
                .position()
                .and_then(|position| usize::try_from(position.line()).ok())
                .map_or(0, |line| line.saturating_sub(1));
            for field in &record {
                push_cells(&mut cells, (CellSpec::default(), 1), field, line);
            }
        }
        cells
    }

    /// Place cells into rows of `width` columns, accounting for column and row spans.
    /// Cells left over at the end do not make a row.
    fn layout_rows(
        &mut self,
        cells: Vec<RawCell>,
        width: usize,
        location: &SourceLocation,
    ) -> Vec<Vec<(RawCell, usize)>> {
        let mut rows = Vec::new();
        let mut row = Vec::new();
        let mut filled: usize = 0;
        // Columns taken by row spans from above; the front is the current row.
        let mut spanned: VecDeque<usize> = VecDeque::new();
        for cell in cells {
            let taken = spanned.front().copied().unwrap_or(0);
            let colspan = cell.spec.colspan.max(1);
            for offset in 1..cell.spec.rowspan {
                if spanned.len() <= offset {
                    spanned.resize(offset + 1, 0);
                }
                if let Some(slot) = spanned.get_mut(offset) {
                    *slot = slot.saturating_add(colspan);
                }
            }
            row.push((cell, filled.saturating_add(taken)));
            filled = filled.saturating_add(colspan);
            if filled.saturating_add(taken) >= width {
                rows.push(std::mem::take(&mut row));
                filled = 0;
                spanned.pop_front();
            }
        }
        if !row.is_empty() {
            self.warn(
                location.clone(),
                "dropping cells from incomplete row detected end of table",
            );
        }
        rows
    }

    fn build_row(
        &mut self,
        cells: Vec<(RawCell, usize)>,
        columns: &[Column],
        head: bool,
        location: &SourceLocation,
    ) -> Row {
        cells
            .into_iter()
            .map(|(cell, column)| {
                let style = cell
                    .spec
                    .style
                    .or_else(|| columns.get(column).map(|column| column.style))
                    .unwrap_or_default();
                let content = if head {
                    self.cell_paragraphs(&cell.text)
                } else {
                    self.cell_content(style, &cell.text, location)
                };
                Cell {
                    spec: cell.spec,
                    content,
                    source: cell.text,
                }
            })
            .collect()
    }

    fn cell_content(&mut self, style: CellStyle, text: &str, location: &SourceLocation) -> CellContent {
        match style {
            CellStyle::Asciidoc => {
                let lines = text
                    .lines()
                    .map(|line| Line::new(line.to_string(), location.clone()))
                    .collect();
                CellContent::Blocks(self.nested(lines, location.clone()).parse_blocks(Scope::Block))
            }
            CellStyle::Literal => CellContent::Literal(self.state.substitute(text, VERBATIM)),
            CellStyle::Verse => CellContent::Paragraphs(vec![self.state.substitute(text, NORMAL)]),
            CellStyle::Default
            | CellStyle::Emphasis
            | CellStyle::Header
            | CellStyle::Monospaced
            | CellStyle::Strong => self.cell_paragraphs(text),
        }
    }

    fn cell_paragraphs(&mut self, text: &str) -> CellContent {
        CellContent::Paragraphs(
            PARAGRAPH_BREAK
                .split(text)
                .map(str::trim)
                .filter(|paragraph| !paragraph.is_empty())
                .map(|paragraph| self.state.substitute(paragraph, NORMAL))
                .collect(),
        )
    }
}

/// Apply the `format` and `separator` attributes to the dialect the delimiter implies.
fn table_dialect(metadata: &BlockMetadata, format: TableFormat, separator: char) -> (TableFormat, char) {
    let (format, default_separator) = match metadata.attribute("format") {
        Some("csv") => (TableFormat::Csv, ','),
        Some("tsv") => (TableFormat::Csv, '\t'),
        Some("dsv") => (TableFormat::Dsv, ':'),
        Some("psv") => (TableFormat::Psv, '|'),
        Some(_) | None => (format, separator),
    };
    let separator = metadata
        .attribute("separator")
        .and_then(|value| match value {
            "\\t" => Some('\t'),
            value => value.chars().next(),
        })
        .unwrap_or(default_separator);
    (format, separator)
}
