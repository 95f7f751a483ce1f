//! HTML to schema conversion.
//!
//! The document is parsed leniently, top-level tables become table-layout
//! sections and every cell is split into fields, static markup and nested
//! tables. A field belongs to the table that most closely encloses it.

mod dom;
pub mod fields;
pub mod normalize;

use crate::attributes::HtmlAttributes;
use crate::schema::{
    create_id, Column, Field, FormSchema, Row, Section, SectionLayout, StaticBlock, StaticKind,
    TableSchema,
};
use dom::{
    attr, child_elements, collect_attributes, descendant_elements, first_element, is_cell,
    is_field_element, nearest_cell, nearest_table, tag, MarkupWriter, NodeSet,
};
use fields::FieldReader;
use scraper::{ElementRef, Html};

pub use fields::{binding_property, sanitize_label};
pub use normalize::repair_missing_rows;

/// Converts an HTML document into a form schema. Never fails: markup with no
/// recognizable structure yields a schema without sections that still
/// carries the original document.
pub fn parse_html_to_schema(html: &str, fallback_name: &str) -> FormSchema {
    let repaired = repair_missing_rows(html);
    let document = Html::parse_document(&repaired);
    let root = document.root_element();
    let mut importer = Importer::new(&root);

    let head = first_element(&root, &["head"]);
    let body = first_element(&root, &["body"]);
    let heading = importer.heading_text(&root, fallback_name);

    let tables = top_level_tables(&root);
    let mut sections: Vec<Section> = Vec::with_capacity(tables.len());
    for (index, table) in tables.iter().enumerate() {
        let parsed = importer.parse_table(table);
        importer.consumed.insert(table);
        let title = if tables.len() > 1 {
            format!("{heading} (Table {})", index + 1)
        } else {
            heading.clone()
        };
        sections.push(Section {
            id: create_id(),
            title,
            layout: SectionLayout::Table,
            rows: parsed.rows,
            table_attributes: parsed.table_attributes,
        });
    }

    if sections.is_empty() {
        if let Some(section) = body.as_ref().and_then(|b| importer.stack_section(b, &heading)) {
            sections.push(section);
        }
    }

    tracing::debug!(
        sections = sections.len(),
        tables = tables.len(),
        "imported {fallback_name}"
    );

    let head_html = head.map(|h| h.inner_html()).filter(|h| !h.trim().is_empty());
    let body_html = body.map(|b| b.inner_html()).filter(|b| !b.trim().is_empty());
    let remaining = body.map(|b| {
        MarkupWriter::new(&importer.consumed)
            .children(&b)
            .trim()
            .to_string()
    });

    FormSchema {
        id: create_id(),
        name: heading,
        description: Some(format!("Imported from sample: {fallback_name}")),
        form_class: None,
        action_code: None,
        version: 1,
        sections,
        original_html: Some(html.to_string()).filter(|h| !h.trim().is_empty()),
        original_head_html: head_html,
        original_body_html: body_html,
        remaining_body_html: remaining,
    }
}

/// Alias of [`parse_html_to_schema`].
pub fn parse(html: &str, fallback_name: &str) -> FormSchema {
    parse_html_to_schema(html, fallback_name)
}

fn top_level_tables<'a>(root: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
    descendant_elements(root)
        .filter(|el| tag(el) == "table" && nearest_table(el).is_none())
        .collect()
}

fn table_rows<'a>(table: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
    let mut rows = Vec::new();
    for child in child_elements(table) {
        match tag(&child) {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => {
                rows.extend(child_elements(&child).filter(|c| tag(c) == "tr"));
            }
            _ => {}
        }
    }
    rows
}

fn row_cells<'a>(row: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
    child_elements(row).filter(is_cell).collect()
}

fn span_attr(cell: &ElementRef<'_>, name: &str) -> u32 {
    attr(cell, name)
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(1)
}

fn cell_attributes(cell: &ElementRef<'_>) -> HtmlAttributes {
    let mut attrs = collect_attributes(cell);
    attrs.remove("colspan");
    attrs.remove("rowspan");
    attrs
}

/// A run of a cell's children: content between nested tables, or one table.
enum Segment<'a> {
    Content(std::ops::Range<usize>),
    Table(ElementRef<'a>),
}

struct Importer<'a> {
    reader: FieldReader<'a>,
    /// Elements already represented in the schema; left out of static markup.
    consumed: NodeSet,
}

impl<'a> Importer<'a> {
    fn new(root: &ElementRef<'a>) -> Self {
        Self {
            reader: FieldReader::new(root),
            consumed: NodeSet::default(),
        }
    }

    fn heading_text(&self, root: &ElementRef<'a>, fallback_name: &str) -> String {
        let heading = first_element(root, &["h1", "h2", "h3"])
            .map(|h| dom::collapse_whitespace(&dom::text_content(&h)))
            .filter(|t| !t.is_empty());
        let title = || {
            first_element(root, &["title"])
                .map(|t| dom::collapse_whitespace(&dom::text_content(&t)))
                .filter(|t| !t.is_empty())
        };
        heading
            .or_else(title)
            .or_else(|| Some(fallback_name.trim().to_string()).filter(|n| !n.is_empty()))
            .unwrap_or_else(|| "Imported sample".to_string())
    }

    fn parse_table(&mut self, table: &ElementRef<'a>) -> TableSchema {
        let rows = table_rows(table);

        let single_cell = match rows.as_slice() {
            [row] => match row_cells(row).as_slice() {
                [cell] if child_elements(cell).any(|c| tag(&c) == "table") => Some((*row, *cell)),
                _ => None,
            },
            _ => None,
        };

        let rows = match single_cell {
            Some((row, cell)) => self.explode_cell(table, &row, &cell),
            None => rows.iter().map(|row| self.parse_row(table, row)).collect(),
        };

        TableSchema {
            id: create_id(),
            rows,
            table_attributes: collect_attributes(table),
        }
    }

    fn parse_row(&mut self, table: &ElementRef<'a>, row: &ElementRef<'a>) -> Row {
        let columns = row_cells(row)
            .iter()
            .map(|cell| self.parse_cell(table, cell))
            .collect();
        Row {
            id: create_id(),
            columns,
            html_attributes: collect_attributes(row),
        }
    }

    fn parse_cell(&mut self, table: &ElementRef<'a>, cell: &ElementRef<'a>) -> Column {
        let mut column = self.empty_column(cell);

        self.push_nested_tables(&mut column, child_elements(cell), cell);

        let controls = owned_controls(std::iter::once(*cell), Some(table));
        column.fields = self.read_fields(&controls);
        column.static_blocks = self.static_block(cell, &|_| true).into_iter().collect();
        column
    }

    /// Splits a lone cell holding nested tables into one row per run of
    /// content and one row per nested table, keeping reading order.
    fn explode_cell(
        &mut self,
        table: &ElementRef<'a>,
        row: &ElementRef<'a>,
        cell: &ElementRef<'a>,
    ) -> Vec<Row> {
        let mut segments = Vec::new();
        let mut start = 0;
        for (index, child) in cell.children().enumerate() {
            if let Some(el) = ElementRef::wrap(child).filter(|el| tag(el) == "table") {
                if start < index {
                    segments.push(Segment::Content(start..index));
                }
                segments.push(Segment::Table(el));
                start = index + 1;
            }
        }
        let total = cell.children().count();
        if start < total {
            segments.push(Segment::Content(start..total));
        }

        tracing::debug!(segments = segments.len(), "exploding single cell with nested tables");

        let mut rows = Vec::new();
        for segment in segments {
            let mut column = self.empty_column(cell);
            match segment {
                Segment::Table(nested) => {
                    column.nested_tables.push(self.parse_table(&nested));
                    self.consumed.insert(&nested);
                }
                Segment::Content(range) => {
                    let roots: Vec<ElementRef<'a>> = cell
                        .children()
                        .enumerate()
                        .filter(|(i, _)| range.contains(i))
                        .filter_map(|(_, child)| ElementRef::wrap(child))
                        .collect();
                    self.push_nested_tables(&mut column, roots.iter().copied(), cell);
                    let controls = owned_controls(roots.into_iter(), Some(table));
                    column.fields = self.read_fields(&controls);
                    column.static_blocks = self
                        .static_block(cell, &|i| range.contains(&i))
                        .into_iter()
                        .collect();
                    if column.is_empty() {
                        continue;
                    }
                }
            }
            rows.push(Row {
                id: create_id(),
                columns: vec![column],
                html_attributes: collect_attributes(row),
            });
        }
        rows
    }

    /// Stack layout for documents with form controls but no tables: two
    /// fields per row.
    fn stack_section(&mut self, body: &ElementRef<'a>, title: &str) -> Option<Section> {
        let controls = owned_controls(std::iter::once(*body), None);
        if controls.is_empty() {
            return None;
        }
        let fields = self.read_fields(&controls);
        tracing::debug!(fields = fields.len(), "no tables found, using stack layout");

        let rows = fields
            .chunks(2)
            .map(|pair| {
                let columns = pair
                    .iter()
                    .map(|field| {
                        let mut column = Column::new();
                        column.span = 2;
                        column.fields.push(field.clone());
                        column
                    })
                    .collect();
                Row::with_columns(columns)
            })
            .collect();

        Some(Section {
            id: create_id(),
            title: title.to_string(),
            layout: SectionLayout::Stack,
            rows,
            table_attributes: HtmlAttributes::new(),
        })
    }

    /// Parses the tables under `roots` that sit directly in `cell`, at any
    /// depth of non-table wrappers.
    fn push_nested_tables(
        &mut self,
        column: &mut Column,
        roots: impl Iterator<Item = ElementRef<'a>>,
        cell: &ElementRef<'a>,
    ) {
        let tables: Vec<ElementRef<'a>> = roots
            .flat_map(|root| descendant_elements(&root).collect::<Vec<_>>())
            .filter(|el| tag(el) == "table" && nearest_cell(el).as_ref() == Some(cell))
            .collect();
        for nested in tables {
            column.nested_tables.push(self.parse_table(&nested));
            self.consumed.insert(&nested);
        }
    }

    fn empty_column(&self, cell: &ElementRef<'a>) -> Column {
        let mut column = Column::new();
        column.col_span = span_attr(cell, "colspan");
        column.row_span = span_attr(cell, "rowspan");
        column.html_attributes = cell_attributes(cell);
        column
    }

    fn read_fields(&mut self, controls: &[ElementRef<'a>]) -> Vec<Field> {
        let read = self.reader.read(controls);
        self.consumed.extend(read.consumed);
        read.fields
    }

    fn static_block(
        &self,
        cell: &ElementRef<'a>,
        include: &dyn Fn(usize) -> bool,
    ) -> Option<StaticBlock> {
        let html = MarkupWriter::new(&self.consumed).children_where(cell, include);
        let html = html.trim();
        if html.is_empty() {
            return None;
        }
        Some(StaticBlock {
            id: create_id(),
            html: html.to_string(),
            label: None,
            kind: Some(StaticKind::Html),
        })
    }
}

/// Form controls under `roots` whose closest enclosing table is `owner`.
fn owned_controls<'a>(
    roots: impl Iterator<Item = ElementRef<'a>>,
    owner: Option<&ElementRef<'a>>,
) -> Vec<ElementRef<'a>> {
    let owner = owner.copied();
    roots
        .flat_map(|root| descendant_elements(&root).collect::<Vec<_>>())
        .filter(|el| is_field_element(el) && nearest_table(el) == owner)
        .collect()
}
