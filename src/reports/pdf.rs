use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};

use super::{ReportError, ReportTable};

// US Letter, landscape
const PAGE_WIDTH: f32 = 279.4;
const PAGE_HEIGHT: f32 = 215.9;
const MARGIN: f32 = 12.0;
const ROW_HEIGHT: f32 = 5.5;
const BODY_SIZE: f32 = 7.5;
const HEADER_SIZE: f32 = 8.0;
// Helvetica averages about half an em per glyph
const CHAR_WIDTH_MM: f32 = BODY_SIZE * 0.5 * 0.3528;

fn rows_per_page(first: bool) -> usize {
    // The first page also carries the title block
    let title_block = if first { 22.0 } else { 0.0 };
    ((PAGE_HEIGHT - 2.0 * MARGIN - title_block - ROW_HEIGHT) / ROW_HEIGHT).floor() as usize
}

/// Split row indices into pages
pub fn paginate(total_rows: usize) -> Vec<std::ops::Range<usize>> {
    let mut pages = Vec::new();
    let mut start = 0;
    let mut first = true;
    loop {
        let end = (start + rows_per_page(first)).min(total_rows);
        pages.push(start..end);
        if end >= total_rows {
            break;
        }
        start = end;
        first = false;
    }
    pages
}

fn fit(text: &str, width_mm: f32) -> String {
    let max = ((width_mm - 1.5) / CHAR_WIDTH_MM).floor().max(1.0) as usize;
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(2)).collect();
    cut.push_str("..");
    cut
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

fn draw_rows(layer: &PdfLayerReference, fonts: &Fonts, table: &ReportTable, rows: std::ops::Range<usize>, top: f32) {
    let col_width = (PAGE_WIDTH - 2.0 * MARGIN) / table.columns.len().max(1) as f32;
    let mut y = top;

    for (i, name) in table.columns.iter().enumerate() {
        let x = MARGIN + i as f32 * col_width;
        layer.use_text(fit(name, col_width), HEADER_SIZE, Mm(x), Mm(y), &fonts.bold);
    }
    y -= ROW_HEIGHT;

    for row in &table.rows[rows] {
        for (i, cell) in row.iter().enumerate() {
            let x = MARGIN + i as f32 * col_width;
            layer.use_text(fit(&cell.display(), col_width), BODY_SIZE, Mm(x), Mm(y), &fonts.regular);
        }
        y -= ROW_HEIGHT;
    }
}

/// Title, period line, then the table with its header repeated on every page
pub fn render(title: &str, subtitle: &str, table: &ReportTable) -> Result<Vec<u8>, ReportError> {
    let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Report");
    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ReportError::Pdf(e.to_string()))?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ReportError::Pdf(e.to_string()))?,
    };

    let pages = paginate(table.len());
    let mut current = doc.get_page(page).get_layer(layer);
    let mut top = PAGE_HEIGHT - MARGIN;

    current.use_text(title, 16.0, Mm(MARGIN), Mm(top - 6.0), &fonts.bold);
    current.use_text(subtitle, 10.0, Mm(MARGIN), Mm(top - 14.0), &fonts.regular);
    top -= 22.0;

    for (n, rows) in pages.into_iter().enumerate() {
        if n > 0 {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), format!("Page {}", n + 1));
            current = doc.get_page(page).get_layer(layer);
            top = PAGE_HEIGHT - MARGIN;
        }
        draw_rows(&current, &fonts, table, rows, top);
    }

    doc.save_to_bytes().map_err(|e| ReportError::Pdf(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::Cell;

    #[test]
    fn pages_cover_every_row_once() {
        let pages = paginate(200);
        assert!(pages.len() > 1);
        assert_eq!(pages.first().unwrap().start, 0);
        assert_eq!(pages.last().unwrap().end, 200);
        for pair in pages.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(paginate(0), vec![0..0]);
    }

    #[test]
    fn long_text_is_truncated() {
        assert_eq!(fit("KAA", 30.0), "KAA");
        let cut = fit(&"x".repeat(200), 20.0);
        assert!(cut.ends_with(".."));
        assert!(cut.len() < 200);
    }

    #[test]
    fn renders_a_pdf() {
        let mut table = ReportTable::new(&["vehicle_number", "cost"]);
        for i in 0..60 {
            table.push(vec![Cell::Text(format!("KAA {:03}", i)), Cell::Number(i as f64)]);
        }
        let bytes = render("Maintenance Costs", "Period: March 01, 2024 - March 09, 2024", &table).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
