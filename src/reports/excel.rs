use rust_xlsxwriter::{Format, Workbook};

use super::{Cell, ReportError, ReportTable};

const MAX_COLUMN_WIDTH: usize = 50;

/// Width for each column: longest value (header included) plus padding, capped
pub fn column_widths(table: &ReportTable) -> Vec<usize> {
    table
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let longest = table
                .rows
                .iter()
                .filter_map(|row| row.get(i))
                .map(|cell| cell.display().chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0);
            (longest + 2).min(MAX_COLUMN_WIDTH)
        })
        .collect()
}

/// Single "Report" sheet with a bold header row
pub fn render(table: &ReportTable) -> Result<Vec<u8>, ReportError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Report")?;

    for (col, name) in table.columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, name, &header)?;
    }

    for (r, row) in table.rows.iter().enumerate() {
        let r = (r + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            let col = col as u16;
            match cell {
                Cell::Number(n) => {
                    worksheet.write_number(r, col, *n)?;
                }
                Cell::Text(s) => {
                    worksheet.write_string(r, col, s)?;
                }
                Cell::Empty => {}
            }
        }
    }

    for (col, width) in column_widths(table).into_iter().enumerate() {
        worksheet.set_column_width(col as u16, width as f64)?;
    }

    Ok(workbook.save_to_buffer()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_are_padded_and_capped() {
        let mut table = ReportTable::new(&["id", "description"]);
        table.push(vec![Cell::Number(12345.0), Cell::Text("x".repeat(80))]);
        assert_eq!(column_widths(&table), vec![7, 50]);
    }

    #[test]
    fn workbook_is_a_zip_archive() {
        let mut table = ReportTable::new(&["vehicle_number", "fuel_cost"]);
        table.push(vec![Cell::Text("KBX 220Q".into()), Cell::Number(54.2)]);
        table.push(vec![Cell::Empty, Cell::Number(3.0)]);
        let bytes = render(&table).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }
}
