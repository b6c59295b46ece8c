//! Spreadsheet export of the canonical table.

use rust_xlsxwriter::{Color, Format, FormatBorder, Workbook};

use crate::metrics::{Table, columns};

/// MIME type of the produced workbook.
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// File name offered for download when the caller has no better one.
pub const DEFAULT_FILE_NAME: &str = "report.xlsx";

/// Name of the single worksheet.
pub const SHEET_NAME: &str = "Report";

const HEADER_FILL: u32 = 0xDDEBF7;

/// Render `table` as an `.xlsx` workbook held in memory.
///
/// One worksheet, a bold header row on a light fill, then one row per
/// record in table order. Dates are written as `YYYY-MM-DD` text and
/// metrics as numbers.
pub fn to_xlsx(table: &Table) -> crate::Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_border_bottom(FormatBorder::Thin);

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, name) in columns().iter().enumerate() {
        let col = col as u16;
        sheet.write_string_with_format(0, col, *name, &header_format)?;
        sheet.set_column_width(col, (name.len() + 2).max(12) as f64)?;
    }

    for (i, record) in table.rows().iter().enumerate() {
        let row = (i + 1) as u32;
        sheet.write_string(row, 0, record.date_string())?;
        sheet.write_string(row, 1, &record.label)?;
        for (j, value) in record.values.iter().enumerate() {
            sheet.write_number(row, (j + 2) as u16, *value)?;
        }
    }
    sheet.set_freeze_panes(1, 0)?;

    Ok(workbook.save_to_buffer()?)
}
