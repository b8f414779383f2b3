use std::io::{Cursor, Read, Seek};
use std::path::Path;

use bytes::Bytes;
use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use tracing::instrument;

use crate::models::ProductRecord;
use crate::{AppError, Result};

// Колонки листа (с нуля): A - артикул SAP, D - EAN, E - количество, G - краткий текст материала
const ARTICLE_COL: u32 = 0;
const BARCODE_COL: u32 = 3;
const QUANTITY_COL: u32 = 4;
const DESCRIPTION_COL: u32 = 6;
/// Строки с более коротким штрихкодом пропускаются
pub const MIN_BARCODE_LEN: usize = 8;

/// Приводит штрихкод к виду, в котором он хранится в базе
pub fn normalize_barcode(input: impl AsRef<str>) -> String {
    input.as_ref().replace([' ', '-'], "").trim().to_uppercase()
}

#[instrument(name = "parsing file", skip_all, fields(path = %path.as_ref().display()))]
pub fn parse_file(path: impl AsRef<Path>) -> Result<Vec<ProductRecord>> {
    let mut workbook = open_workbook_auto(path.as_ref())?;
    parse_first_sheet(&mut workbook)
}

#[instrument(name = "parsing upload", skip_all, fields(size = data.len()))]
pub fn parse_bytes(data: Bytes) -> Result<Vec<ProductRecord>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(data))?;
    parse_first_sheet(&mut workbook)
}

fn parse_first_sheet<RS: Read + Seek>(workbook: &mut Sheets<RS>) -> Result<Vec<ProductRecord>> {
    let table = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::parse("в книге нет ни одного листа"))??;
    parse_range(&table)
}

/// Разбирает лист: первая заполненная строка считается заголовком
pub fn parse_range(table: &Range<Data>) -> Result<Vec<ProductRecord>> {
    let (Some(start), Some(end)) = (table.start(), table.end()) else {
        return Ok(Vec::new());
    };
    let mut result = Vec::new();
    for row in (start.0 + 1)..=end.0 {
        let text = |col: u32| {
            table
                .get_value((row, col))
                .map(|d| d.to_string().trim().to_string())
                .unwrap_or_default()
        };
        let raw_barcode = text(BARCODE_COL);
        if raw_barcode.chars().count() < MIN_BARCODE_LEN {
            continue;
        }
        let quantity = quantity(table.get_value((row, QUANTITY_COL)), row + 1)?;
        let item = ProductRecord::builder()
            .article(text(ARTICLE_COL))
            .description(text(DESCRIPTION_COL))
            .barcode(normalize_barcode(&raw_barcode))
            .quantity(quantity)
            .build()
            .map_err(|e| AppError::parse(format!("строка {}: {e}", row + 1)))?;
        result.push(item)
    }
    tracing::debug!("Прочитано {} товаров", result.len());
    Ok(result)
}

fn quantity(cell: Option<&Data>, line: u32) -> Result<i32> {
    match cell {
        None | Some(Data::Empty) => Ok(0),
        Some(Data::Int(i)) => i32::try_from(*i).map_err(|_| invalid_quantity(line, i)),
        Some(Data::Float(f)) => {
            if f.fract() == 0.0 && *f >= i32::MIN as f64 && *f <= i32::MAX as f64 {
                Ok(*f as i32)
            } else {
                Err(invalid_quantity(line, f))
            }
        }
        Some(Data::String(s)) if s.trim().is_empty() => Ok(0),
        Some(Data::String(s)) => s
            .trim()
            .parse::<i32>()
            .map_err(|_| invalid_quantity(line, s)),
        Some(other) => Err(invalid_quantity(line, other)),
    }
}

fn invalid_quantity(line: u32, value: impl std::fmt::Display) -> AppError {
    AppError::parse(format!("строка {line}: некорректное количество '{value}'"))
}
