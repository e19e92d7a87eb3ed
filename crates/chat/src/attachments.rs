use std::sync::OnceLock;

use regex::Regex;

const LISTED_NUMERIC_COLUMNS: usize = 6;
const AGGREGATED_COLUMNS: usize = 3;
const LISTED_DATE_COLUMNS: usize = 3;

fn date_column() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)date|time|дата|время").expect("valid date column regex"))
}

fn grouped_number() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^-?\d{1,3}(,\d{3})+(\.\d+)?$").expect("valid grouped number regex")
    })
}

/// Whether the runner should download a document before dispatching it.
pub fn is_sales_file(file_name: &str) -> bool {
    let lowered = file_name.to_lowercase();
    [".csv", ".xlsx", ".xls"].iter().any(|extension| lowered.ends_with(extension))
}

/// Short plain-text digest of an uploaded sales export.
///
/// CSV gets row and column counts, numeric column totals and means, and date-like columns.
/// Spreadsheets are acknowledged by size only. `None` means the file is unreadable.
pub fn summarize_sales_file(file_name: &str, content: &[u8]) -> Option<String> {
    if file_name.to_lowercase().ends_with(".csv") {
        let text = std::str::from_utf8(content).ok()?;
        summarize_csv(text.trim_start_matches('\u{feff}'))
    } else if content.is_empty() {
        None
    } else {
        Some(format!(
            "Spreadsheet: {file_name}, {} KB\nExport it to CSV for a per-column breakdown.",
            content.len().div_ceil(1024)
        ))
    }
}

fn summarize_csv(text: &str) -> Option<String> {
    let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());
    let header_line = lines.next()?;
    let delimiter = [',', ';', '\t']
        .into_iter()
        .max_by_key(|delimiter| header_line.matches(*delimiter).count())
        .unwrap_or(',');

    let headers: Vec<String> = split_row(header_line, delimiter);
    let rows: Vec<Vec<String>> = lines.map(|line| split_row(line, delimiter)).collect();

    let mut info = vec![format!("Rows: {}", group_thousands(rows.len())), format!("Columns: {}", headers.len())];

    let numeric: Vec<(usize, &String)> = headers
        .iter()
        .enumerate()
        .filter(|(index, _)| is_numeric_column(&rows, *index))
        .collect();
    if !numeric.is_empty() {
        let names: Vec<&str> = numeric
            .iter()
            .take(LISTED_NUMERIC_COLUMNS)
            .map(|(_, name)| name.as_str())
            .collect();
        let ellipsis = if numeric.len() > LISTED_NUMERIC_COLUMNS { " …" } else { "" };
        info.push(format!("Numeric columns: {}{ellipsis}", names.join(", ")));

        for (index, name) in numeric.iter().take(AGGREGATED_COLUMNS) {
            let values: Vec<f64> =
                rows.iter().filter_map(|row| row.get(*index).and_then(|cell| parse_number(cell))).collect();
            let sum: f64 = values.iter().sum();
            let mean = if values.is_empty() { 0.0 } else { sum / values.len() as f64 };
            info.push(format!("Σ {name}: {sum:.2} | μ {name}: {mean:.2}"));
        }
    }

    let dates: Vec<&str> = headers
        .iter()
        .filter(|name| date_column().is_match(name))
        .take(LISTED_DATE_COLUMNS)
        .map(String::as_str)
        .collect();
    if !dates.is_empty() {
        info.push(format!("Date columns: {}", dates.join(", ")));
    }

    Some(info.join("\n"))
}

/// Splits one CSV line, keeping delimiters inside double quotes. `""` is an escaped quote.
fn split_row(line: &str, delimiter: char) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if quoted && chars.peek() == Some(&'"') => {
                cell.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ch if ch == delimiter && !quoted => {
                cells.push(cell.trim().to_owned());
                cell.clear();
            }
            ch => cell.push(ch),
        }
    }
    cells.push(cell.trim().to_owned());
    cells
}

/// Accepts plain numbers, `1,200.50` style grouping and a single decimal comma (`12,5`).
fn parse_number(cell: &str) -> Option<f64> {
    let normalized: String = cell.chars().filter(|ch| !ch.is_whitespace()).collect();
    if let Ok(value) = normalized.parse::<f64>() {
        return Some(value);
    }
    if grouped_number().is_match(&normalized) {
        return normalized.replace(',', "").parse::<f64>().ok();
    }
    if normalized.matches(',').count() == 1 && !normalized.contains('.') {
        return normalized.replace(',', ".").parse::<f64>().ok();
    }
    None
}

fn is_numeric_column(rows: &[Vec<String>], index: usize) -> bool {
    let mut cells = rows.iter().filter_map(|row| row.get(index)).filter(|cell| !cell.is_empty()).peekable();
    cells.peek().is_some() && cells.all(|cell| parse_number(cell).is_some())
}

fn group_thousands(value: usize) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    grouped
}
