use std::fmt::Write as _;

use colsum_core::AggregationResult;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

/// Plain-text table of the result rows. Sums are shown with two decimals.
pub fn render_table(result: &AggregationResult) -> String {
    let mut header = Vec::with_capacity(4);
    let mut align = Vec::with_capacity(4);
    if result.is_grouped() {
        header.push("Group".to_string());
        align.push(Align::Left);
    }
    header.extend(["Column", "Sum", "Valid values"].map(String::from));
    align.extend([Align::Left, Align::Right, Align::Right]);

    let body = result
        .rows()
        .iter()
        .map(|row| {
            let mut cells = Vec::with_capacity(header.len());
            if result.is_grouped() {
                cells.push(row.group.to_string());
            }
            cells.push(row.column.clone());
            cells.push(format!("{:.2}", row.sum));
            cells.push(row.valid_count.to_string());
            cells
        })
        .collect::<Vec<_>>();

    layout(&header, &align, &body)
}

/// Groups down, target columns across, sums in the cells.
///
/// Ungrouped results render as a single row.
pub fn render_pivot(result: &AggregationResult) -> String {
    let mut columns: Vec<&str> = Vec::new();
    for row in result.rows() {
        if !columns.contains(&row.column.as_str()) {
            columns.push(row.column.as_str());
        }
    }

    let mut header = vec![result.group_column().unwrap_or_default().to_string()];
    header.extend(columns.iter().map(|c| c.to_string()));
    let mut align = vec![Align::Left];
    align.extend(columns.iter().map(|_| Align::Right));

    let body = result
        .groups()
        .into_iter()
        .map(|group| {
            let mut cells = vec![group.to_string()];
            for column in &columns {
                cells.push(
                    result
                        .get(group, column)
                        .map(|r| format!("{:.2}", r.sum))
                        .unwrap_or_default(),
                );
            }
            cells
        })
        .collect::<Vec<_>>();

    layout(&header, &align, &body)
}

fn layout(header: &[String], align: &[Align], body: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in body {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    write_line(&mut out, header, align, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    write_line(&mut out, &rule, align, &widths);
    for row in body {
        write_line(&mut out, row, align, &widths);
    }
    out
}

fn write_line(out: &mut String, cells: &[String], align: &[Align], widths: &[usize]) {
    let mut line = String::new();
    for (idx, ((cell, align), width)) in cells.iter().zip(align).zip(widths).enumerate() {
        if idx > 0 {
            line.push_str("  ");
        }
        // `{:<w$}` pads by chars, which matches `chars().count()` above.
        let _ = match align {
            Align::Left => write!(line, "{cell:<width$}"),
            Align::Right => write!(line, "{cell:>width$}"),
        };
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use colsum_core::{
        aggregate, AggregationConfig, CellValue, InMemorySource, LocaleOptions, NoProgress,
        RowBatch,
    };
    use pretty_assertions::assert_eq;

    fn sales(config: AggregationConfig) -> AggregationResult {
        let batch = RowBatch::from_columns([
            (
                "categoria",
                vec![
                    CellValue::from("Frutta"),
                    CellValue::from("Frutta"),
                    CellValue::from("Verdura"),
                ],
            ),
            (
                "quantita",
                vec![
                    CellValue::from(10.0),
                    CellValue::from(15.0),
                    CellValue::from(12.0),
                ],
            ),
            (
                "prezzo",
                vec![
                    CellValue::from(2.5),
                    CellValue::from("n/d"),
                    CellValue::from(1.25),
                ],
            ),
        ]);
        aggregate(
            InMemorySource::new([batch]),
            &config,
            &LocaleOptions::default(),
            NoProgress,
        )
        .unwrap()
    }

    #[test]
    fn grouped_table() {
        let result =
            sales(AggregationConfig::new(["quantita", "prezzo"]).with_group_column("categoria"));
        assert_eq!(
            render_table(&result),
            "\
Group    Column      Sum  Valid values
-------  --------  -----  ------------
Frutta   quantita  25.00             2
Frutta   prezzo     2.50             1
Verdura  quantita  12.00             1
Verdura  prezzo     1.25             1
"
        );
    }

    #[test]
    fn ungrouped_table() {
        let result = sales(AggregationConfig::new(["quantita"]));
        assert_eq!(
            render_table(&result),
            "\
Column      Sum  Valid values
--------  -----  ------------
quantita  37.00             3
"
        );
    }

    #[test]
    fn pivot_puts_targets_across() {
        let result =
            sales(AggregationConfig::new(["quantita", "prezzo"]).with_group_column("categoria"));
        assert_eq!(
            render_pivot(&result),
            "\
categoria  quantita  prezzo
---------  --------  ------
Frutta        25.00    2.50
Verdura       12.00    1.25
"
        );
    }
}
