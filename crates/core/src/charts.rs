//! Chart-to-range resolution.
//!
//! Each series in a chart names its source cells with formula references
//! such as `Data!$B$2:$B$5`. The workbook is read with `umya-spreadsheet`,
//! which already follows the sheet -> drawing -> chart relationships.

use crate::error::{ExportError, Result};
use crate::range::CellRange;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};
use umya_spreadsheet::drawing::charts::{AreaChartSeries, ChartText, PlotArea};
use umya_spreadsheet::{Spreadsheet, Worksheet};

/// Key used for charts without a title.
pub const UNNAMED_CHART: &str = "Unnamed Chart";

/// Chart title to the rectangles its series read from, in series order.
pub type ChartRanges = BTreeMap<String, Vec<CellRange>>;

/// Collect the source rectangles of every chart anchored on `sheet_name`.
///
/// A sheet without charts yields an empty map.
pub fn resolve_chart_ranges(source: &Path, sheet_name: &str) -> Result<ChartRanges> {
    let book = umya_spreadsheet::reader::xlsx::read(source)?;
    let sheet = book
        .get_sheet_by_name(sheet_name)
        .ok_or_else(|| ExportError::SheetNotFound(sheet_name.to_string()))?;
    Ok(collect_chart_ranges(&book, sheet))
}

fn collect_chart_ranges(book: &Spreadsheet, sheet: &Worksheet) -> ChartRanges {
    let mut charts = ChartRanges::new();

    for (index, chart) in sheet.get_chart_collection().iter().enumerate() {
        let Some(frame) = chart.get_two_cell_anchor().get_graphic_frame() else {
            warn!("Chart {} on '{}' has no graphic frame", index, sheet.get_name());
            continue;
        };
        let definition = frame.get_graphic().get_graphic_data().get_chart_space().get_chart();

        let title = definition
            .get_title()
            .and_then(|t| t.get_chart_text())
            .and_then(|text| title_text(book, sheet, text))
            .unwrap_or_else(|| UNNAMED_CHART.to_string());

        let mut ranges = Vec::new();
        for reference in plot_series(definition.get_plot_area())
            .into_iter()
            .flat_map(series_references)
        {
            for area in split_areas(&reference) {
                match CellRange::parse_qualified(area) {
                    Ok(range) => ranges.push(range),
                    Err(_) => warn!(
                        "Skipping series reference '{}' in chart '{}'",
                        area, title
                    ),
                }
            }
        }

        debug!(
            "Chart '{}' (#{} on '{}') reads {} ranges",
            title,
            index,
            sheet.get_name(),
            ranges.len()
        );
        if let Some(previous) = charts.insert(title.clone(), ranges) {
            debug!(
                "Chart title '{}' repeats on '{}', replacing {} earlier ranges",
                title,
                sheet.get_name(),
                previous.len()
            );
        }
    }

    charts
}

/// Literal runs win; a cell-backed title is looked up in the workbook
/// since the reader keeps no string cache.
fn title_text(book: &Spreadsheet, sheet: &Worksheet, text: &ChartText) -> Option<String> {
    if let Some(rich) = text.get_rich_text() {
        let runs: String = rich
            .get_paragraph()
            .iter()
            .flat_map(|p| p.get_run())
            .map(|r| r.get_text())
            .collect();
        let runs = runs.trim();
        if !runs.is_empty() {
            return Some(runs.to_string());
        }
    }

    let formula = text.get_string_reference()?.get_formula();
    let (col, row) = CellRange::parse_qualified(&formula.get_address_str())
        .ok()
        .map(|cell| (cell.min_col, cell.min_row))?;
    let owner = match formula.get_address().get_sheet_name() {
        "" => Some(sheet),
        name => book.get_sheet_by_name(name),
    }?;
    let value = owner.get_value((col, row));
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Series of every chart type in the plot area, in plot-area order.
fn plot_series(plot_area: &PlotArea) -> Vec<&AreaChartSeries> {
    let lists = [
        plot_area.get_bar_chart().map(|c| c.get_area_chart_series_list()),
        plot_area.get_bar_3d_chart().map(|c| c.get_area_chart_series_list()),
        plot_area.get_line_chart().map(|c| c.get_area_chart_series_list()),
        plot_area.get_line_3d_chart().map(|c| c.get_area_chart_series_list()),
        plot_area.get_area_chart().map(|c| c.get_area_chart_series_list()),
        plot_area.get_area_3d_chart().map(|c| c.get_area_chart_series_list()),
        plot_area.get_pie_chart().map(|c| c.get_area_chart_series_list()),
        plot_area.get_pie_3d_chart().map(|c| c.get_area_chart_series_list()),
        plot_area.get_of_pie_chart().map(|c| c.get_area_chart_series_list()),
        plot_area.get_doughnut_chart().map(|c| c.get_area_chart_series_list()),
        plot_area.get_scatter_chart().map(|c| c.get_area_chart_series_list()),
        plot_area.get_bubble_chart().map(|c| c.get_area_chart_series_list()),
        plot_area.get_radar_chart().map(|c| c.get_area_chart_series_list()),
    ];
    lists
        .into_iter()
        .flatten()
        .flat_map(|list| list.get_area_chart_series())
        .collect()
}

/// A series' values reference, then its categories reference.
fn series_references(series: &AreaChartSeries) -> Vec<String> {
    let values = series
        .get_values()
        .map(|v| v.get_number_reference().get_formula())
        .or_else(|| {
            series
                .get_y_values()
                .map(|v| v.get_number_reference().get_formula())
        });
    let categories = series
        .get_category_axis_data()
        .and_then(|cat| {
            cat.get_string_reference()
                .map(|r| r.get_formula())
                .or_else(|| cat.get_number_reference().map(|r| r.get_formula()))
        })
        .or_else(|| {
            series
                .get_x_values()
                .map(|v| v.get_number_reference().get_formula())
        });

    [values, categories]
        .into_iter()
        .flatten()
        .map(|f| f.get_address_str().trim().to_string())
        .filter(|r| !r.is_empty())
        .collect()
}

/// Split a multi-area reference `(A!$A$1:$A$3,A!$C$1:$C$3)` into its areas.
///
/// Commas inside quoted sheet names do not split.
fn split_areas(reference: &str) -> Vec<&str> {
    let trimmed = reference.trim();
    let inner = trimmed
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .unwrap_or(trimmed);

    let mut areas = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (idx, ch) in inner.char_indices() {
        match ch {
            '\'' => quoted = !quoted,
            ',' if !quoted => {
                areas.push(inner[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    areas.push(inner[start..].trim());
    areas.retain(|a| !a.is_empty());
    areas
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::{Chart, ChartType, Workbook};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn save_with_data(dir: &TempDir, add_charts: impl FnOnce(&mut rust_xlsxwriter::Worksheet)) -> PathBuf {
        let path = dir.path().join("charts.xlsx");
        let mut workbook = Workbook::new();

        let other = workbook.add_worksheet();
        other.set_name("Other Data").unwrap();
        for row in 1..=4u32 {
            other.write_number(row, 2, f64::from(row) * 3.0).unwrap();
        }

        let data = workbook.add_worksheet();
        data.set_name("Data").unwrap();
        data.write_string(0, 1, "Revenue").unwrap();
        for (i, region) in ["North", "South", "East", "West"].into_iter().enumerate() {
            let row = i as u32 + 1;
            data.write_string(row, 0, region).unwrap();
            data.write_number(row, 1, 10.0 * f64::from(row)).unwrap();
            data.write_number(row, 3, 2.5 * f64::from(row)).unwrap();
        }
        add_charts(data);

        workbook.save(&path).unwrap();
        path
    }

    #[test]
    fn test_title_and_series_order() {
        let dir = TempDir::new().unwrap();
        let source = save_with_data(&dir, |sheet| {
            let mut chart = Chart::new(ChartType::Column);
            chart.title().set_name("Quarterly Sales");
            chart
                .add_series()
                .set_categories("Data!$A$2:$A$5")
                .set_values("Data!$B$2:$B$5");
            chart.add_series().set_values("'Other Data'!$C$2:$C$5");
            sheet.insert_chart(6, 4, &chart).unwrap();
        });

        let charts = resolve_chart_ranges(&source, "Data").unwrap();
        assert_eq!(
            charts.get("Quarterly Sales").unwrap(),
            &vec![
                CellRange::parse("B2:B5").unwrap(),
                CellRange::parse("A2:A5").unwrap(),
                CellRange::parse("C2:C5").unwrap(),
            ]
        );
    }

    #[test]
    fn test_untitled_chart_and_other_sheets() {
        let dir = TempDir::new().unwrap();
        let source = save_with_data(&dir, |sheet| {
            let mut chart = Chart::new(ChartType::Line);
            chart.add_series().set_values("Data!$D$2:$D$5");
            sheet.insert_chart(6, 4, &chart).unwrap();
        });

        let charts = resolve_chart_ranges(&source, "Data").unwrap();
        assert_eq!(
            charts.get(UNNAMED_CHART).unwrap(),
            &vec![CellRange::parse("D2:D5").unwrap()]
        );
        assert!(resolve_chart_ranges(&source, "Other Data")
            .unwrap()
            .is_empty());
        assert!(matches!(
            resolve_chart_ranges(&source, "Missing"),
            Err(ExportError::SheetNotFound(name)) if name == "Missing"
        ));
    }

    #[test]
    fn test_title_from_cell_reference() {
        let dir = TempDir::new().unwrap();
        let source = save_with_data(&dir, |sheet| {
            let mut chart = Chart::new(ChartType::Bar);
            chart.title().set_name("=Data!$B$1");
            chart.add_series().set_values("Data!$B$2:$B$5");
            sheet.insert_chart(6, 4, &chart).unwrap();
        });

        let charts = resolve_chart_ranges(&source, "Data").unwrap();
        assert!(charts.contains_key("Revenue"), "{charts:?}");
    }

    #[test]
    fn test_scatter_series_values_before_x_values() {
        let dir = TempDir::new().unwrap();
        let source = save_with_data(&dir, |sheet| {
            let mut chart = Chart::new(ChartType::Scatter);
            chart.title().set_name("Spread");
            chart
                .add_series()
                .set_categories("Data!$B$2:$B$5")
                .set_values("Data!$D$2:$D$5");
            sheet.insert_chart(6, 4, &chart).unwrap();
        });

        let charts = resolve_chart_ranges(&source, "Data").unwrap();
        assert_eq!(
            charts.get("Spread").unwrap(),
            &vec![
                CellRange::parse("D2:D5").unwrap(),
                CellRange::parse("B2:B5").unwrap(),
            ]
        );
    }

    #[test]
    fn test_repeated_title_keeps_later_chart() {
        let dir = TempDir::new().unwrap();
        let source = save_with_data(&dir, |sheet| {
            for (row, values) in [(6, "Data!$B$2:$B$5"), (24, "Data!$D$2:$D$5")] {
                let mut chart = Chart::new(ChartType::Pie);
                chart.title().set_name("Share");
                chart.add_series().set_values(values);
                sheet.insert_chart(row, 4, &chart).unwrap();
            }
        });

        let charts = resolve_chart_ranges(&source, "Data").unwrap();
        assert_eq!(charts.len(), 1);
        assert_eq!(
            charts.get("Share").unwrap(),
            &vec![CellRange::parse("D2:D5").unwrap()]
        );
    }

    #[test]
    fn test_split_areas() {
        assert_eq!(split_areas("Data!$A$1:$A$3"), vec!["Data!$A$1:$A$3"]);
        assert_eq!(
            split_areas("(Data!$A$1:$A$3,Data!$C$1:$C$3)"),
            vec!["Data!$A$1:$A$3", "Data!$C$1:$C$3"]
        );
        assert_eq!(
            split_areas("('North, South'!$A$1:$A$3, 'North, South'!$C$1)"),
            vec!["'North, South'!$A$1:$A$3", "'North, South'!$C$1"]
        );
    }
}
