use super::ui;
use crate::core::TimeSeries;
use crate::core::dates::format_date;
use crate::repository::{RateRepository, TREND_QUOTE_CURRENCY};
use anyhow::{Context, Result};
use comfy_table::Cell;

pub fn render_trend(base: &str, series: &TimeSeries) -> String {
    let mut output = format!(
        "{} trend for {}\n\n",
        ui::style_text(&format!("{base}/{TREND_QUOTE_CURRENCY}"), ui::StyleType::Title),
        ui::style_text(&format!("{} days", series.len()), ui::StyleType::Subtle),
    );

    if series.is_empty() {
        output.push_str(&ui::style_text("No data points", ui::StyleType::Subtle));
        return output;
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Date"), ui::header_cell("Rate")]);
    for (date, rate) in series.iter() {
        table.add_row(vec![
            Cell::new(format_date(*date)),
            ui::number_cell(*rate, ui::rate_decimals(*rate)),
        ]);
    }
    output.push_str(&table.to_string());

    if let (Some(min), Some(max)) = (series.min(), series.max()) {
        output.push_str(&format!(
            "\n\n{} {min:.4}  {} {max:.4}",
            ui::style_text("Low", ui::StyleType::TotalLabel),
            ui::style_text("High", ui::StyleType::TotalLabel),
        ));
    }
    if let Some(change) = series.change_pct() {
        let style_type = if change >= 0.0 {
            ui::StyleType::TotalValue
        } else {
            ui::StyleType::Error
        };
        output.push_str(&format!(
            "  {} {}",
            ui::style_text("Change", ui::StyleType::TotalLabel),
            ui::style_text(&format!("{change:.2}%"), style_type)
        ));
    }
    output
}

pub async fn run(repository: &RateRepository, base: &str, days: u32) -> Result<()> {
    let pb = ui::new_spinner(&format!("Loading {days} day trend for {base}..."));
    let series = repository.get_time_series(base, days).await;
    pb.finish_and_clear();

    let series = series.with_context(|| format!("Failed to load trend for {base}"))?;
    println!("{}", render_trend(&base.to_ascii_uppercase(), &series));
    Ok(())
}
