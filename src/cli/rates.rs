use super::ui;
use crate::core::{CurrencyDirectory, ExchangeSnapshot};
use crate::repository::RateRepository;
use anyhow::{Context, Result};
use comfy_table::Cell;
use tracing::debug;

/// Renders a snapshot as a table, optionally keeping only codes containing
/// `filter`.
pub fn render_rates(
    snapshot: &ExchangeSnapshot,
    directory: Option<&CurrencyDirectory>,
    filter: Option<&str>,
) -> String {
    let filter = filter.map(|f| f.trim().to_ascii_uppercase());
    let base = snapshot.base_currency();

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Base"),
        ui::header_cell("Currency"),
        ui::header_cell("Name"),
        ui::header_cell("Rate"),
    ]);

    let mut shown = 0;
    for (code, rate) in snapshot.rates() {
        if let Some(filter) = &filter
            && !code.contains(filter.as_str())
        {
            continue;
        }
        let name = directory.and_then(|d| d.name(code)).unwrap_or("");
        table.add_row(vec![
            Cell::new(base),
            Cell::new(code),
            Cell::new(name),
            ui::number_cell(*rate, ui::rate_decimals(*rate)),
        ]);
        shown += 1;
    }

    let mut output = format!(
        "Exchange rates for {}\n\n",
        ui::style_text(base, ui::StyleType::Title)
    );
    if shown == 0 {
        output.push_str(&ui::style_text("No matching currencies", ui::StyleType::Subtle));
    } else {
        output.push_str(&table.to_string());
    }
    output
}

pub async fn run(repository: &RateRepository, base: &str, filter: Option<&str>) -> Result<()> {
    let pb = ui::new_spinner(&format!("Loading rates for {base}..."));
    let snapshot = repository.get_rate(base).await;
    // Names are a nicety; the table still renders without them
    let directory = match repository.get_currency_directory().await {
        Ok(directory) => Some(directory),
        Err(e) => {
            debug!(error = %e, "Currency names unavailable");
            None
        }
    };
    pb.finish_and_clear();

    let snapshot = snapshot.with_context(|| {
        format!("No cached rates for {base} and the rate provider could not be reached")
    })?;
    println!("{}", render_rates(&snapshot, directory.as_ref(), filter));
    Ok(())
}
