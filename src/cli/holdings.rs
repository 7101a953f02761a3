use super::ui;
use crate::core::config::AppConfig;
use crate::core::holdings::build_holdings;
use crate::core::{
    HoldingsReport, MergeKey, NormalizedHolding, TokenProvider, ToplineRow, WalletSnapshot,
};
use crate::store::report::ReportCache;
use anyhow::Result;
use comfy_table::Cell;
use indicatif::ProgressBar;
use tracing::warn;

/// Error shown to the user when the report cannot be built at all.
pub const BUILD_FAILURE: &str = "failed_to_build_holdings";

#[derive(Debug, Clone, Default)]
pub struct HoldingsOptions {
    /// Print the report as JSON instead of tables
    pub json: bool,
    /// Hide rows worth less than this many USD
    pub min_usd: f64,
    /// Limit the topline to this many rows
    pub top: Option<usize>,
    /// Skip the report cache
    pub no_cache: bool,
}

fn token_label(symbol: &str, token_id: &str) -> String {
    if symbol.is_empty() {
        token_id.to_string()
    } else {
        symbol.to_string()
    }
}

fn visible(value_usd: f64, min_usd: f64) -> bool {
    min_usd <= 0.0 || value_usd >= min_usd
}

impl WalletSnapshot {
    pub fn display_as_table(&self, min_usd: f64, merge_key: MergeKey) -> String {
        let mut chains = ui::new_styled_table();
        chains.set_header(vec![
            ui::header_cell("Chain"),
            ui::header_cell("Tokens"),
            ui::header_cell("Value (USD)"),
            ui::header_cell("Status"),
        ]);
        for summary in &self.chains {
            chains.add_row(vec![
                Cell::new(&summary.chain),
                ui::number_cell(summary.token_count as f64, 0),
                ui::usd_cell(summary.usd_value),
                ui::status_cell(summary.error.as_deref()),
            ]);
        }

        let mut tokens = ui::new_styled_table();
        tokens.set_header(vec![
            ui::header_cell("Token"),
            ui::header_cell("Chain"),
            ui::header_cell("Amount"),
            ui::header_cell("Price (USD)"),
            ui::header_cell("Value (USD)"),
        ]);
        let shown: Vec<&NormalizedHolding> = self
            .tokens_flat
            .iter()
            .filter(|h| visible(h.value_usd, min_usd))
            .collect();
        for holding in &shown {
            tokens.add_row(vec![
                Cell::new(token_label(&holding.symbol, &holding.token_id)),
                Cell::new(self.chains_of(holding, merge_key).join(", ")),
                ui::number_cell(holding.amount, 4),
                ui::format_optional_cell(
                    (holding.price_usd > 0.0).then_some(holding.price_usd),
                    |p| format!("{p:.4}"),
                ),
                ui::usd_cell(holding.value_usd),
            ]);
        }

        let mut output = format!(
            "Wallet: {}\n\n",
            ui::style_text(&self.wallet, ui::StyleType::Title)
        );
        output.push_str(&chains.to_string());
        output.push_str("\n\n");
        output.push_str(&tokens.to_string());

        let hidden = self.tokens_flat.len() - shown.len();
        if hidden > 0 {
            output.push_str(&format!(
                "\n{}",
                ui::style_text(
                    &format!("{hidden} holdings under {min_usd:.2} USD hidden"),
                    ui::StyleType::Subtle
                )
            ));
        }

        output.push_str(&format!(
            "\n\nTotal Value ({}): {}",
            ui::style_text("USD", ui::StyleType::TotalLabel),
            ui::style_text(
                &format!("{:.2}", self.total_usd_value),
                ui::StyleType::TotalValue
            )
        ));

        for summary in self.chains.iter().filter(|c| c.error.is_some()) {
            output.push_str(&format!(
                "\n{}",
                ui::style_text(
                    &format!(
                        "{}: {}",
                        summary.chain,
                        summary.error.as_deref().unwrap_or_default()
                    ),
                    ui::StyleType::Error
                )
            ));
        }

        output
    }
}

/// Renders the cross-wallet topline with each row's share of the total.
pub fn topline_as_table(
    rows: &[ToplineRow],
    total: f64,
    min_usd: f64,
    top: Option<usize>,
) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("#"),
        ui::header_cell("Token"),
        ui::header_cell("Chains"),
        ui::header_cell("Sources"),
        ui::header_cell("Amount"),
        ui::header_cell("Value (USD)"),
        ui::header_cell("Share (%)"),
    ]);

    let limit = top.unwrap_or(usize::MAX);
    for (rank, row) in rows
        .iter()
        .filter(|r| visible(r.value_usd, min_usd))
        .take(limit)
        .enumerate()
    {
        table.add_row(vec![
            Cell::new(rank + 1),
            Cell::new(token_label(&row.symbol, &row.token_id)),
            Cell::new(row.chains.join(", ")),
            ui::number_cell(row.occurrences as f64, 0),
            ui::number_cell(row.amount, 4),
            ui::usd_cell(row.value_usd),
            ui::format_optional_cell(
                (total > 0.0).then(|| row.value_usd / total * 100.0),
                |w| format!("{w:.2}%"),
            ),
        ]);
    }

    format!(
        "{}\n\n{}",
        ui::style_text("Portfolio Topline", ui::StyleType::Title),
        table
    )
}

fn print_report(report: &HoldingsReport, merge_key: MergeKey, options: &HoldingsOptions) {
    for sum in &report.wallets {
        println!("{}", sum.display_as_table(options.min_usd, merge_key));
        ui::print_separator();
    }

    let total = report.total_usd_value();
    println!(
        "{}",
        topline_as_table(&report.portfolio_topline, total, options.min_usd, options.top)
    );
    println!(
        "\n{}",
        ui::style_text(
            &format!("Updated at {}", report.updated_at.to_rfc3339()),
            ui::StyleType::Subtle
        )
    );
    ui::print_grand_total("Grand Total (USD)", total);
}

pub async fn run(
    config: &AppConfig,
    provider: &dyn TokenProvider,
    cache: Option<&ReportCache>,
    options: &HoldingsOptions,
) -> Result<()> {
    let tracking = config.tracking();

    let pb = if options.json {
        ProgressBar::hidden()
    } else {
        let pb = ui::new_progress_bar(tracking.pairs().count() as u64, true);
        pb.set_message("Fetching token lists...");
        pb
    };

    let tracking_ref = &tracking;
    let pb_ref = &pb;
    let build = move || async move {
        build_holdings(tracking_ref, provider, &move || pb_ref.inc(1)).await
    };
    let result = match cache {
        Some(cache) => cache.get_or_build(&tracking, build).await,
        None => build().await,
    };
    pb.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            if options.json {
                println!("{}", serde_json::json!({ "error": BUILD_FAILURE }));
            }
            return Err(e.context(BUILD_FAILURE));
        }
    };

    for (wallet, chain, reason) in report.failures() {
        warn!(wallet = %wallet, chain = %chain, "Chain excluded from totals: {}", reason);
    }

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, config.merge_key, options);
    }
    Ok(())
}
