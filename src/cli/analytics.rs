//! Analytics commands: request/token usage and cost breakdowns

use chrono::NaiveDate;
use clap::{Args, Subcommand};

use super::context::{finish, AppContext, CliError};
use super::render::{bold, format_number, paint, render_progress_bar, OutputArgs, Table, GREEN};
use crate::core::{check_date_range, format_money, AnalyticsRange, CostAnalytics, SessionScope, UsageAnalytics};

/// Arguments for the analytics command
#[derive(Args, Debug)]
pub struct AnalyticsArgs {
    #[command(subcommand)]
    pub command: AnalyticsCommand,
}

#[derive(Subcommand, Debug)]
pub enum AnalyticsCommand {
    /// Request and token usage of a subscription
    Usage {
        /// Subscription key
        key: String,
        #[command(flatten)]
        range: RangeArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Cost breakdown of a subscription
    Costs {
        /// Subscription key
        key: String,
        #[command(flatten)]
        range: RangeArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
}

/// Optional date window
#[derive(Args, Debug, Clone, Default)]
pub struct RangeArgs {
    /// First day to include (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,
    /// Last day to include (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,
}

impl RangeArgs {
    pub fn range(&self) -> anyhow::Result<AnalyticsRange> {
        if let (Some(start), Some(end)) = (self.from, self.to) {
            check_date_range(start, end).map_err(|e| CliError::InvalidArgument(e.to_string()))?;
        }
        Ok(AnalyticsRange::new(self.from, self.to))
    }
}

/// Run the analytics command
pub async fn run(ctx: &AppContext, args: AnalyticsArgs) -> anyhow::Result<()> {
    let api = ctx.admin()?;
    ctx.require_session(api.client(), SessionScope::Admin).await?;

    let result = match args.command {
        AnalyticsCommand::Usage { key, range, output } => {
            let usage = api.usage_analytics(&key, range.range()?).await?;
            print_usage(ctx, &usage, &output)
        }
        AnalyticsCommand::Costs { key, range, output } => {
            let costs = api.cost_analytics(&key, range.range()?).await?;
            print_costs(ctx, &costs, &output)
        }
    };
    finish(api.client(), result).await
}

pub fn print_usage(ctx: &AppContext, usage: &UsageAnalytics, output: &OutputArgs) -> anyhow::Result<()> {
    if output.is_json() {
        return output.print_json(usage);
    }
    println!("{}", render_usage(usage, ctx.use_color));
    Ok(())
}

pub fn render_usage(usage: &UsageAnalytics, use_color: bool) -> String {
    let mut lines = Vec::new();
    let title = if usage.subscription_key.is_empty() {
        "Usage".to_string()
    } else {
        format!("Usage for {}", usage.subscription_key)
    };
    lines.push(bold(&title, use_color));

    match usage.usage_percent() {
        Some(percent) => lines.push(format!(
            "  Requests: {} {:.0}% used ({} of {})",
            render_progress_bar(percent, 20, use_color),
            percent,
            format_number(usage.requests),
            format_number(usage.request_limit)
        )),
        None => lines.push(format!("  Requests: {}", format_number(usage.requests))),
    }
    lines.push(format!(
        "  Tokens:   {} input, {} output, {} total",
        format_number(usage.input_tokens),
        format_number(usage.output_tokens),
        format_number(usage.total_tokens())
    ));

    if !usage.by_feature.is_empty() {
        lines.push(String::new());
        let mut table = Table::new(&["FEATURE", "REQUESTS", "INPUT", "OUTPUT"]);
        for (feature, counts) in &usage.by_feature {
            table.row(vec![
                feature.clone(),
                format_number(counts.requests),
                format_number(counts.input_tokens),
                format_number(counts.output_tokens),
            ]);
        }
        lines.push(table.render());
    }

    if !usage.daily.is_empty() {
        lines.push(String::new());
        let mut table = Table::new(&["DATE", "REQUESTS", "TOKENS"]);
        for day in &usage.daily {
            table.row(vec![
                day.date.clone(),
                format_number(day.counts.requests),
                format_number(day.counts.total_tokens()),
            ]);
        }
        lines.push(table.render());
    }

    lines.join("\n")
}

pub fn print_costs(ctx: &AppContext, costs: &CostAnalytics, output: &OutputArgs) -> anyhow::Result<()> {
    if output.is_json() {
        return output.print_json(costs);
    }
    println!("{}", render_costs(costs, ctx.use_color));
    Ok(())
}

pub fn render_costs(costs: &CostAnalytics, use_color: bool) -> String {
    let mut lines = Vec::new();
    let title = if costs.subscription_key.is_empty() {
        "Costs".to_string()
    } else {
        format!("Costs for {}", costs.subscription_key)
    };
    lines.push(bold(&title, use_color));
    lines.push(format!("  Total:    {}", paint(&costs.format_total(), GREEN, use_color)));

    for (label, map) in [("By model:", &costs.by_model), ("By feature:", &costs.by_feature)] {
        if map.is_empty() {
            continue;
        }
        lines.push(format!("  {}", label));
        for (name, cost) in CostAnalytics::ranked(map) {
            lines.push(format!("    {}: {}", name, format_money(cost, &costs.currency)));
        }
    }

    if !costs.daily.is_empty() {
        lines.push("  Daily:".to_string());
        for day in &costs.daily {
            lines.push(format!("    {}: {}", day.date, format_money(day.cost, &costs.currency)));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverted_range_is_rejected() {
        let args = RangeArgs {
            from: NaiveDate::from_ymd_opt(2026, 2, 1),
            to: NaiveDate::from_ymd_opt(2026, 1, 1),
        };
        let err = args.range().unwrap_err();
        assert!(err.downcast_ref::<CliError>().is_some());

        assert_eq!(RangeArgs::default().range().unwrap(), AnalyticsRange::default());
    }

    #[test]
    fn test_render_usage() {
        let usage: UsageAnalytics = serde_json::from_str(
            r#"{"subscription_key":"sk_1","total_requests":1500,"request_limit":2000,
                "input_tokens":120000,"output_tokens":30000,
                "by_feature":{"chat":{"requests":1500,"input_tokens":120000,"output_tokens":30000}}}"#,
        )
        .unwrap();
        let text = render_usage(&usage, false);
        assert!(text.starts_with("Usage for sk_1"));
        assert!(text.contains("75% used (1,500 of 2,000)"));
        assert!(text.contains("150,000 total"));
        assert!(text.contains("chat"));
    }

    #[test]
    fn test_render_costs_ranks_models() {
        let costs: CostAnalytics = serde_json::from_str(
            r#"{"total_cost":3.5,"by_model":{"gpt-4o-mini":0.5,"gpt-4o":3.0}}"#,
        )
        .unwrap();
        let text = render_costs(&costs, false);
        let gpt4o = text.find("gpt-4o: $3.00").unwrap();
        let mini = text.find("gpt-4o-mini: $0.50").unwrap();
        assert!(gpt4o < mini);
        assert!(text.contains("Total:    $3.50"));
    }
}
