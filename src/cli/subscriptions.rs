//! Subscription commands (admin scope) and the tier template listing

use chrono::{Local, NaiveDate};
use clap::{Args, Subcommand};
use serde::Serialize;

use super::context::{finish, AppContext, CliError};
use super::render::{
    bold, format_date, format_number, paint, render_progress_bar, OutputArgs, Table, GRAY,
    GREEN, RED, YELLOW,
};
use crate::api::AdminApi;
use crate::core::{
    FailurePolicy, ListController, LlmConfigInput, LoadOutcome, SessionScope, Subscription,
    SubscriptionDraft, SubscriptionStatus, SubscriptionUpdate, TierTemplate,
};

/// Arguments for the subs command
#[derive(Args, Debug)]
pub struct SubsArgs {
    #[command(subcommand)]
    pub command: SubsCommand,
}

#[derive(Subcommand, Debug)]
pub enum SubsCommand {
    /// List subscriptions, one page at a time
    List(ListArgs),
    /// Show one subscription
    Show {
        /// Subscription key
        key: String,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Create a subscription
    Create(CreateArgs),
    /// Change fields of a subscription
    Edit(EditArgs),
    /// Deactivate a subscription (keeps the record)
    Deactivate {
        /// Subscription key
        key: String,
    },
    /// Reactivate a subscription, optionally with a new end date
    Reactivate {
        /// Subscription key
        key: String,
        /// New end date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Permanently delete a subscription
    Delete {
        /// Subscription key
        key: String,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Page to show (1-based)
    #[arg(long, default_value = "1")]
    pub page: u32,

    /// Rows per page (defaults to the configured page size, max 100)
    #[arg(long = "page-size")]
    pub page_size: Option<u32>,

    /// Filter by key, email, subdomain, provider, model or tier
    #[arg(short, long)]
    pub search: Option<String>,

    /// Fetch every subscription instead of one page
    #[arg(long, conflicts_with_all = ["page", "search"])]
    pub all: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Main and fallback LLM flags
#[derive(Args, Debug, Clone, Default)]
pub struct LlmArgs {
    /// Main LLM provider (e.g. openai, anthropic)
    #[arg(long)]
    pub provider: Option<String>,
    /// Main LLM model
    #[arg(long)]
    pub model: Option<String>,
    /// Main LLM API key
    #[arg(long = "api-key")]
    pub api_key: Option<String>,
    /// Main LLM endpoint override
    #[arg(long)]
    pub endpoint: Option<String>,
    /// Main LLM input price per million tokens
    #[arg(long = "input-price")]
    pub input_price: Option<f64>,
    /// Main LLM output price per million tokens
    #[arg(long = "output-price")]
    pub output_price: Option<f64>,
    /// Fallback LLM provider
    #[arg(long = "fallback-provider")]
    pub fallback_provider: Option<String>,
    /// Fallback LLM model
    #[arg(long = "fallback-model")]
    pub fallback_model: Option<String>,
    /// Fallback LLM API key
    #[arg(long = "fallback-api-key")]
    pub fallback_api_key: Option<String>,
}

impl LlmArgs {
    fn touches_main(&self) -> bool {
        self.provider.is_some()
            || self.model.is_some()
            || self.api_key.is_some()
            || self.endpoint.is_some()
            || self.input_price.is_some()
            || self.output_price.is_some()
    }

    fn touches_fallback(&self) -> bool {
        self.fallback_provider.is_some() || self.fallback_model.is_some() || self.fallback_api_key.is_some()
    }

    /// Apply the main LLM flags over `base`
    pub fn main_over(&self, base: LlmConfigInput) -> LlmConfigInput {
        let mut input = base;
        if let Some(provider) = &self.provider {
            input.provider = provider.clone();
        }
        if let Some(model) = &self.model {
            input.model = model.clone();
        }
        if let Some(endpoint) = &self.endpoint {
            input = input.with_endpoint(endpoint.clone());
        }
        if let Some(price) = self.input_price {
            input.input_price_per_million = price;
        }
        if let Some(price) = self.output_price {
            input.output_price_per_million = price;
        }
        if let Some(key) = &self.api_key {
            input = input.with_api_key(key.clone());
        }
        input
    }

    /// Apply the fallback LLM flags over `base`
    pub fn fallback_over(&self, base: LlmConfigInput) -> LlmConfigInput {
        let mut input = base;
        if let Some(provider) = &self.fallback_provider {
            input.provider = provider.clone();
        }
        if let Some(model) = &self.fallback_model {
            input.model = model.clone();
        }
        if let Some(key) = &self.fallback_api_key {
            input = input.with_api_key(key.clone());
        }
        input
    }

    /// Main LLM built only from flags, when any were given
    pub fn main_input(&self) -> Option<LlmConfigInput> {
        self.touches_main().then(|| self.main_over(LlmConfigInput::default()))
    }

    pub fn fallback_input(&self) -> Option<LlmConfigInput> {
        self.touches_fallback()
            .then(|| self.fallback_over(LlmConfigInput::default()))
    }
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Customer email
    #[arg(long)]
    pub email: String,
    /// Customer subdomain
    #[arg(long)]
    pub subdomain: String,
    /// Tier template supplying defaults (starter, professional, enterprise)
    #[arg(long)]
    pub tier: Option<TierTemplate>,
    /// Start date (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    pub start: Option<NaiveDate>,
    /// End date (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<NaiveDate>,
    /// Request limit
    #[arg(long)]
    pub limit: Option<u64>,
    #[command(flatten)]
    pub llm: LlmArgs,
    #[command(flatten)]
    pub output: OutputArgs,
}

impl CreateArgs {
    fn into_draft(self) -> SubscriptionDraft {
        let main_llm = match self.tier {
            // Flags refine the tier's preset rather than replace it wholesale
            Some(tier) if self.llm.touches_main() => Some(self.llm.main_over(tier.main_llm().to_input())),
            _ => self.llm.main_input(),
        };
        let fallback_llm = match self.tier.and_then(|t| t.fallback_llm()) {
            Some(preset) if self.llm.touches_fallback() => Some(self.llm.fallback_over(preset.to_input())),
            _ => self.llm.fallback_input(),
        };
        SubscriptionDraft {
            customer_email: self.email,
            subdomain: self.subdomain,
            start_date: self.start,
            end_date: self.end,
            request_limit: self.limit,
            main_llm,
            fallback_llm,
            tier: self.tier,
        }
    }
}

#[derive(Args, Debug)]
pub struct EditArgs {
    /// Subscription key
    pub key: String,
    /// New customer email
    #[arg(long)]
    pub email: Option<String>,
    /// New subdomain
    #[arg(long)]
    pub subdomain: Option<String>,
    /// New start date (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<NaiveDate>,
    /// New end date (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<NaiveDate>,
    /// New request limit
    #[arg(long)]
    pub limit: Option<u64>,
    #[command(flatten)]
    pub llm: LlmArgs,
    #[command(flatten)]
    pub output: OutputArgs,
}

/// Run the subs command
pub async fn run(ctx: &AppContext, args: SubsArgs) -> anyhow::Result<()> {
    let api = ctx.admin()?;
    ctx.require_session(api.client(), SessionScope::Admin).await?;

    let result = match args.command {
        SubsCommand::List(list) => list_subscriptions(ctx, &api, list).await,
        SubsCommand::Show { key, output } => {
            let sub = api.get_subscription(&key).await?;
            print_subscription(ctx, &sub, &output)
        }
        SubsCommand::Create(create) => create_subscription(ctx, &api, create).await,
        SubsCommand::Edit(edit) => edit_subscription(ctx, &api, edit).await,
        SubsCommand::Deactivate { key } => {
            api.deactivate_subscription(&key).await?;
            println!("Deactivated subscription {}.", key);
            Ok(())
        }
        SubsCommand::Reactivate { key, end } => {
            let sub = api.reactivate_subscription(&key, end).await?;
            println!(
                "Reactivated subscription {} (ends {}).",
                key,
                format_date(sub.end_date.or(end))
            );
            Ok(())
        }
        SubsCommand::Delete { key, yes } => {
            if !yes {
                return Err(CliError::ConfirmationRequired(key).into());
            }
            api.delete_subscription(&key).await?;
            println!("Deleted subscription {}.", key);
            Ok(())
        }
    };
    finish(api.client(), result).await
}

#[derive(Serialize)]
struct ListPayload<'a> {
    page: u32,
    page_size: u32,
    total: u64,
    total_pages: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<&'a str>,
    items: &'a [Subscription],
}

async fn list_subscriptions(ctx: &AppContext, api: &AdminApi, args: ListArgs) -> anyhow::Result<()> {
    if args.all {
        let all = api.list_all_subscriptions().await?;
        if args.output.is_json() {
            return args.output.print_json(&all);
        }
        println!("{}", render_table(&all, ctx.use_color));
        println!("\n{} subscription(s)", all.len());
        return Ok(());
    }

    let page_size = args.page_size.unwrap_or(ctx.settings.page_size);
    let mut list = ListController::new(api, page_size, FailurePolicy::RetryPanel);

    let search = args.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    if let Some(term) = search {
        if let LoadOutcome::Failed { error } = list.search(term).await {
            return Err(error.into());
        }
    }
    if search.is_none() || args.page > 1 {
        if let LoadOutcome::Failed { error } = list.load_page(args.page).await {
            return Err(error.into());
        }
    }

    if args.output.is_json() {
        return args.output.print_json(&ListPayload {
            page: list.page(),
            page_size: list.page_size(),
            total: list.total(),
            total_pages: list.total_pages(),
            search: list.search_term(),
            items: list.items(),
        });
    }

    if list.items().is_empty() {
        match list.search_term() {
            Some(term) => println!("No subscriptions match '{}'.", term),
            None => println!("No subscriptions on page {}.", list.page()),
        }
        return Ok(());
    }

    println!("{}", render_table(list.items(), ctx.use_color));
    let mut footer = format!(
        "\nPage {}/{} ({} total)",
        list.page(),
        list.total_pages(),
        format_number(list.total())
    );
    if let Some(term) = list.search_term() {
        footer.push_str(&format!(", matching '{}'", term));
    }
    if list.has_next() {
        footer.push_str(&format!(" - next: --page {}", list.page() + 1));
    }
    println!("{}", footer);
    Ok(())
}

fn status_cell(status: SubscriptionStatus, use_color: bool) -> String {
    let color = match status {
        SubscriptionStatus::Active => GREEN,
        SubscriptionStatus::Exhausted => YELLOW,
        SubscriptionStatus::Expired => RED,
        SubscriptionStatus::Inactive => GRAY,
    };
    paint(status.label(), color, use_color)
}

pub fn render_table(subs: &[Subscription], use_color: bool) -> String {
    let today = Local::now().date_naive();
    let mut table = Table::new(&["KEY", "EMAIL", "SUBDOMAIN", "STATUS", "USAGE", "ENDS", "LLM"]);
    for sub in subs {
        table.row(vec![
            sub.subscription_key.clone(),
            sub.customer_email.clone(),
            sub.subdomain.clone(),
            status_cell(sub.status(today), use_color),
            format!(
                "{} {}/{}",
                render_progress_bar(sub.usage_percent(), 10, use_color),
                format_number(sub.requests_used),
                format_number(sub.request_limit)
            ),
            format_date(sub.end_date),
            sub.main_llm.label(),
        ]);
    }
    table.render()
}

pub fn print_subscription(ctx: &AppContext, sub: &Subscription, output: &OutputArgs) -> anyhow::Result<()> {
    if output.is_json() {
        return output.print_json(sub);
    }
    println!("{}", render_details(sub, ctx.use_color));
    Ok(())
}

pub fn render_details(sub: &Subscription, use_color: bool) -> String {
    let today = Local::now().date_naive();
    let mut lines = vec![bold(&sub.subscription_key, use_color)];
    lines.push(format!("  Email:     {}", sub.customer_email));
    lines.push(format!("  Subdomain: {}", sub.subdomain));
    if let Some(tier) = &sub.tier {
        lines.push(format!("  Tier:      {}", tier));
    }
    lines.push(format!("  Status:    {}", status_cell(sub.status(today), use_color)));
    lines.push(format!(
        "  Period:    {} to {}",
        format_date(sub.start_date),
        format_date(sub.end_date)
    ));
    lines.push(format!(
        "  Requests:  {} {:.0}% used ({} of {}, {} left)",
        render_progress_bar(sub.usage_percent(), 20, use_color),
        sub.usage_percent(),
        format_number(sub.requests_used),
        format_number(sub.request_limit),
        format_number(sub.remaining_requests())
    ));
    lines.push(format!("  Main LLM:  {}", describe_llm(&sub.main_llm)));
    if let Some(fallback) = &sub.fallback_llm {
        lines.push(format!("  Fallback:  {}", describe_llm(fallback)));
    }
    if let Some(created) = sub.created_at {
        lines.push(format!("  Created:   {}", created.format("%Y-%m-%d %H:%M")));
    }
    lines.join("\n")
}

fn describe_llm(config: &crate::core::LlmConfig) -> String {
    let mut text = config.label();
    if config.input_price_per_million > 0.0 || config.output_price_per_million > 0.0 {
        text.push_str(&format!(
            " (${:.2}/${:.2} per 1M tokens)",
            config.input_price_per_million, config.output_price_per_million
        ));
    }
    if config.has_api_key {
        text.push_str(" [key set]");
    }
    text
}

async fn create_subscription(ctx: &AppContext, api: &AdminApi, args: CreateArgs) -> anyhow::Result<()> {
    let output = args.output.clone();
    let today = Local::now().date_naive();
    let form = args.into_draft().into_create(today)?;
    let created = api.generate_subscription(&form).await?;

    if output.is_json() {
        return output.print_json(&created);
    }
    println!("Created subscription {}.", created.subscription_key);
    println!("{}", render_details(&created, ctx.use_color));
    Ok(())
}

async fn edit_subscription(ctx: &AppContext, api: &AdminApi, args: EditArgs) -> anyhow::Result<()> {
    let mut update = SubscriptionUpdate {
        customer_email: args.email,
        subdomain: args.subdomain,
        start_date: args.start,
        end_date: args.end,
        request_limit: args.limit,
        ..Default::default()
    };

    // LLM fields are replaced as a whole, so unspecified ones come from the current record
    if args.llm.touches_main() || args.llm.touches_fallback() {
        let current = api.get_subscription(&args.key).await?;
        if args.llm.touches_main() {
            update.main_llm = Some(args.llm.main_over(LlmConfigInput::from_existing(&current.main_llm)));
        }
        if args.llm.touches_fallback() {
            let base = current
                .fallback_llm
                .as_ref()
                .map(LlmConfigInput::from_existing)
                .unwrap_or_default();
            update.fallback_llm = Some(args.llm.fallback_over(base));
        }
    }

    let updated = api.update_subscription(&args.key, &update).await?;
    if args.output.is_json() {
        return args.output.print_json(&updated);
    }
    println!("Updated subscription {}.", args.key);
    println!("{}", render_details(&updated, ctx.use_color));
    Ok(())
}

// === Tiers ===

/// Arguments for the tiers command
#[derive(Args, Debug)]
pub struct TiersArgs {
    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Serialize)]
struct TierPayload {
    id: &'static str,
    name: &'static str,
    request_limit: u64,
    duration_days: i64,
    main_llm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fallback_llm: Option<String>,
}

fn tier_payloads() -> Vec<TierPayload> {
    TierTemplate::all()
        .iter()
        .map(|tier| TierPayload {
            id: tier.as_str(),
            name: tier.display_name(),
            request_limit: tier.request_limit(),
            duration_days: tier.duration_days(),
            main_llm: format!("{}/{}", tier.main_llm().provider, tier.main_llm().model),
            fallback_llm: tier
                .fallback_llm()
                .map(|p| format!("{}/{}", p.provider, p.model)),
        })
        .collect()
}

/// Run the tiers command
pub async fn run_tiers(args: TiersArgs) -> anyhow::Result<()> {
    let tiers = tier_payloads();
    if args.output.is_json() {
        return args.output.print_json(&tiers);
    }

    let mut table = Table::new(&["TIER", "NAME", "REQUESTS", "DAYS", "MAIN LLM", "FALLBACK"]);
    for tier in &tiers {
        table.row(vec![
            tier.id.to_string(),
            tier.name.to_string(),
            format_number(tier.request_limit),
            tier.duration_days.to_string(),
            tier.main_llm.clone(),
            tier.fallback_llm.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }
    println!("{}", table.render());
    Ok(())
}
