//! Feature commands: per-feature LLM overrides under a subscription

use clap::{Args, Subcommand};

use super::context::{finish, AppContext};
use super::render::{bold, format_number, paint, OutputArgs, Table, GRAY, GREEN, RED};
use super::subscriptions::LlmArgs;
use crate::core::{FeatureConfig, FeatureUpdate, LlmConfigInput, LlmTestResult, SaveAndTestResult, SessionScope};

/// Arguments for the features command
#[derive(Args, Debug)]
pub struct FeaturesArgs {
    #[command(subcommand)]
    pub command: FeaturesCommand,
}

#[derive(Subcommand, Debug)]
pub enum FeaturesCommand {
    /// List the features of a subscription
    List {
        /// Subscription key
        key: String,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Save a feature's configuration and test its LLMs
    Set {
        /// Subscription key
        key: String,
        /// Feature name
        feature: String,
        #[command(flatten)]
        update: FeatureSetArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
}

/// Flags describing a feature change
#[derive(Args, Debug, Clone, Default)]
pub struct FeatureSetArgs {
    /// Enable the feature
    #[arg(long, conflicts_with = "disable")]
    pub enable: bool,
    /// Disable the feature
    #[arg(long)]
    pub disable: bool,
    /// Use a custom LLM for this feature
    #[arg(long = "custom-llm", conflicts_with = "default_llm")]
    pub custom_llm: bool,
    /// Go back to the subscription's default LLM
    #[arg(long = "default-llm")]
    pub default_llm: bool,
    #[command(flatten)]
    pub llm: LlmArgs,
}

impl FeatureSetArgs {
    /// Build the update; LLM flags are layered over the feature's current override
    pub fn to_update(&self, current: Option<&FeatureConfig>) -> FeatureUpdate {
        let enabled = match (self.enable, self.disable) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        let use_custom_llm = match (self.custom_llm, self.default_llm) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };

        let main_llm = self.llm.main_input().map(|_| {
            let base = current
                .and_then(|f| f.main_llm.as_ref())
                .map(LlmConfigInput::from_existing)
                .unwrap_or_default();
            self.llm.main_over(base)
        });
        let fallback_llm = self.llm.fallback_input().map(|_| {
            let base = current
                .and_then(|f| f.fallback_llm.as_ref())
                .map(LlmConfigInput::from_existing)
                .unwrap_or_default();
            self.llm.fallback_over(base)
        });

        FeatureUpdate {
            enabled,
            // Supplying an LLM implies the override should be used
            use_custom_llm: use_custom_llm.or(main_llm.as_ref().map(|_| true)),
            main_llm,
            fallback_llm,
        }
    }
}

/// Run the features command
pub async fn run(ctx: &AppContext, args: FeaturesArgs) -> anyhow::Result<()> {
    let api = ctx.admin()?;
    ctx.require_session(api.client(), SessionScope::Admin).await?;

    let result = match args.command {
        FeaturesCommand::List { key, output } => {
            let features = api.subscription_features(&key).await?;
            print_features(ctx, features.0.as_slice(), &output)
        }
        FeaturesCommand::Set {
            key,
            feature,
            update,
            output,
        } => {
            let current = api.subscription_features(&key).await?;
            let update = update.to_update(current.get(&feature));
            let result = api.save_and_test_feature(&key, &feature, &update).await?;
            print_save_result(ctx, &feature, &result, &output)
        }
    };
    finish(api.client(), result).await
}

pub fn print_features(ctx: &AppContext, features: &[FeatureConfig], output: &OutputArgs) -> anyhow::Result<()> {
    if output.is_json() {
        return output.print_json(features);
    }
    if features.is_empty() {
        println!("No features configured.");
        return Ok(());
    }
    println!("{}", render_features(features, ctx.use_color));
    Ok(())
}

pub fn render_features(features: &[FeatureConfig], use_color: bool) -> String {
    let mut table = Table::new(&["FEATURE", "ENABLED", "LLM", "FALLBACK", "REQUESTS", "TOKENS", "COST"]);
    for feature in features {
        let enabled = if feature.enabled {
            paint("yes", GREEN, use_color)
        } else {
            paint("no", GRAY, use_color)
        };
        let llm = feature
            .effective_override()
            .map(|c| c.label())
            .unwrap_or_else(|| "default".to_string());
        let fallback = if feature.use_custom_llm {
            feature
                .fallback_llm
                .as_ref()
                .filter(|c| c.is_configured())
                .map(|c| c.label())
                .unwrap_or_else(|| "-".to_string())
        } else {
            "-".to_string()
        };
        table.row(vec![
            feature.feature_name.clone(),
            enabled,
            llm,
            fallback,
            format_number(feature.requests_used),
            format_number(feature.input_tokens.saturating_add(feature.output_tokens)),
            format!("${:.2}", feature.total_cost),
        ]);
    }
    table.render()
}

fn describe_test(test: &LlmTestResult, use_color: bool) -> String {
    if test.success {
        let latency = test
            .latency_ms
            .map(|ms| format!(" ({} ms)", ms))
            .unwrap_or_default();
        format!("{}{}", paint("ok", GREEN, use_color), latency)
    } else {
        let error = test.error.as_deref().unwrap_or("failed");
        paint(error, RED, use_color)
    }
}

pub fn render_save_result(feature: &str, result: &SaveAndTestResult, use_color: bool) -> String {
    let mut lines = Vec::new();
    let outcome = if result.success {
        paint("saved and tested", GREEN, use_color)
    } else {
        paint("saved, test failed", RED, use_color)
    };
    lines.push(format!("{}: {}", bold(feature, use_color), outcome));
    if !result.message.is_empty() {
        lines.push(format!("  {}", result.message));
    }
    if let Some(test) = &result.main_llm_test {
        lines.push(format!("  Main LLM:     {}", describe_test(test, use_color)));
    }
    if let Some(test) = &result.fallback_llm_test {
        lines.push(format!("  Fallback LLM: {}", describe_test(test, use_color)));
    }
    lines.join("\n")
}

pub fn print_save_result(
    ctx: &AppContext,
    feature: &str,
    result: &SaveAndTestResult,
    output: &OutputArgs,
) -> anyhow::Result<()> {
    if output.is_json() {
        return output.print_json(result);
    }
    println!("{}", render_save_result(feature, result, ctx.use_color));
    Ok(())
}
