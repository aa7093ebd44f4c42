//! Customer-facing commands (user scope): own subscription, usage and features

use clap::{Args, Subcommand};
use serde::Serialize;

use super::analytics::{print_costs, print_usage, render_usage, RangeArgs};
use super::context::{finish, AppContext};
use super::features::{print_features, print_save_result, FeatureSetArgs};
use super::render::OutputArgs;
use super::subscriptions::render_details;
use crate::core::{AnalyticsRange, SessionScope, Subscription, UsageAnalytics};

/// Arguments for the me command
#[derive(Args, Debug)]
pub struct MeArgs {
    #[command(subcommand)]
    pub command: MeCommand,
}

#[derive(Subcommand, Debug)]
pub enum MeCommand {
    /// Show your subscription and current usage
    Show {
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Request and token usage
    Usage {
        #[command(flatten)]
        range: RangeArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Cost breakdown
    Costs {
        #[command(flatten)]
        range: RangeArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// List your features
    Features {
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Save a feature's configuration and test its LLMs
    SetFeature {
        /// Feature name
        feature: String,
        #[command(flatten)]
        update: FeatureSetArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Serialize)]
struct Overview<'a> {
    subscription: &'a Subscription,
    usage: &'a UsageAnalytics,
}

/// Run the me command
pub async fn run(ctx: &AppContext, args: MeArgs) -> anyhow::Result<()> {
    let api = ctx.user()?;
    ctx.require_session(api.client(), SessionScope::User).await?;

    let result = match args.command {
        MeCommand::Show { output } => {
            let (subscription, usage) =
                futures::try_join!(api.subscription(), api.usage(AnalyticsRange::default()))?;
            if output.is_json() {
                output.print_json(&Overview {
                    subscription: &subscription,
                    usage: &usage,
                })
            } else {
                println!("{}", render_details(&subscription, ctx.use_color));
                println!();
                println!("{}", render_usage(&usage, ctx.use_color));
                Ok(())
            }
        }
        MeCommand::Usage { range, output } => {
            let usage = api.usage(range.range()?).await?;
            print_usage(ctx, &usage, &output)
        }
        MeCommand::Costs { range, output } => {
            let costs = api.costs(range.range()?).await?;
            print_costs(ctx, &costs, &output)
        }
        MeCommand::Features { output } => {
            let features = api.features().await?;
            print_features(ctx, features.0.as_slice(), &output)
        }
        MeCommand::SetFeature {
            feature,
            update,
            output,
        } => {
            let current = api.features().await?;
            let update = update.to_update(current.get(&feature));
            let result = api.save_and_test_feature(&feature, &update).await?;
            print_save_result(ctx, &feature, &result, &output)
        }
    };
    finish(api.client(), result).await
}
