//! Rule command handlers.

use affinity_core::Config;
use affinity_mgr::{
    CommandHandler, CommandRequest, CommandResult, CreatedRule, Invoker, CREATE_POOL_PREFIX,
};
use affinity_placement::RegionalDomains;
use anyhow::{Context, Result};

use crate::cli::{OutputFormat, PoolRuleArgs, RenderRuleArgs};

/// Builds the `affinity create pool` command for these arguments.
fn create_pool_request(args: &PoolRuleArgs) -> CommandRequest {
    CommandRequest::new(CREATE_POOL_PREFIX)
        .with_arg("poolname", &args.pool)
        .with_arg("region", &args.region)
        .with_arg("pd", &args.pd)
        .with_arg("sd", &args.sd)
        .with_arg("td", &args.td)
}

/// Handles `create-pool-rule`, returning the command's status code.
pub async fn handle_create_pool_rule(
    handler: &CommandHandler,
    config: &Config,
    args: PoolRuleArgs,
) -> Result<i32> {
    let invoker = Invoker::local(&config.cluster.client_name);
    let result = handler.handle_command(&create_pool_request(&args), &invoker).await;
    print_result(&result, args.format)?;
    Ok(result.retval)
}

fn print_result(result: &CommandResult, format: OutputFormat) -> Result<()> {
    if !result.is_success() {
        eprintln!("{}", result.stderr);
        return Ok(());
    }

    match format {
        OutputFormat::Json => println!("{}", result.stdout),
        OutputFormat::Text => {
            let created: CreatedRule = serde_json::from_str(&result.stdout)
                .context("Failed to parse command output")?;
            println!("Created rule '{}' with id {}", created.name, created.id);
            println!();
            println!("{}", created.rendered);
        }
    }
    Ok(())
}

/// Handles `preview-rule`.
pub async fn handle_preview_rule(handler: &CommandHandler, args: PoolRuleArgs) -> Result<()> {
    let request = handler.rule_request(&create_pool_request(&args))?;
    let preview = handler
        .synthesizer()
        .preview_rule(&request)
        .await
        .with_context(|| format!("Failed to preview rule '{}'", request.name))?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&preview)?),
        OutputFormat::Text => {
            println!("# rule '{}' would be created with id {}", preview.name, preview.id);
            println!("{}", preview.rendered);
        }
    }
    Ok(())
}

/// Handles `render-rule`.
pub fn handle_render_rule(config: &Config, args: RenderRuleArgs) -> Result<()> {
    let domains = RegionalDomains::new(args.region, args.pd, args.sd, args.td);
    let rule = affinity_placement::Rule::regional_affinity(
        args.name,
        args.id,
        &domains,
        &config.rule.leaf_type,
        config.rule.bounds(),
    );
    let rendered = rule.render_checked().context("Failed to render rule")?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_pool_request() {
        let args = PoolRuleArgs {
            pool: "poolX".to_string(),
            region: "dc1-".to_string(),
            pd: "rackA".to_string(),
            sd: "rackB".to_string(),
            td: "rackC".to_string(),
            format: OutputFormat::Text,
        };
        let request = create_pool_request(&args);
        assert_eq!(request.prefix, CREATE_POOL_PREFIX);
        assert_eq!(request.args.len(), 5);
        assert_eq!(request.args["poolname"], "poolX");
        assert_eq!(request.args["td"], "rackC");
    }

    #[test]
    fn test_render_rule_rejects_empty_name() {
        let args = RenderRuleArgs {
            name: String::new(),
            id: 1,
            region: "dc1-".to_string(),
            pd: "a".to_string(),
            sd: "b".to_string(),
            td: "c".to_string(),
        };
        assert!(handle_render_rule(&Config::default(), args).is_err());
    }
}
