use rigup_core::planner::{resolve_and_plan, InstallPlan};
use rigup_plugins::catalog::load_catalog;

use crate::commands::cli::{OutputFormat, PlanArgs};
use crate::error::CliError;

pub fn load_plan(args: &PlanArgs, strict: bool) -> Result<InstallPlan, CliError> {
    let catalog = load_catalog(&args.catalog).map_err(CliError::Catalog)?;
    let strict = strict && !args.lenient;
    Ok(resolve_and_plan(&catalog, &args.names, strict)?)
}

pub fn handle_plan(args: PlanArgs, strict: bool) -> Result<i32, CliError> {
    let plan = load_plan(&args, strict)?;
    match args.format {
        OutputFormat::Jsonl => {
            let line = serde_json::to_string(&plan.summary()).map_err(anyhow::Error::from)?;
            println!("{line}");
        }
        OutputFormat::Text => print!("{}", render_plan(&plan)),
    }
    Ok(0)
}

fn render_plan(plan: &InstallPlan) -> String {
    let mut out = format!(
        "{} components in {} levels\n",
        plan.order.len(),
        plan.groups.len()
    );
    for group in &plan.groups {
        let mode = if group.can_install_parallel {
            "parallel"
        } else {
            "serial"
        };
        out.push_str(&format!(
            "  level {} ({mode}): {}\n",
            group.level,
            group.components.join(", ")
        ));
    }
    for w in plan.warnings() {
        out.push_str(&format!(
            "warning: {} <-> {} ({:?}): {}\n",
            w.component_a, w.component_b, w.conflict_type, w.resolution_hint
        ));
    }
    for d in plan.dropped_dependencies() {
        out.push_str(&format!(
            "dropped: {} -> {} (not in catalog)\n",
            d.component, d.missing
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigup_plugins::catalog::parse_catalog;

    #[test]
    fn renders_levels_and_dropped_dependencies() {
        let catalog = parse_catalog(
            r#"
            [[component]]
            name = "app"
            dependencies = ["lib", "ghost"]

            [[component]]
            name = "lib"
            "#,
        )
        .unwrap();
        let plan = resolve_and_plan(&catalog, &["app".to_string()], false).unwrap();

        let text = render_plan(&plan);
        assert!(text.starts_with("2 components in 2 levels\n"));
        assert!(text.contains("  level 0 (serial): lib\n"));
        assert!(text.contains("  level 1 (serial): app\n"));
        assert!(text.contains("dropped: app -> ghost (not in catalog)\n"));
    }
}
