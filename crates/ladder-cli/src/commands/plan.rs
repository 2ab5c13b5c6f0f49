use anyhow::Result;
use ladder_core::SchemaVersion;
use ladder_infrastructure::LadderConfig;

pub fn run(config: &LadderConfig, from: u32, to: Option<u32>) -> Result<()> {
    let from = SchemaVersion::try_from(from)?;
    let to = super::target_version(config, to)?;
    let migrator = super::migrator(config, None);
    let plan = migrator.planner().plan(from, to)?;

    if plan.is_empty() {
        println!("Nothing to do: {} is the target", from);
        return Ok(());
    }

    if let (Some(start), Some(end)) = (plan.start(), plan.end()) {
        println!("{} step(s) from {} to {}:", plan.len(), start, end);
    }
    for (index, step) in plan.iter().enumerate() {
        println!(
            "  {}. {} -> {} [{}] {} -> {}",
            index + 1,
            step.from,
            step.to,
            step.ruleset.policy(),
            step.source.model_name,
            step.destination.model_name
        );
        for mapping in &step.ruleset.model().entity_mappings {
            let policy = mapping
                .policy
                .as_ref()
                .map(|p| format!(" (+{})", p.synthesized_entity()))
                .unwrap_or_default();
            println!(
                "       {}: {} -> {}{}",
                mapping.name, mapping.source, mapping.destination, policy
            );
        }
    }
    Ok(())
}
