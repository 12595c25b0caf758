//! `concord syncs`: List the sync registry.

use concord_engine::SyncSummary;

pub async fn run(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let registry = concord_syncs::registry()?;
    registry.validate_against(&concord_concepts::default_concepts())?;
    let summaries = registry.summaries();

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    for summary in &summaries {
        print!("{}", render(summary));
    }
    println!("{} sync(s)", summaries.len());
    Ok(())
}

fn render(summary: &SyncSummary) -> String {
    let mut out = summary.name.clone();
    if summary.guarded {
        out.push_str("  [where]");
    }
    out.push('\n');
    for pattern in &summary.when {
        out.push_str(&format!("    when  {pattern}\n"));
    }
    for pattern in &summary.then {
        out.push_str(&format!("    then  {pattern}\n"));
    }
    out
}
