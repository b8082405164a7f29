use studysync_coordinator::VerifyScope;

use crate::App;

/// Returns whether the scope was (or now is) consistent.
pub async fn cmd_verify(
    app: &App,
    scope: VerifyScope,
    repair: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    if repair {
        let fixed = app.repair(scope).await?;
        if fixed.is_empty() {
            println!("✓ Nothing to repair.");
        } else {
            println!("Repaired {} field(s):", fixed.len());
            for d in &fixed {
                println!("  {d}");
            }
        }
        return Ok(true);
    }

    let found = app.verify_consistency(scope).await?;
    if found.is_empty() {
        println!("✓ All aggregates consistent.");
        return Ok(true);
    }

    println!("Found {} discrepancies:", found.len());
    for d in &found {
        println!("  {d}");
    }
    Ok(false)
}
