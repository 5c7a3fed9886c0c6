//! Validate a composition file.

use std::path::PathBuf;

use reelgif_project_model::Composition;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating composition: {}", path.display());

    let composition = Composition::load(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load composition: {e}"))?;

    let videos = composition.video_clips().len();
    println!("  Video clips: {videos}");
    println!("  Image clips: {}", composition.image_clips().count());
    println!("  Text overlays: {}", composition.text_overlays.len());
    println!("  Blur overlays: {}", composition.blur_overlays.len());

    let mut issues = composition.validate();
    if videos == 0 {
        issues.push(reelgif_project_model::CompositionIssue {
            severity: reelgif_project_model::IssueSeverity::Error,
            message: "no video clips; nothing to export".to_string(),
        });
    }

    if issues.is_empty() {
        println!("\nComposition is valid.");
        return Ok(());
    }

    println!("\nValidation issues:");
    for issue in &issues {
        println!("  - {issue}");
    }

    let errors = issues.iter().filter(|i| i.is_error()).count();
    if errors > 0 {
        anyhow::bail!("{errors} error(s) found; composition cannot be exported");
    }
    println!(
        "\n{} warning(s) found. Composition can still be exported.",
        issues.len()
    );
    Ok(())
}
