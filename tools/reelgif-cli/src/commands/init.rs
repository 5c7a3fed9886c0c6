//! Write an example composition.

use std::path::PathBuf;

use reelgif_project_model::{BlurOverlay, BlurShape, Clip, Composition, PercentRect, TextOverlay};

pub fn run(path: PathBuf, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let mut logo = Clip::image("logo", "logo.png", 0, 300);
    logo.x = Some(88.0);
    logo.y = Some(12.0);
    logo.width = Some(15.0);
    logo.height = Some(15.0);

    let mut trimmed = Clip::video("outro", "outro.mp4", 180, 120);
    trimmed.start_from = Some(30);

    let mut caption = TextOverlay::new("title", "Hello from Reelgif", 30, 60);
    caption.y = 80.0;

    let mut face = BlurOverlay::new(
        "face",
        0,
        180,
        PercentRect::new(40.0, 20.0, 20.0, 30.0),
    );
    face.shape = BlurShape::Circle;

    let composition = Composition {
        clips: vec![Clip::video("intro", "intro.mp4", 0, 180), trimmed, logo],
        text_overlays: vec![caption],
        blur_overlays: vec![face],
        ..Default::default()
    };

    composition
        .save(&path)
        .map_err(|e| anyhow::anyhow!("Failed to write composition: {e}"))?;

    println!("Composition written to {}", path.display());
    println!("  Content: {} frames", composition.content_duration());
    println!("  Media paths are resolved relative to the composition file.");
    Ok(())
}
