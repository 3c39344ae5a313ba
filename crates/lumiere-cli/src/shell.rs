use lumiere_contracts::catalog::{StylePreset, POSES};
use lumiere_contracts::intake::UploadSlot;
use lumiere_contracts::runs::summary::ResultRecord;

const PROGRESS_WIDTH: usize = 20;

pub fn progress_percent(progress: f64) -> u32 {
    (progress.clamp(0.0, 1.0) * 100.0).round() as u32
}

/// `[##########----------] 50%`
pub fn progress_bar(progress: f64) -> String {
    let clamped = progress.clamp(0.0, 1.0);
    let filled = (clamped * PROGRESS_WIDTH as f64).round() as usize;
    format!(
        "[{}{}] {}%",
        "#".repeat(filled),
        "-".repeat(PROGRESS_WIDTH - filled),
        progress_percent(clamped)
    )
}

pub fn slot_lines(label: &str, hint: &str, slot: &UploadSlot) -> Vec<String> {
    let mut lines = vec![format!(
        "{label} ({}/{}): {hint}",
        slot.len(),
        slot.capacity()
    )];
    for image in slot.images() {
        lines.push(format!("  [{}] {}", image.id, image.preview));
    }
    if slot.accepts_more() {
        lines.push("  + upload".to_string());
    }
    lines
}

pub fn style_lines(selected: StylePreset) -> Vec<String> {
    StylePreset::ALL
        .iter()
        .map(|style| {
            let marker = if *style == selected { "(*)" } else { "( )" };
            format!("{marker} {:<24} {}", style.label(), style.key())
        })
        .collect()
}

pub fn pose_lines() -> Vec<String> {
    POSES
        .iter()
        .enumerate()
        .map(|(idx, pose)| format!("{:>2}. {pose}", idx + 1))
        .collect()
}

pub fn gallery_header(shots: usize) -> String {
    format!("The Issue  VOL. 01 / {shots} SHOTS")
}

pub fn gallery_lines(records: &[ResultRecord]) -> Vec<String> {
    let mut lines = vec![gallery_header(records.len())];
    for record in records {
        let pose = POSES.get(record.pose_index).copied().unwrap_or("?");
        lines.push(format!(
            "  {}  pose {:>2}  {}",
            record.id,
            record.pose_index + 1,
            pose
        ));
        lines.push(format!("      {}", record.image_path));
    }
    lines
}
