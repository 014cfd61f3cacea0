use crate::app::LoopMetricsSnapshot;
use crate::scene_graph::Rgba;

use super::raster::Canvas;

const GLYPH_WIDTH: i32 = 3;
const GLYPH_HEIGHT: i32 = 5;
const TEXT_SCALE: i32 = 2;
const GLYPH_ADVANCE: i32 = (GLYPH_WIDTH + 1) * TEXT_SCALE;
const LINE_ADVANCE: i32 = (GLYPH_HEIGHT + 2) * TEXT_SCALE;
const PANEL_PADDING: i32 = 6 * TEXT_SCALE;
const PANEL_INSET_X: i32 = 4 * TEXT_SCALE;
const PANEL_INSET_Y: i32 = 3 * TEXT_SCALE;
const TEXT_PRIMARY_COLOR: Rgba = [244, 248, 252, 255];
const TEXT_HEADING_COLOR: Rgba = [176, 198, 220, 255];
const PANEL_BG_COLOR: Rgba = [10, 12, 16, 210];
const PANEL_BORDER_COLOR: Rgba = [92, 106, 126, 255];
const PERF_HEADING: &str = "Perf";
const WORLD_HEADING: &str = "World";

/// Printable ascii from ' ' to '~'. Each glyph packs five 3-bit rows, top
/// row in the high bits.
const GLYPHS: [u16; 95] = [
    0x0000, 0x2482, 0x5a00, 0x5f7d, 0x7ddf, 0x52a5, 0x2aab, 0x2400,
    0x1491, 0x4494, 0x0aa8, 0x05d0, 0x0014, 0x01c0, 0x0002, 0x12a4,
    0x7b6f, 0x2c97, 0x73e7, 0x73cf, 0x5bc9, 0x79cf, 0x79ef, 0x7292,
    0x7bef, 0x7bcf, 0x0410, 0x0414, 0x1511, 0x0e38, 0x4454, 0x72c2,
    0x7be7, 0x2bed, 0x6bae, 0x7927, 0x6b6e, 0x79a7, 0x79a4, 0x796f,
    0x5bed, 0x7497, 0x726f, 0x5bad, 0x4927, 0x5fed, 0x5ffd, 0x7b6f,
    0x6ba4, 0x7b79, 0x6bad, 0x79cf, 0x7492, 0x5b6f, 0x5b6a, 0x5bfd,
    0x5aad, 0x5a92, 0x72a7, 0x6926, 0x4889, 0x324b, 0x2a00, 0x0007,
    0x4400, 0x0e7f, 0x49ae, 0x0f27, 0x13ef, 0x0fa7, 0x39a4, 0x0f79,
    0x49ad, 0x2092, 0x106a, 0x4bad, 0x4927, 0x0ded, 0x0d6d, 0x0f6f,
    0x0d74, 0x0f79, 0x0d64, 0x0f8f, 0x2e93, 0x0b6f, 0x0b6a, 0x0b7a,
    0x0a95, 0x0b79, 0x0e57, 0x3593, 0x2492, 0x64d6, 0x0780,
];

#[derive(Debug, Clone, Default)]
pub(crate) struct OverlayData {
    pub metrics: LoopMetricsSnapshot,
    pub render_fps_cap: Option<u32>,
    pub slow_frame_delay_ms: u64,
    pub world_lines: Vec<String>,
}

pub(crate) fn draw_overlay(canvas: &mut Canvas<'_>, data: &OverlayData) {
    if canvas.width() == 0 || canvas.height() == 0 {
        return;
    }
    let lines = build_overlay_lines(data);
    let longest = lines
        .iter()
        .map(|line| line.chars().count() as i32)
        .max()
        .unwrap_or(0);
    let panel_left = PANEL_PADDING - PANEL_INSET_X;
    let panel_top = PANEL_PADDING - PANEL_INSET_Y;
    let panel_width = longest * GLYPH_ADVANCE + PANEL_INSET_X * 2;
    let panel_height = lines.len() as i32 * LINE_ADVANCE + PANEL_INSET_Y * 2;
    canvas.fill_rect(panel_left, panel_top, panel_width, panel_height, PANEL_BG_COLOR);
    canvas.stroke_rect(panel_left, panel_top, panel_width, panel_height, PANEL_BORDER_COLOR);

    let mut y = PANEL_PADDING;
    for line in &lines {
        let color = if matches!(line.as_str(), PERF_HEADING | WORLD_HEADING) {
            TEXT_HEADING_COLOR
        } else {
            TEXT_PRIMARY_COLOR
        };
        draw_text(canvas, PANEL_PADDING, y, line, color);
        y += LINE_ADVANCE;
    }
}

fn build_overlay_lines(data: &OverlayData) -> Vec<String> {
    let mut lines = vec![
        PERF_HEADING.to_string(),
        format_fps_line(data.metrics.fps, data.render_fps_cap, data.slow_frame_delay_ms),
        format!("tps: {:.1} panics: {}", data.metrics.tps, data.metrics.panic_frames),
        format!(
            "frame: {:.2} ms max {:.0}",
            data.metrics.frame_time_ms, data.metrics.worst_frame_ms
        ),
        String::new(),
        WORLD_HEADING.to_string(),
    ];
    lines.extend(data.world_lines.iter().cloned());
    lines
}

fn format_fps_line(current_fps: f32, cap: Option<u32>, slow_frame_delay_ms: u64) -> String {
    let cap_text = cap.map_or_else(|| "inf".to_string(), |value| value.to_string());
    format!("[{current_fps:.0} / {cap_text}] dbg+{slow_frame_delay_ms}ms")
}

fn draw_text(canvas: &mut Canvas<'_>, mut x: i32, y: i32, text: &str, color: Rgba) {
    for ch in text.chars() {
        if let Some(bits) = glyph_bits(ch) {
            draw_glyph(canvas, x, y, bits, color);
        }
        x += GLYPH_ADVANCE;
    }
}

fn glyph_bits(ch: char) -> Option<u16> {
    match ch {
        ' '..='~' => Some(GLYPHS[ch as usize - ' ' as usize]),
        _ => None,
    }
}

fn glyph_pixel_set(bits: u16, row: i32, col: i32) -> bool {
    let shift = (GLYPH_HEIGHT - 1 - row) * GLYPH_WIDTH + (GLYPH_WIDTH - 1 - col);
    bits & (1 << shift) != 0
}

fn draw_glyph(canvas: &mut Canvas<'_>, x: i32, y: i32, bits: u16, color: Rgba) {
    for row in 0..GLYPH_HEIGHT {
        for col in 0..GLYPH_WIDTH {
            if glyph_pixel_set(bits, row, col) {
                canvas.fill_rect(
                    x + col * TEXT_SCALE,
                    y + row * TEXT_SCALE,
                    TEXT_SCALE,
                    TEXT_SCALE,
                    color,
                );
            }
        }
    }
}
