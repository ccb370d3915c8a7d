use ratatui::layout::Rect;

/// Truncate to `max` visible characters, ending in "…" when cut.
/// Counts chars, not bytes.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max - 1).collect();
    format!("{kept}…")
}

pub(crate) fn scroll_down(index: &mut usize, scroll: &mut usize, len: usize, page: usize) {
    if *index + 1 < len {
        *index += 1;
        let page = page.max(1);
        if *index >= *scroll + page {
            *scroll = *index + 1 - page;
        }
    }
}

pub(crate) fn scroll_up(index: &mut usize, scroll: &mut usize) {
    *index = index.saturating_sub(1);
    if *index < *scroll {
        *scroll = *index;
    }
}

pub(crate) fn scroll_to_top(index: &mut usize, scroll: &mut usize) {
    *index = 0;
    *scroll = 0;
}

pub(crate) fn scroll_to_bottom(index: &mut usize, scroll: &mut usize, len: usize, page: usize) {
    if len > 0 {
        *index = len - 1;
        *scroll = index.saturating_sub(page.saturating_sub(1));
    }
}

/// Pull the cursor back inside a list that just shrank.
pub(crate) fn clamp_cursor(index: &mut usize, scroll: &mut usize, len: usize, page: usize) {
    if len == 0 {
        scroll_to_top(index, scroll);
        return;
    }
    if *index >= len {
        *index = len - 1;
    }
    if *index < *scroll {
        *scroll = *index;
    }
    let page = page.max(1);
    if *index >= *scroll + page {
        *scroll = *index + 1 - page;
    }
}

/// A `width` x `height` box centred in `area`, clamped to fit.
pub(crate) fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width, height)
}
