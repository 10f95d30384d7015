use anyhow::Error;
use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Produce a rectangle centered within `area` that spans the requested percent
/// of the width and height. Used for modal dialogs.
pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(area);

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(horizontal[1]);

    vertical[1]
}

/// Footer text for a failed action: the outermost message only. Context
/// added by the forms is already phrased for the user, while the causes
/// underneath are parser and OS details.
pub(crate) fn surface_error(err: &Error) -> String {
    err.to_string()
}

/// First visible row of a list window that keeps `selected` on screen.
pub(crate) fn window_start(selected: usize, len: usize, capacity: usize) -> usize {
    if capacity == 0 || len <= capacity {
        return 0;
    }
    let start = (selected + 1).saturating_sub(capacity);
    start.min(len - capacity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn window_follows_selection() {
        assert_eq!(window_start(0, 5, 10), 0);
        assert_eq!(window_start(3, 20, 5), 0);
        assert_eq!(window_start(4, 20, 5), 0);
        assert_eq!(window_start(5, 20, 5), 1);
        assert_eq!(window_start(19, 20, 5), 15);
        assert_eq!(window_start(3, 20, 0), 0);
    }

    #[test]
    fn surfaces_outermost_message() {
        let err = "12a"
            .parse::<i32>()
            .context("Year must be a number.")
            .unwrap_err();
        assert_eq!(surface_error(&err), "Year must be a number.");
    }
}
