//! Column-balanced text grid for watched values
//!
//! Every cell is `label value`, where labels are right-justified and values
//! left-justified to a common width so columns line up:
//!
//! ```text
//!  MODER 0x00000001    ODR 0x00000000     m0 0x1
//!    CNT 0x0001e240
//! ```
//!
//! A cell occupies `label + 1 + value` characters plus one separating space,
//! except the last cell of a row, which is why the line budget is `width + 1`.

use owo_colors::{OwoColorize, Style};

/// Arrow used by the change-log footer
const CHANGE_ARROW: &str = "->";

/// Separator drawn above the change-log footer
const FOOTER_RULE: char = '-';

/// One watched value to lay out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutItem {
    pub label: String,
    pub value: String,
    pub changed: bool,
    /// Value rendered on the previous refresh, shown in the change log
    pub previous: Option<String>,
}

impl LayoutItem {
    pub fn new(label: impl Into<String>, value: impl Into<String>, changed: bool) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            changed,
            previous: None,
        }
    }

    pub fn with_previous(mut self, previous: Option<String>) -> Self {
        self.previous = previous;
        self
    }
}

/// Styles applied to labels and changed values
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub enabled: bool,
    pub label: Style,
    pub changed: Style,
}

impl Palette {
    /// ANSI styling: dimmed labels, highlighted changed values
    pub fn ansi() -> Self {
        Self {
            enabled: true,
            label: Style::new().dimmed(),
            changed: Style::new().yellow().bold(),
        }
    }

    /// No escape sequences at all
    pub fn plain() -> Self {
        Self {
            enabled: false,
            label: Style::new(),
            changed: Style::new(),
        }
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if self.enabled {
            text.style(style).to_string()
        } else {
            text.to_string()
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::plain()
    }
}

/// Computed column geometry for one render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnPlan {
    pub per_line: usize,
    pub label_width: usize,
    pub value_width: usize,
}

impl ColumnPlan {
    /// Fit cells into `width` columns, spreading leftover space
    pub fn compute(items: &[LayoutItem], width: usize) -> Self {
        let max_label = items.iter().map(|i| text_width(&i.label)).max().unwrap_or(0);
        let max_value = items.iter().map(|i| text_width(&i.value)).max().unwrap_or(0);
        let max_width = max_label + max_value + 2;

        let per_line = ((width + 1) / max_width).max(1);
        let extra = (width + 1).saturating_sub(max_width * per_line) / per_line;

        let (label_width, value_width) = if per_line == 1 {
            // Center a lone column
            (max_label + extra / 2, max_value + extra / 2)
        } else {
            (max_label, max_value + extra)
        };

        Self {
            per_line,
            label_width,
            value_width,
        }
    }
}

fn text_width(text: &str) -> usize {
    text.chars().count()
}

fn truncate_to(text: &str, width: usize) -> String {
    let cut: String = text.chars().take(width).collect();
    cut.trim_end().to_string()
}

/// Lays watched values out in a width-bounded grid
#[derive(Debug, Clone, Default)]
pub struct LayoutEngine {
    palette: Palette,
    show_changes: bool,
    height_hint: Option<usize>,
}

impl LayoutEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    /// Append a change log below the grid
    pub fn with_show_changes(mut self, show: bool) -> Self {
        self.show_changes = show;
        self
    }

    /// Limit the total number of lines; the change log is cut to fit
    pub fn with_height_hint(mut self, height: Option<usize>) -> Self {
        self.height_hint = height;
        self
    }

    /// Render the grid (and optional change log) as display lines
    pub fn render(&self, items: &[LayoutItem], width: usize) -> Vec<String> {
        if items.is_empty() {
            return Vec::new();
        }

        let plan = ColumnPlan::compute(items, width);
        let cells: Vec<String> = items.iter().map(|item| self.render_cell(item, &plan)).collect();

        let mut lines: Vec<String> = cells
            .chunks(plan.per_line)
            .map(|row| row.join(" ").trim_end().to_string())
            .collect();

        if self.show_changes {
            self.append_change_log(items, width, &mut lines);
        }
        lines
    }

    fn render_cell(&self, item: &LayoutItem, plan: &ColumnPlan) -> String {
        let label_pad = plan.label_width.saturating_sub(text_width(&item.label));
        let value_pad = plan.value_width.saturating_sub(text_width(&item.value));
        let value_style = if item.changed {
            self.palette.changed
        } else {
            Style::new()
        };
        format!(
            "{}{} {}{}",
            " ".repeat(label_pad),
            self.palette.paint(&item.label, self.palette.label),
            self.palette.paint(&item.value, value_style),
            " ".repeat(value_pad)
        )
    }

    fn append_change_log(&self, items: &[LayoutItem], width: usize, lines: &mut Vec<String>) {
        let changes: Vec<String> = items
            .iter()
            .filter(|i| i.changed)
            .map(|i| {
                let line = format!(
                    "{} {} {} {}",
                    i.label,
                    i.previous.as_deref().unwrap_or("?"),
                    CHANGE_ARROW,
                    i.value
                );
                truncate_to(&line, width)
            })
            .collect();
        if changes.is_empty() {
            return;
        }

        let budget = match self.height_hint {
            Some(height) => height.saturating_sub(lines.len() + 1),
            None => usize::MAX,
        };
        if budget == 0 {
            return;
        }

        lines.push(std::iter::repeat(FOOTER_RULE).take(width).collect());
        if changes.len() <= budget {
            lines.extend(changes);
        } else {
            let shown = budget - 1;
            let hidden = changes.len() - shown;
            lines.extend(changes.into_iter().take(shown));
            lines.push(truncate_to(&format!("... {} more", hidden), width));
        }
    }
}
