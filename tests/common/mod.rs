//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

/// Assert that no rendered line is wider than `width` characters
pub fn assert_lines_fit(lines: &[String], width: usize) {
    for line in lines {
        assert!(
            line.chars().count() <= width,
            "Line {:?} is {} characters wide, budget is {}",
            line,
            line.chars().count(),
            width
        );
    }
}

/// Find the value rendered next to `label` in a plain (uncolored) grid
pub fn value_of<'a>(lines: &'a [String], label: &str) -> Option<&'a str> {
    lines.iter().find_map(|line| {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        tokens
            .windows(2)
            .find(|pair| pair[0] == label)
            .map(|pair| pair[1])
    })
}
