//! Terminal styling utilities

use console::style;

pub fn style_cyan(s: &str) -> String {
    style(s).cyan().to_string()
}

pub fn style_green(s: &str) -> String {
    style(s).green().to_string()
}

pub fn style_red(s: &str) -> String {
    style(s).red().to_string()
}

pub fn style_yellow(s: &str) -> String {
    style(s).yellow().to_string()
}

pub fn style_dim(s: &str) -> String {
    style(s).dim().to_string()
}

pub fn style_bold(s: &str) -> String {
    style(s).bold().to_string()
}

pub fn print_success(msg: &str) {
    println!("{} {}", style_green("✓"), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", style_red("✗"), msg);
}

pub fn print_warning(msg: &str) {
    println!("{} {}", style_yellow("⚠"), msg);
}

pub fn print_info(msg: &str) {
    println!("{} {}", style_cyan("ℹ"), msg);
}

pub fn print_header(title: &str) {
    println!();
    println!("{}", style_bold(title));
    println!("{}", "─".repeat(title.chars().count()));
}

/// Rank label, highlighted for the podium
pub fn rank_label(rank: usize) -> String {
    let label = format!("#{}", rank);
    match rank {
        1 => style_yellow(&label),
        2 | 3 => style_cyan(&label),
        _ => label,
    }
}

/// Shorten to `max` characters for table columns
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long team name", 10), "a very ...");
    }
}
