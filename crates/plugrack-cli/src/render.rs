use anstyle::{AnsiColor, Effects, Style};

pub fn print_status(status: &str, message: &str) {
    println!("{} {message}", colorize(status_style(), status));
}

pub fn print_warning(message: &str) {
    eprintln!("{} {message}", colorize(warning_style(), "warning:"));
}

fn status_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightGreen.into()))
        .effects(Effects::BOLD)
}

fn warning_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightYellow.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}
