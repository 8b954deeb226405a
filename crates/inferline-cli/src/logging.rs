use colored::{ColoredString, Colorize, CustomColor};

pub const INFERLINE_BLUE: CustomColor = CustomColor {
    r: 52,
    g: 120,
    b: 246,
};

/// Severity of a user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warn,
    Error,
}

impl Level {
    fn label(self) -> ColoredString {
        let label = match self {
            Level::Info => "info",
            Level::Success => "ok",
            Level::Warn => "warn",
            Level::Error => "error",
        };
        let padded = format!("{label:>5}");
        match self {
            Level::Info => padded.cyan().bold(),
            Level::Success => padded.green().bold(),
            Level::Warn => padded.yellow().bold(),
            Level::Error => padded.red().bold(),
        }
    }

    fn to_stderr(self) -> bool {
        matches!(self, Level::Warn | Level::Error)
    }
}

fn format_message(level: Level, message: &str) -> String {
    format!(
        "{} {} {}",
        "inferline".custom_color(INFERLINE_BLUE).bold(),
        level.label(),
        message
    )
}

/// Prints one line; warnings and errors go to stderr so command output stays pipeable.
pub fn print_message(level: Level, message: &str) {
    let line = format_message(level, message);
    if level.to_stderr() {
        eprintln!("{line}");
    } else {
        println!("{line}");
    }
}

#[macro_export]
macro_rules! print_info {
    ($($arg:tt)*) => {
        $crate::logging::print_message($crate::logging::Level::Info, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! print_success {
    ($($arg:tt)*) => {
        $crate::logging::print_message($crate::logging::Level::Success, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! print_warn {
    ($($arg:tt)*) => {
        $crate::logging::print_message($crate::logging::Level::Warn, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! print_err {
    ($($arg:tt)*) => {
        $crate::logging::print_message($crate::logging::Level::Error, &format!($($arg)*))
    };
}
