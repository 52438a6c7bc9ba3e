//! Step log lines: timestamping, wrapping and emission to the owner's buffer
//! and the console.

use chrono::{DateTime, Local};
use colored::Colorize;

use crate::owner::StepOwner;

/// Timestamp format prefixed to log lines.
pub const TIME_FORMAT: &str = "%b %d %Y %H:%M:%S";

/// Terminator appended to every line written to the buffer.
pub const LINE_END: &str = "\r\n";

/// How a single log message is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineStyle {
    /// Print in bold on the console.
    pub bold: bool,
    /// Prefix with a timestamp.
    pub timestamp: bool,
    /// Wrap at the configured width.
    pub wrap: bool,
}

impl LineStyle {
    /// Bold, timestamped, wrapped.
    pub const EVENT: Self = Self {
        bold: true,
        timestamp: true,
        wrap: true,
    };

    /// Bold, no timestamp, wrapped. Banners and output lines.
    pub const PLAIN: Self = Self {
        bold: true,
        timestamp: false,
        wrap: true,
    };

    /// Verbatim block: bold, no timestamp, no wrapping.
    pub const BLOCK: Self = Self {
        bold: true,
        timestamp: false,
        wrap: false,
    };

    /// Traces: not bold, no timestamp, no wrapping.
    pub const TRACE: Self = Self {
        bold: false,
        timestamp: false,
        wrap: false,
    };
}

/// Render `msg` as it appears in the log buffer, without the line terminator.
pub fn format_line(msg: &str, style: LineStyle, width: usize, now: DateTime<Local>) -> String {
    let mut indent = String::new();
    let mut text = msg.to_owned();
    if style.timestamp {
        let time = now.format(TIME_FORMAT).to_string();
        indent = " ".repeat(time.len() + 1);
        text = format!("{time} {msg}");
    }
    if style.wrap {
        let first = textwrap::Options::new(width).subsequent_indent(&indent);
        let rest = first.clone().initial_indent(&indent);
        text = text
            .split('\n')
            .enumerate()
            .map(|(i, line)| {
                if i == 0 {
                    textwrap::fill(line, &first)
                } else {
                    textwrap::fill(line, &rest)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
    }
    text
}

/// A full-width banner line.
pub fn banner(ch: char, width: usize) -> String {
    std::iter::repeat(ch).take(width).collect()
}

/// Write one message to the owner's buffer and, if enabled, the console.
pub fn emit(owner: &dyn StepOwner, msg: &str, style: LineStyle) {
    let settings = owner.settings();
    let line = format_line(msg, style, settings.wrap_width, Local::now());
    owner.append_log(&line);
    owner.append_log(LINE_END);
    if settings.console {
        if style.bold {
            println!("{}", line.bold());
        } else {
            println!("{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn fixed_time() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 3, 5, 14, 7, 9)
            .single()
            .expect("unambiguous local time")
    }

    #[test]
    fn timestamp_prefix() {
        let line = format_line("hello", LineStyle::EVENT, 80, fixed_time());
        assert_eq!(line, "Mar 05 2024 14:07:09 hello");
    }

    #[test]
    fn wrapped_lines_hang_under_the_timestamp() {
        let msg = "word ".repeat(30);
        let line = format_line(msg.trim_end(), LineStyle::EVENT, 40, fixed_time());
        let mut lines = line.lines();
        assert!(lines.next().expect("first line").starts_with("Mar 05 2024 14:07:09 "));
        for rest in lines {
            assert!(rest.starts_with(&" ".repeat(21)));
            assert!(rest.len() <= 40);
        }
    }

    #[test]
    fn embedded_newlines_keep_the_hanging_indent() {
        let line = format_line(
            "[Wifi]:[Execution Step 1]::[Verification] :\nassociated - PASSED",
            LineStyle::EVENT,
            80,
            fixed_time(),
        );
        assert_eq!(
            line,
            "Mar 05 2024 14:07:09 [Wifi]:[Execution Step 1]::[Verification] :\n                     associated - PASSED"
        );
    }

    #[test]
    fn plain_lines_are_not_indented() {
        let line = format_line("Output: a\nb", LineStyle::PLAIN, 80, fixed_time());
        assert_eq!(line, "Output: a\nb");
    }

    #[test]
    fn block_is_verbatim() {
        let msg = "a very long line that would otherwise be wrapped at a narrow width";
        assert_eq!(format_line(msg, LineStyle::BLOCK, 10, fixed_time()), msg);
    }

    #[test]
    fn banner_has_requested_width() {
        assert_eq!(banner('#', 5), "#####");
    }
}
