//! Colored output helpers for CLI
//!
//! Every line is rendered to a `String` first so the plain (`--no-color`)
//! rendering can be asserted in tests; the printing methods are thin wrappers.

use owo_colors::OwoColorize;
use std::io::{self, Write};

const COLUMN_WIDTH: usize = 15;

/// Status markers, each with a colored symbol and a plain-text tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Ok,
    Info,
    Warn,
    Error,
    Created,
    Skipped,
}

impl Marker {
    fn plain(self) -> &'static str {
        match self {
            Marker::Ok => "[OK]",
            Marker::Info => "[INFO]",
            Marker::Warn => "[WARN]",
            Marker::Error => "[ERROR]",
            Marker::Created => "[CREATED]",
            Marker::Skipped => "[SKIPPED]",
        }
    }

    fn colored(self) -> String {
        match self {
            Marker::Ok | Marker::Created => "✓".green().bold().to_string(),
            Marker::Info => "•".blue().to_string(),
            Marker::Warn => "⚠".yellow().bold().to_string(),
            Marker::Error => "✗".red().bold().to_string(),
            Marker::Skipped => "○".yellow().to_string(),
        }
    }
}

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    pub fn new() -> Self {
        Self { colored: true }
    }

    pub fn no_color() -> Self {
        Self { colored: false }
    }

    fn status_line(&self, marker: Marker, message: &str) -> String {
        if !self.colored {
            return format!("  {} {}", marker.plain(), message);
        }
        let message = match marker {
            Marker::Ok => message.green().to_string(),
            Marker::Warn => message.yellow().to_string(),
            Marker::Error => message.red().to_string(),
            Marker::Info | Marker::Created | Marker::Skipped => message.to_string(),
        };
        format!("  {} {}", marker.colored(), message)
    }

    fn progress_line(&self, completed: usize, total: usize, message: &str) -> String {
        let counter = format!("[{}/{}]", completed, total);
        if self.colored {
            format!("  {} {}", counter.dimmed(), message.bright_white())
        } else {
            format!("  {} {}", counter, message)
        }
    }

    fn question_line(&self, number: usize, total: usize, question: &str) -> String {
        let label = format!("Question {}/{}:", number, total);
        if self.colored {
            format!("\n  {} {}", label.bright_yellow().bold(), question.bright_white())
        } else {
            format!("\n  [?] {} {}", label, question)
        }
    }

    fn columns(values: &[&str]) -> String {
        values
            .iter()
            .map(|v| format!("{:<width$}", v, width = COLUMN_WIDTH))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Print the delve banner
    pub fn banner(&self) {
        let version = format!("v{}", env!("CARGO_PKG_VERSION"));
        if self.colored {
            println!(
                "\n   {} {}\n   {}\n",
                "delve".bright_cyan().bold(),
                version.dimmed(),
                "Durable multi-agent research".bright_white()
            );
        } else {
            println!("\n   delve {}\n   Durable multi-agent research\n", version);
        }
    }

    pub fn success(&self, message: &str) {
        println!("{}", self.status_line(Marker::Ok, message));
    }

    pub fn info(&self, message: &str) {
        println!("{}", self.status_line(Marker::Info, message));
    }

    pub fn warning(&self, message: &str) {
        println!("{}", self.status_line(Marker::Warn, message));
    }

    /// Errors go to stderr
    pub fn error(&self, message: &str) {
        eprintln!("{}", self.status_line(Marker::Error, message));
    }

    /// Print search fan-out progress
    pub fn progress(&self, completed: usize, total: usize, message: &str) {
        println!("{}", self.progress_line(completed, total, message));
    }

    pub fn created(&self, file_type: &str, path: &str) {
        let message = if self.colored {
            format!("{} {}", file_type.dimmed(), path.bright_white())
        } else {
            format!("{} {}", file_type, path)
        };
        println!("{}", self.status_line(Marker::Created, &message));
    }

    pub fn skipped(&self, path: &str, reason: &str) {
        let message = if self.colored {
            format!("{} {}", path.dimmed(), format!("({})", reason).yellow())
        } else {
            format!("{} ({})", path, reason)
        };
        println!("{}", self.status_line(Marker::Skipped, &message));
    }

    pub fn created_dir(&self, path: &str) {
        self.created("directory", path);
    }

    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    pub fn subheader(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.cyan().bold());
        } else {
            println!("\n  --- {} ---", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    pub fn list_item(&self, item: &str) {
        if self.colored {
            println!("    {} {}", "•".blue(), item);
        } else {
            println!("    - {}", item);
        }
    }

    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "💡".dimmed(), message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    /// Print a command suggestion
    pub fn command(&self, cmd: &str) {
        let cmd = format!("$ {}", cmd);
        if self.colored {
            println!("     {}", cmd.bright_cyan());
        } else {
            println!("     {}", cmd);
        }
    }

    pub fn complete(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "🚀".green(), message.bright_green().bold());
        } else {
            println!("\n  [DONE] {}", message);
        }
    }

    /// Print a numbered clarification question and leave the cursor on the answer prompt
    pub fn question(&self, number: usize, total: usize, question: &str) {
        println!("{}", self.question_line(number, total, question));
        if self.colored {
            print!("  {} ", ">".bright_yellow());
        } else {
            print!("  > ");
        }
        io::stdout().flush().ok();
    }

    /// Print a block of report text, indented
    pub fn block(&self, text: &str) {
        for line in text.lines() {
            println!("    {}", line);
        }
    }

    pub fn table_header(&self, columns: &[&str]) {
        let header = Self::columns(columns);
        let rule_len = columns.len() * (COLUMN_WIDTH + 1);
        if self.colored {
            println!("    {}", header.bright_white().bold());
            println!("    {}", "─".repeat(rule_len).dimmed());
        } else {
            println!("    {}", header);
            println!("    {}", "-".repeat(rule_len));
        }
    }

    pub fn table_row(&self, values: &[&str]) {
        println!("    {}", Self::columns(values));
    }

    pub fn newline(&self) {
        println!();
    }
}
