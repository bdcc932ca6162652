// Step result formatting

use std::io::IsTerminal;

use colored::Colorize;

/// How one scenario step ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepVerdict {
    Ok,
    Failed(String),
    Hung(String),
}

impl StepVerdict {
    pub fn passed(&self) -> bool {
        matches!(self, StepVerdict::Ok)
    }
}

/// Output styling configuration
pub struct OutputStyle {
    pub use_colors: bool,
}

impl Default for OutputStyle {
    fn default() -> Self {
        Self {
            use_colors: std::io::stdout().is_terminal(),
        }
    }
}

impl OutputStyle {
    pub fn plain() -> Self {
        Self { use_colors: false }
    }

    /// One line per step: `ok`, `FAILED` or `HUNG`, the label, then detail
    pub fn step(&self, label: &str, verdict: &StepVerdict) -> String {
        let (tag, detail) = match verdict {
            StepVerdict::Ok => ("ok", None),
            StepVerdict::Failed(detail) => ("FAILED", Some(detail)),
            StepVerdict::Hung(detail) => ("HUNG", Some(detail)),
        };
        let padded = format!("{:<6}", tag);
        let tag = if self.use_colors {
            match verdict {
                StepVerdict::Ok => padded.green().to_string(),
                StepVerdict::Failed(_) => padded.red().bold().to_string(),
                StepVerdict::Hung(_) => padded.yellow().bold().to_string(),
            }
        } else {
            padded
        };

        match detail {
            Some(detail) => format!("{} {}: {}", tag, label, detail),
            None => format!("{} {}", tag, label),
        }
    }

    pub fn summary(&self, passed: usize, total: usize) -> String {
        let line = format!("{}/{} steps passed", passed, total);
        if !self.use_colors {
            line
        } else if passed == total {
            line.green().to_string()
        } else {
            line.red().to_string()
        }
    }
}
