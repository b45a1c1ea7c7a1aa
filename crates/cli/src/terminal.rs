//! Terminal implementation of the cart surface.

use std::io::{BufRead, Write};

use tienda_cart::surface::{Level, Notification, Surface};

/// Prints notifications and asks for confirmation on stdin.
#[derive(Debug)]
pub struct TerminalSurface {
    assume_yes: bool,
    print_markup: bool,
}

impl TerminalSurface {
    #[must_use]
    pub const fn new(assume_yes: bool, print_markup: bool) -> Self {
        Self {
            assume_yes,
            print_markup,
        }
    }
}

impl Surface for TerminalSurface {
    #[allow(clippy::print_stdout)]
    fn render_cart(&self, markup: &str) {
        if self.print_markup {
            println!("{markup}");
        }
    }

    fn render_badge(&self, count: u32, _markup: &str) {
        tracing::debug!(count, "Badge updated");
    }

    #[allow(clippy::print_stderr)]
    fn notify(&self, notification: Notification) {
        let tag = match notification.level {
            Level::Success => "ok",
            Level::Info => "info",
            Level::Warning => "aviso",
            Level::Danger => "error",
        };
        eprintln!("[{tag}] {}", notification.text);
    }

    #[allow(clippy::print_stderr)]
    fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }

        eprint!("{prompt} [s/N] ");
        if std::io::stderr().flush().is_err() {
            return false;
        }

        blocking(|| read_answer(std::io::stdin().lock()))
    }
}

/// Run a blocking read without stalling other tasks on a multi-threaded
/// runtime.
fn blocking<T>(f: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(tokio::runtime::RuntimeFlavor::MultiThread) => tokio::task::block_in_place(f),
        _ => f(),
    }
}

/// Read one line and decide whether it means yes.
fn read_answer(mut input: impl BufRead) -> bool {
    let mut answer = String::new();
    if input.read_line(&mut answer).is_err() {
        return false;
    }
    matches!(
        answer.trim().to_lowercase().as_str(),
        "s" | "si" | "sí" | "y" | "yes"
    )
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_answers() {
        assert!(read_answer(Cursor::new("s\n")));
        assert!(read_answer(Cursor::new("Sí\n")));
        assert!(!read_answer(Cursor::new("n\n")));
        assert!(!read_answer(Cursor::new("")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_blocking_read_inside_runtime() {
        assert!(blocking(|| read_answer(Cursor::new("yes\n"))));
    }

    #[tokio::test]
    async fn test_blocking_read_on_current_thread_runtime() {
        assert!(blocking(|| read_answer(Cursor::new("si\n"))));
    }

    #[test]
    fn test_assume_yes_skips_prompt() {
        assert!(TerminalSurface::new(true, false).confirm("¿Vaciar?"));
    }
}
