//! Full-screen terminal session for the directory UI.
//!
//! [`ScreenGuard::enter`] switches to raw mode, the alternate screen, and a
//! hidden cursor. Leaving, dropping the guard, or panicking undoes exactly the
//! steps that were taken, so a failed start never strands the user's shell.

use std::io::{self, Write};
use std::panic;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Once;

use crossterm::cursor::{Hide, Show};
use crossterm::queue;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};

const RAW: u8 = 0b01;
const ALT: u8 = 0b10;

/// Screen steps currently applied; shared with the panic hook.
static ENTERED: AtomicU8 = AtomicU8::new(0);
static PANIC_HOOK: Once = Once::new();

#[must_use = "dropping the guard leaves the full-screen session immediately"]
pub struct ScreenGuard {
    _private: (),
}

impl ScreenGuard {
    pub fn enter(out: &mut impl Write) -> io::Result<Self> {
        install_panic_hook();
        terminal::enable_raw_mode()?;
        ENTERED.fetch_or(RAW, Ordering::SeqCst);
        let guard = Self { _private: () };
        // Flag first: a half-written switch still needs leaving.
        ENTERED.fetch_or(ALT, Ordering::SeqCst);
        write_enter(out)?;
        Ok(guard)
    }

    /// End the session now instead of at drop.
    pub fn leave(self) {
        drop(self);
    }
}

impl Drop for ScreenGuard {
    fn drop(&mut self) {
        restore_screen();
    }
}

fn write_enter(out: &mut impl Write) -> io::Result<()> {
    queue!(out, EnterAlternateScreen, Hide)?;
    out.flush()
}

fn write_leave(out: &mut impl Write, alt_screen: bool) -> io::Result<()> {
    if alt_screen {
        queue!(out, LeaveAlternateScreen)?;
    }
    queue!(out, Show)?;
    out.flush()
}

fn restore_screen() {
    let entered = ENTERED.swap(0, Ordering::SeqCst);
    if entered & RAW != 0 {
        let _ = terminal::disable_raw_mode();
    }
    let _ = write_leave(&mut io::stdout(), entered & ALT != 0);
}

fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            restore_screen();
            let payload = info.payload_as_str().unwrap_or("non-string panic payload");
            match info.location() {
                Some(location) => tracing::error!(%location, payload, "ui panicked"),
                None => tracing::error!(payload, "ui panicked"),
            }
            previous(info);
        }));
    });
}
