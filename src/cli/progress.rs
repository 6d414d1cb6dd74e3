//! Progress bars and summary output for the terminal.

use indicatif::{ProgressBar, ProgressStyle};

use crate::{BatchSummary, Session, SessionState, format_bytes, format_duration};

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

/// Creates a percentage bar for one session.
pub fn make_progress_bar(label: &str) -> ProgressBar {
    let bar = ProgressBar::new(100);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.cyan} [{bar:40.cyan/blue}] {pos:>3}% {prefix} - {wide_msg}",
    ) {
        bar.set_style(style.progress_chars("━━╌"));
    }
    bar.set_prefix(label.to_string());
    bar
}

/// Line kept above the bars that lists the visible notices.
pub fn make_notice_line() -> ProgressBar {
    let line = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        line.set_style(style);
    }
    line
}

/// Label shown in front of a session's bar.
pub fn session_label(session: &Session) -> String {
    session
        .title
        .clone()
        .unwrap_or_else(|| session.source_link().to_string())
}

/// Moves `bar` to the session's state. Safe to call repeatedly.
pub fn apply_session(bar: &ProgressBar, session: &Session) {
    bar.set_prefix(session_label(session));
    bar.set_position(u64::from(session.progress()));
    match session.state() {
        SessionState::Completed => bar.finish_with_message(session.status_line.clone()),
        SessionState::Failed => bar.abandon_with_message(session.status_line.clone()),
        _ => bar.set_message(session.status_line.clone()),
    }
}

/// Prints the outcome of a batch of links.
pub fn print_summary(summary: &BatchSummary) {
    if summary.completed_count() == 0 && summary.failed_count() == 0 {
        return;
    }

    println!("\n{SEPARATOR}");
    println!("Download Summary");
    println!("{SEPARATOR}");

    if summary.completed_count() > 0 {
        println!("  Files saved:       {}", summary.completed_count());
        println!("  Total size:        {}", format_bytes(summary.total_bytes));
        println!("  Total time:        {}", format_duration(summary.elapsed));
        println!(
            "  Average speed:     {}/s",
            format_bytes(summary.average_speed())
        );
        for path in &summary.saved {
            println!("    {}", path.display());
        }
    }

    if summary.failed_count() > 0 {
        println!("  Failed:            {}", summary.failed_count());
        for failed in &summary.failed {
            println!("    {} ({})", failed.link, failed.message);
        }
    }

    println!("{SEPARATOR}");
}

/// Prints the final state of a playlist submission.
pub fn print_playlist_result(session: &Session) {
    println!("\n{SEPARATOR}");
    println!("{}", session_label(session));
    println!("{SEPARATOR}");
    if let Some(playlist) = session.playlist {
        println!(
            "  Videos:            {}/{}",
            playlist.completed_items, playlist.total_items
        );
    }
    println!("  State:             {}", session.state().label());
    println!("  Status:            {}", session.status_line);
    println!("{SEPARATOR}");
}
